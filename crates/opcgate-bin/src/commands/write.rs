// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use opcgate_config::OpcGateConfig;
use opcgate_core::{ReadOptions, ReadOutput, Session, Value, WriteOptions, WriteOutput};
use serde::Serialize;

use super::output::{read_text, structured, write_text};
use super::{close_session, open_session};
use crate::cli::{OutputFormat, WriteArgs};
use crate::error::{BinError, BinResult};

/// Results of one `write` invocation.
#[derive(Debug, Serialize)]
struct WriteReport {
    written: WriteOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_back: Option<ReadOutput>,
}

/// Executes the `write` command.
pub async fn write(config: &OpcGateConfig, args: WriteArgs) -> BinResult<()> {
    let pairs = args
        .pairs
        .iter()
        .map(|pair| parse_pair(pair))
        .collect::<BinResult<Vec<_>>>()?;

    let mut session = open_session(config, args.server.as_deref()).await?;
    let mut options = session.settings().write_defaults.clone();
    if let Some(size) = args.size {
        options.size = Some(size);
    }
    options.include_error |= args.include_error;

    let outcome = write_pairs(&mut session, pairs, options, args.read_back).await;
    close_session(&mut session).await;
    let report = outcome?;

    let rendered = match args.format {
        OutputFormat::Text => match &report.read_back {
            Some(read_back) => format!(
                "{}\n# read back\n{}",
                write_text(&report.written),
                read_text(read_back)
            ),
            None => write_text(&report.written),
        },
        format => structured(&report, format)?,
    };
    println!("{rendered}");
    Ok(())
}

/// Splits `TAG=VALUE` at the first `=`.
fn parse_pair(pair: &str) -> BinResult<(String, Value)> {
    let (tag, value) = pair
        .split_once('=')
        .ok_or_else(|| BinError::input(format!("expected TAG=VALUE, got '{pair}'")))?;
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(BinError::input(format!("missing tag name in '{pair}'")));
    }
    Ok((tag.to_string(), Value::parse_literal(value)))
}

async fn write_pairs(
    session: &mut Session,
    pairs: Vec<(String, Value)>,
    options: WriteOptions,
    read_back: bool,
) -> BinResult<WriteReport> {
    let tags: Vec<String> = pairs.iter().map(|(tag, _)| tag.clone()).collect();

    let written = match <[_; 1]>::try_from(pairs) {
        Ok([pair]) => session.write(pair, options).await?,
        Err(pairs) => session.write(pairs, options).await?,
    };

    let read_back = if read_back {
        Some(
            session
                .read(tags, ReadOptions::new().sync(true).include_error(true))
                .await?,
        )
    } else {
        None
    };

    Ok(WriteReport { written, read_back })
}
