// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use std::time::Duration;

use opcgate_config::OpcGateConfig;
use opcgate_core::{ReadOptions, ReadOutput, Session};
use tracing::debug;

use super::output::{read_text, structured};
use super::{close_session, open_session};
use crate::cli::{OutputFormat, ReadArgs};
use crate::error::BinResult;

/// Executes the `read` command.
pub async fn read(config: &OpcGateConfig, args: ReadArgs) -> BinResult<()> {
    let mut session = open_session(config, args.server.as_deref()).await?;
    let options = read_options(session.settings().read_defaults.clone(), &args);

    let outcome = read_rounds(&mut session, &args.tags, options, args.repeat).await;
    close_session(&mut session).await;
    let rounds = outcome?;

    println!("{}", render(&rounds, args.format)?);
    Ok(())
}

/// Overlays the command-line flags on the configured defaults.
fn read_options(defaults: ReadOptions, args: &ReadArgs) -> ReadOptions {
    let mut options = defaults;
    if let Some(group) = &args.group {
        options.group = Some(group.clone());
    }
    if let Some(size) = args.size {
        options.size = Some(size);
    }
    if let Some(source) = args.source {
        options.source = source.into();
    }
    if let Some(timeout) = args.timeout_ms {
        options.timeout = Duration::from_millis(timeout);
    }
    options.sync |= args.sync;
    options.include_error |= args.include_error;
    options.rebuild = args.rebuild;
    options
}

/// Reads `tags` `repeat` times through the same session.
///
/// Only the first round rebuilds; later rounds hit the cached group.
async fn read_rounds(
    session: &mut Session,
    tags: &[String],
    mut options: ReadOptions,
    repeat: u32,
) -> BinResult<Vec<ReadOutput>> {
    let mut rounds = Vec::new();
    for round in 1..=repeat.max(1) {
        debug!(round, tags = tags.len(), "Reading");
        let output = match tags {
            [tag] => session.read(tag.as_str(), options.clone()).await?,
            _ => session.read(tags.to_vec(), options.clone()).await?,
        };
        rounds.push(output);
        options.rebuild = false;
    }
    Ok(rounds)
}

fn render(rounds: &[ReadOutput], format: OutputFormat) -> BinResult<String> {
    match (format, rounds) {
        (OutputFormat::Text, [only]) => Ok(read_text(only)),
        (OutputFormat::Text, _) => Ok(rounds
            .iter()
            .enumerate()
            .map(|(i, round)| format!("# read {}\n{}", i + 1, read_text(round)))
            .collect::<Vec<_>>()
            .join("\n")),
        (_, [only]) => structured(only, format),
        (_, _) => structured(&rounds, format),
    }
}
