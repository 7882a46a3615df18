// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Rendering of command results.

use opcgate_core::{ReadOutput, TagReading, TagResult, Value, WriteOutput};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{BinError, BinResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Serializes `value` as JSON or YAML.
pub(crate) fn structured<T: Serialize>(value: &T, format: OutputFormat) -> BinResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        OutputFormat::Text => Err(BinError::output("text output is not structured")),
    }
}

fn value_text(value: Option<&Value>) -> String {
    value.map_or_else(|| "-".to_string(), Value::to_string)
}

fn reading_line(reading: &TagReading) -> String {
    let timestamp = reading
        .timestamp
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{}  {}  {}",
        value_text(reading.value.as_ref()),
        reading.quality,
        timestamp
    );
    if let Some(error) = &reading.error {
        line.push_str("  ");
        line.push_str(error);
    }
    line
}

fn result_lines(results: &[TagResult]) -> Vec<String> {
    let width = results.iter().map(|r| r.tag.len()).max().unwrap_or(0);
    results
        .iter()
        .map(|r| {
            let reading = r.clone().into_reading();
            format!("{:<width$}  {}", r.tag, reading_line(&reading))
        })
        .collect()
}

/// Text rendering of a read.
pub(crate) fn read_text(output: &ReadOutput) -> String {
    match output {
        ReadOutput::Single(reading) => reading_line(reading),
        ReadOutput::Many(results) => result_lines(results).join("\n"),
    }
}

/// Text rendering of a write.
pub(crate) fn write_text(output: &WriteOutput) -> String {
    match output {
        WriteOutput::Single(reading) => match &reading.error {
            Some(error) => format!("{}  {}", reading.status, error),
            None => reading.status.to_string(),
        },
        WriteOutput::Many(results) => {
            let width = results.iter().map(|r| r.tag.len()).max().unwrap_or(0);
            results
                .iter()
                .map(|r| match &r.error {
                    Some(error) => format!("{:<width$}  {}  {}", r.tag, r.status, error),
                    None => format!("{:<width$}  {}", r.tag, r.status),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}
