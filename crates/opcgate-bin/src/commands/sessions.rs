// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `sessions` command.

use std::sync::Arc;

use opcgate_config::OpcGateConfig;
use opcgate_core::{Gateway, ReadOutput, SessionSummary};
use serde::Serialize;
use tracing::info;

use super::output::structured;
use super::simulation_factory;
use crate::cli::{OutputFormat, SessionsArgs};
use crate::error::{BinError, BinResult};

/// One row of the session table.
#[derive(Debug, Serialize)]
struct SessionRow {
    #[serde(flatten)]
    summary: SessionSummary,
    server: Option<String>,
    groups: Vec<String>,
    alive: bool,
    good: usize,
    read: usize,
}

/// Executes the `sessions` command.
pub async fn sessions(config: &OpcGateConfig, args: SessionsArgs) -> BinResult<()> {
    let gateway = demo_gateway(config);
    let outcome = populate(&gateway, args.count, &args.tags).await;

    for summary in gateway.sessions() {
        gateway.release_session(summary.id).await?;
    }
    let rows = outcome?;

    let rendered = match args.format {
        OutputFormat::Text => table(&rows),
        format => structured(&rows, format)?,
    };
    println!("{rendered}");
    Ok(())
}

fn demo_gateway(config: &OpcGateConfig) -> Gateway {
    let gateway = Gateway::new(Arc::new(simulation_factory()), config.session_settings());
    match config.gateway.max_sessions {
        Some(max) => gateway.with_max_sessions(max),
        None => gateway,
    }
}

/// Opens `count` sessions, each reading `tags` through its own group.
async fn populate(gateway: &Gateway, count: usize, tags: &[String]) -> BinResult<Vec<SessionRow>> {
    if tags.is_empty() {
        return Err(BinError::input("at least one tag is required"));
    }

    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        let id = gateway
            .create_session(format!("demo-{n}"))
            .map_err(|e| BinError::from(e).with_context(format!("opening session {n} of {count}")))?;
        ids.push(id);
    }

    let mut details = Vec::with_capacity(count);
    for id in &ids {
        let mut session = gateway.acquire(*id).await?;
        session.connect(None, None).await?;
        let options = session.settings().read_defaults.clone().group("Demo");
        let output = session.read(tags.to_vec(), options).await?;
        let good = match &output {
            ReadOutput::Many(results) => results.iter().filter(|r| r.quality.is_good()).count(),
            ReadOutput::Single(reading) => usize::from(reading.quality.is_good()),
        };
        let alive = session.ping().await;
        details.push((
            *id,
            session.server().map(str::to_string),
            session.groups(),
            alive,
            good,
        ));
    }
    info!(sessions = gateway.len(), "Demonstration sessions ready");

    // Summaries are taken last so they carry the read activity.
    let summaries = gateway.sessions();
    Ok(details
        .into_iter()
        .filter_map(|(id, server, groups, alive, good)| {
            let summary = summaries.iter().find(|s| s.id == id)?.clone();
            Some(SessionRow {
                summary,
                server,
                groups,
                alive,
                good,
                read: tags.len(),
            })
        })
        .collect())
}

fn table(rows: &[SessionRow]) -> String {
    let mut lines = vec![format!(
        "{:<36}  {:<8}  {:<24}  {:<5}  {:<8}  {}",
        "SESSION", "HOST", "SERVER", "ALIVE", "GOOD", "LAST ACTIVITY"
    )];
    for row in rows {
        lines.push(format!(
            "{:<36}  {:<8}  {:<24}  {:<5}  {:<8}  {}",
            row.summary.id.to_string(),
            row.summary.host,
            row.server.as_deref().unwrap_or("-"),
            if row.alive { "yes" } else { "no" },
            format!("{}/{}", row.good, row.read),
            row.summary.last_activity.format("%H:%M:%S%.3f"),
        ));
    }
    lines.join("\n")
}
