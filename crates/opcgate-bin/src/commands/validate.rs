// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use opcgate_config::OpcGateConfig;
use opcgate_core::provider::memory::SIMULATION_SERVER;
use opcgate_core::settings::{split_list, DEFAULT_CLASSES};

use super::output::structured;
use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::BinResult;

/// Executes the `validate` command.
///
/// Loading already rejected invalid files; this reports a summary and
/// warnings for settings that are valid but probably unintended.
pub fn validate(cli: &Cli, config: &OpcGateConfig, args: ValidateArgs) -> BinResult<()> {
    let source = cli
        .config
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(built-in defaults)".to_string());
    let warnings = collect_warnings(config);
    let servers = split_list(&config.provider.server);
    let classes = split_list(&config.provider.class);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {source}");
            println!();
            println!("Summary:");
            println!("  Classes: {}", classes.len());
            println!("  Servers: {}", servers.join(", "));
            println!("  Host: {}", config.provider.host);
            println!("  Client Name: {}", config.provider.client_name);
            println!(
                "  Read Defaults: source={} timeout={}ms sync={}",
                config.defaults.read.source,
                config.defaults.read.timeout_ms,
                config.defaults.read.sync
            );
            println!(
                "  Gateway: {}:{}",
                config.gateway.bind_host, config.gateway.port
            );
            println!(
                "  Logging: {} ({:?})",
                config.logging.level, config.logging.format
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {warning}");
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_yaml::to_string(config)?);
            }
        }
        format => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": source,
                "summary": {
                    "class_count": classes.len(),
                    "servers": servers,
                    "host": config.provider.host,
                    "client_name": config.provider.client_name,
                    "gateway_bind_host": config.gateway.bind_host,
                    "gateway_port": config.gateway.port,
                    "max_sessions": config.gateway.max_sessions,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(config) } else { None },
            });
            println!("{}", structured(&output, format)?);
        }
    }

    Ok(())
}

/// Settings that load fine but are likely mistakes.
fn collect_warnings(config: &OpcGateConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let known: Vec<&str> = split_list(DEFAULT_CLASSES);
    if !split_list(&config.provider.class)
        .iter()
        .any(|class| known.contains(class))
    {
        warnings.push("No configured class is a known automation wrapper".to_string());
    }

    if !split_list(&config.provider.server).contains(&SIMULATION_SERVER) {
        warnings.push(format!(
            "Server list does not include {SIMULATION_SERVER}; demonstration commands will not connect"
        ));
    }

    if config.gateway.max_sessions.is_none() {
        warnings.push("gateway.max_sessions is unset; session count is unbounded".to_string());
    }

    if config.defaults.read.include_error && !config.defaults.read.sync {
        warnings.push("defaults.read.include_error forces synchronous reads".to_string());
    }

    warnings
}
