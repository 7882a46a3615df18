// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use opcgate_core::settings::{DEFAULT_CLIENT_NAME, DEFAULT_GATEWAY_PORT};

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(cli: &Cli) -> BinResult<()> {
    if cli.quiet {
        println!("{}", crate::VERSION);
        return Ok(());
    }

    println!("opcgate - tag-group session gateway for OPC data providers");
    println!();
    println!("Version Information:");
    println!("  opcgate-bin:    {}", crate::VERSION);
    println!("  opcgate-core:   {}", opcgate_core::VERSION);
    println!("  opcgate-config: {}", opcgate_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2021");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Defaults:");
    println!("  Client Name:  {DEFAULT_CLIENT_NAME}");
    println!("  Gateway Port: {DEFAULT_GATEWAY_PORT}");
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
