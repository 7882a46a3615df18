// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `read`: Read tags through a session
//! - `write`: Write `TAG=VALUE` pairs through a session
//! - `sessions`: Print a demonstration gateway's session table
//! - `validate`: Validate configuration file
//! - `version`: Show version information

mod output;
mod read;
mod sessions;
mod validate;
mod version;
mod write;

pub use read::read;
pub use sessions::sessions;
pub use validate::validate;
pub use version::version;
pub use write::write;

use opcgate_config::{ConfigLoader, OpcGateConfig};
use opcgate_core::provider::{MemoryProvider, MemoryProviderFactory};
use opcgate_core::Session;
use tracing::{debug, info, warn};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;
use crate::logging::init_logging;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    let command = cli.effective_command();
    if let Commands::Version = command {
        return version::version(&cli);
    }

    let config = load_config(&cli)?;
    init_logging(
        cli.effective_log_level(config.logging.level.as_str()),
        cli.effective_log_format(config.logging.format),
    );

    match command {
        Commands::Read(args) => read::read(&config, args).await,
        Commands::Write(args) => write::write(&config, args).await,
        Commands::Sessions(args) => sessions::sessions(&config, args).await,
        Commands::Validate(args) => validate::validate(&cli, &config, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration named on the command line, or the built-in
/// defaults with environment overrides.
pub fn load_config(cli: &Cli) -> BinResult<OpcGateConfig> {
    let loader = ConfigLoader::new();
    let config = match &cli.config {
        Some(path) => loader.load(path)?,
        None => loader.defaults()?,
    };
    Ok(config)
}

/// Factory for the in-memory simulation provider the commands run against.
pub(crate) fn simulation_factory() -> MemoryProviderFactory {
    MemoryProviderFactory::new(MemoryProvider::simulation())
}

/// Opens a session with the configured settings and connects it.
///
/// `server` replaces the configured server list for this connection.
pub(crate) async fn open_session(
    config: &OpcGateConfig,
    server: Option<&str>,
) -> BinResult<Session> {
    let factory = simulation_factory();
    let mut session = Session::open(&factory, config.session_settings())?;
    session.set_trace(|line| debug!(target: "opcgate::trace", "{line}"));
    session.connect(server, None).await?;

    info!(
        server = session.server().unwrap_or_default(),
        class = session.class(),
        "Connected"
    );
    Ok(session)
}

/// Closes a session, logging instead of failing.
pub(crate) async fn close_session(session: &mut Session) {
    if let Err(error) = session.close().await {
        warn!("Close failed: {error}");
    }
}
