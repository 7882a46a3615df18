// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session defaults.

use serde::{Deserialize, Serialize};

use crate::read::ReadOptions;
use crate::write::WriteOptions;

/// Provider class names tried in order when opening a session.
pub const DEFAULT_CLASSES: &str = "OPC DA Automation Wrapper 2.02;Matrikon.OPC.Automation;\
Graybox.OPC.DAWrapper;HSCOPC.Automation;RSI.OPCAutomation;OPC.Automation";

/// Server names tried in order by `connect` when none is given.
pub const DEFAULT_SERVERS: &str = "Hci.TPNServer;HwHsc.OPCServer;opc.deltav.1;AIM.OPC.1;\
Yokogawa.ExaopcDAEXQ.1;OSI.DA.1;OPC.PHDServerDA.1;Aspen.Infoplus21_DA.1;\
National Instruments.OPCLabVIEW;RSLinx OPC Server;KEPware.KEPServerEx.V4;\
Matrikon.OPC.Simulation;Prosys.OPC.Simulation;CCOPC.XMLWrapper.1;\
OPC.SimaticHMI.CoRtHmiRTm.1";

/// Client name announced after connecting.
pub const DEFAULT_CLIENT_NAME: &str = "OpenOPC";

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Port of the remote gateway service.
pub const DEFAULT_GATEWAY_PORT: u16 = 7766;

/// Settings a session is opened with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Semicolon-separated provider class names.
    pub class: String,
    /// Semicolon-separated server names.
    pub server: String,
    /// Host the servers run on.
    pub host: String,
    /// Client name announced to the server.
    pub client_name: String,
    /// Options used by `get` and by callers that do not pass their own.
    #[serde(skip)]
    pub read_defaults: ReadOptions,
    /// Options used by `set` and by callers that do not pass their own.
    #[serde(skip)]
    pub write_defaults: WriteOptions,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            class: DEFAULT_CLASSES.to_string(),
            server: DEFAULT_SERVERS.to_string(),
            host: DEFAULT_HOST.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            read_defaults: ReadOptions::default(),
            write_defaults: WriteOptions::default(),
        }
    }
}

impl SessionSettings {
    /// Sets the class list.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    /// Sets the server list.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the client name.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Sets the default read options.
    pub fn with_read_defaults(mut self, options: ReadOptions) -> Self {
        self.read_defaults = options;
        self
    }

    /// Sets the default write options.
    pub fn with_write_defaults(mut self, options: WriteOptions) -> Self {
        self.write_defaults = options;
        self
    }
}

/// Splits a semicolon-separated list, skipping empty entries.
pub fn split_list(list: &str) -> Vec<&str> {
    list.split(';').filter(|s| !s.trim().is_empty()).collect()
}
