//! Orchestrator settings.

use std::net::{IpAddr, Ipv4Addr};

/// Where match workers listen, and how clients are told to reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Host written into a PLAYING room's endpoint.
    pub advertise_host: String,

    /// Interface used when probing for a free port.
    pub port_bind_host: IpAddr,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            advertise_host: "127.0.0.1".to_string(),
            port_bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}
