//! Relay configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// ICE server urls used when building peer connections
    pub ice_servers: Vec<String>,
    /// Upper bound on ICE candidate gathering before answering
    pub ice_gathering_timeout: Duration,
    /// Interval between keyframe (PLI) requests towards broadcasters
    pub keyframe_interval: Duration,
    /// Bound on closing out live sessions during shutdown
    pub shutdown_wait: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            ice_gathering_timeout: Duration::from_secs(10),
            keyframe_interval: Duration::from_secs(3),
            shutdown_wait: Duration::from_secs(5),
        }
    }
}
