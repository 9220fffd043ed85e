mod server;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use livecast_api::rooms::RoomHub;
use livecast_core::{
    config::load_config, logging, AllowAllValidator, StaticKeyValidator, StreamKeyValidator,
};
use livecast_relay::{BroadcastMap, RelayConfig, SessionRegistry, SignalingService};

use server::LivecastServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Livecast server starting...");
    info!("Signaling address: {}", config.bind_address());

    // 3. Install the rustls crypto provider before any TLS use
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;
    }

    // 4. Stream key validator (platform allowlist, or accept-any)
    let validator: Arc<dyn StreamKeyValidator> = if config.webrtc.allowed_stream_keys.is_empty() {
        info!("No stream key allowlist configured, accepting any key");
        Arc::new(AllowAllValidator)
    } else {
        info!(
            keys = config.webrtc.allowed_stream_keys.len(),
            "Stream key allowlist enabled"
        );
        Arc::new(StaticKeyValidator::new(
            config.webrtc.allowed_stream_keys.iter().cloned(),
        ))
    };

    // 5. Relay services
    let relay_config = RelayConfig {
        ice_servers: config.webrtc.ice_servers.clone(),
        ice_gathering_timeout: Duration::from_secs(config.webrtc.ice_gathering_timeout_secs),
        keyframe_interval: Duration::from_secs(config.webrtc.keyframe_interval_secs),
        shutdown_wait: Duration::from_secs(config.webrtc.shutdown_wait_secs),
    };
    let broadcasts = Arc::new(BroadcastMap::new());
    let registry = Arc::new(SessionRegistry::new(relay_config, broadcasts)?);
    let signaling = Arc::new(SignalingService::new(Arc::clone(&registry), validator));
    let rooms = Arc::new(RoomHub::new());

    // 6. Start the server and wait for shutdown
    let server = LivecastServer::new(config, signaling, registry, rooms);
    server.start().await
}
