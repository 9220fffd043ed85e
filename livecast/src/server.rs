//! Server lifecycle management
//!
//! Binds the signaling listener (over TLS when certificate materials are
//! available, plain HTTP otherwise) and turns a shutdown signal into a
//! hard stop: the listener drains briefly, then every peer session is
//! closed and the broadcast map cleared.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use livecast_api::http::create_router;
use livecast_api::rooms::RoomHub;
use livecast_core::{tls, Config};
use livecast_relay::{SessionRegistry, SignalingService};

pub struct LivecastServer {
    config: Config,
    signaling: Arc<SignalingService>,
    registry: Arc<SessionRegistry>,
    rooms: Arc<RoomHub>,
}

impl LivecastServer {
    pub const fn new(
        config: Config,
        signaling: Arc<SignalingService>,
        registry: Arc<SessionRegistry>,
        rooms: Arc<RoomHub>,
    ) -> Self {
        Self {
            config,
            signaling,
            registry,
            rooms,
        }
    }

    /// Serve until a shutdown signal arrives, then tear everything down.
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address().parse()?;
        let router = create_router(
            Arc::clone(&self.signaling),
            Arc::clone(&self.rooms),
            Arc::new(self.config.clone()),
        );

        let handle = axum_server::Handle::new();
        {
            let handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                info!("Shutdown signal received, stopping listener...");
                handle.graceful_shutdown(Some(Duration::from_secs(5)));
            });
        }

        let tls_config =
            tls::load_optional(&self.config.tls.cert_path, &self.config.tls.key_path).await;
        let served = match tls_config {
            Some(tls_config) => {
                info!("Signaling listening on https://{addr}");
                axum_server::bind_rustls(addr, tls_config)
                    .handle(handle)
                    .serve(router.into_make_service())
                    .await
            }
            None => {
                info!("Signaling listening on http://{addr}");
                axum_server::bind(addr)
                    .handle(handle)
                    .serve(router.into_make_service())
                    .await
            }
        };
        if let Err(e) = served {
            error!("Signaling listener error: {}", e);
        }

        // Hard stop: close every session within the configured bound and
        // clear the broadcast map unconditionally. In-flight chat events
        // are not drained.
        info!("Listener stopped, closing sessions...");
        self.registry.shutdown().await;
        info!("Livecast server shut down complete");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
