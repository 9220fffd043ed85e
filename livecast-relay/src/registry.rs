//! Peer connection registry
//!
//! Owns the set of live peer sessions and is the sole driver of their
//! state machine. Terminal states (`failed`, `closed`) trigger immediate
//! eviction plus broadcast-map cleanup for any tracks the session
//! contributed. No transition is retried; clients renegotiate with a
//! fresh offer.

use dashmap::DashMap;
use livecast_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;

use crate::broadcast::BroadcastMap;
use crate::config::RelayConfig;
use crate::session::{PeerRole, PeerSession, SessionState};
use crate::types::{SessionId, StreamKey};

pub struct SessionRegistry {
    /// Shared WebRTC stack (codecs + default interceptors), built once.
    api: API,
    config: RelayConfig,
    sessions: DashMap<SessionId, Arc<PeerSession>>,
    broadcasts: Arc<BroadcastMap>,
}

impl SessionRegistry {
    pub fn new(config: RelayConfig, broadcasts: Arc<BroadcastMap>) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Internal(format!("codec registration failed: {e}")))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| Error::Internal(format!("interceptor registration failed: {e}")))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            config,
            sessions: DashMap::new(),
            broadcasts,
        })
    }

    /// Allocate a peer session and enroll it in the active set.
    pub async fn create(&self, role: PeerRole, stream_key: StreamKey) -> Result<Arc<PeerSession>> {
        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.config.ice_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let pc = self
            .api
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| Error::Negotiation(format!("peer connection setup failed: {e}")))?;

        let session = PeerSession::new(role, stream_key, Arc::new(pc));
        self.sessions
            .insert(session.id.clone(), Arc::clone(&session));

        info!(
            session_id = %session.id,
            role = ?session.role,
            stream_key = %session.stream_key,
            active = self.sessions.len(),
            "session created"
        );
        Ok(session)
    }

    /// Tear down a session: cancel its tasks, close the transport, remove
    /// it from the active set, and release any tracks it contributed.
    /// Idempotent: later calls are no-ops.
    pub async fn close(&self, session: &Arc<PeerSession>) {
        if !session.begin_close() {
            return;
        }

        session.try_transition(SessionState::Closed);
        session.cancellation_token().cancel();
        if let Err(e) = session.peer_connection().close().await {
            debug!(session_id = %session.id, error = %e, "peer connection close reported an error");
        }
        self.sessions.remove(&session.id);
        let released = self
            .broadcasts
            .remove_session_tracks(&session.stream_key, &session.id);

        info!(
            session_id = %session.id,
            role = ?session.role,
            released_tracks = released,
            active = self.sessions.len(),
            "session closed"
        );
    }

    /// The sole path by which session state advances. Illegal transitions
    /// are logged and dropped; terminal states close the session.
    pub async fn handle_state_change(&self, session_id: &SessionId, next: SessionState) {
        let Some(session) = self.get(session_id) else {
            debug!(session_id = %session_id, "state change for unknown session");
            return;
        };

        let current = session.state();
        if !session.try_transition(next) {
            if !current.is_terminal() {
                warn!(
                    session_id = %session_id,
                    from = ?current,
                    to = ?next,
                    "illegal state transition ignored"
                );
            }
            return;
        }

        debug!(session_id = %session_id, from = ?current, to = ?next, "session state changed");
        if next.is_terminal() {
            self.close(&session).await;
        }
    }

    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<PeerSession>> {
        self.sessions.get(session_id).map(|e| Arc::clone(e.value()))
    }

    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<PeerSession>> {
        self.sessions.iter().map(|e| Arc::clone(e.value())).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    #[must_use]
    pub fn broadcasts(&self) -> &Arc<BroadcastMap> {
        &self.broadcasts
    }

    /// Close every active session within the configured bound, then clear
    /// the registry and broadcast map unconditionally. Hard stop: in-flight
    /// negotiations are not drained.
    pub async fn shutdown(&self) {
        let sessions = self.sessions();
        info!(count = sessions.len(), "closing all sessions");

        let close_all = async {
            for session in &sessions {
                self.close(session).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_wait, close_all)
            .await
            .is_err()
        {
            warn!(
                wait = ?self.config.shutdown_wait,
                "shutdown bound reached, dropping remaining sessions"
            );
        }

        self.sessions.clear();
        self.broadcasts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{RelayTrack, TrackKind};
    use std::sync::Weak;
    use tokio_util::sync::CancellationToken;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(RelayConfig::default(), Arc::new(BroadcastMap::new()))
            .expect("registry should build")
    }

    #[tokio::test]
    async fn test_create_enrolls_session() {
        let registry = registry();
        let session = registry
            .create(PeerRole::Viewer, StreamKey::from("abc"))
            .await
            .expect("session should be created");

        assert_eq!(registry.len(), 1);
        assert_eq!(session.state(), SessionState::New);
        assert!(registry.get(&session.id).is_some());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let registry = registry();
        let session = registry
            .create(PeerRole::Viewer, StreamKey::from("abc"))
            .await
            .expect("session should be created");

        registry.close(&session).await;
        assert_eq!(registry.len(), 0);
        assert_eq!(session.state(), SessionState::Closed);

        // Second close has no additional effect and does not panic.
        registry.close(&session).await;
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_state_change_drives_lifecycle() {
        let registry = registry();
        let session = registry
            .create(PeerRole::Viewer, StreamKey::from("abc"))
            .await
            .expect("session should be created");

        registry
            .handle_state_change(&session.id, SessionState::Connecting)
            .await;
        assert_eq!(session.state(), SessionState::Connecting);

        registry
            .handle_state_change(&session.id, SessionState::Connected)
            .await;
        assert_eq!(session.state(), SessionState::Connected);

        registry
            .handle_state_change(&session.id, SessionState::Failed)
            .await;
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(registry.len(), 0, "terminal state evicts the session");
    }

    #[tokio::test]
    async fn test_illegal_transition_ignored() {
        let registry = registry();
        let session = registry
            .create(PeerRole::Viewer, StreamKey::from("abc"))
            .await
            .expect("session should be created");

        // new -> connected skips connecting and is dropped.
        registry
            .handle_state_change(&session.id, SessionState::Connected)
            .await;
        assert_eq!(session.state(), SessionState::New);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_state_releases_contributed_tracks() {
        let broadcasts = Arc::new(BroadcastMap::new());
        let registry = SessionRegistry::new(RelayConfig::default(), Arc::clone(&broadcasts))
            .expect("registry should build");
        let key = StreamKey::from("abc");
        let session = registry
            .create(PeerRole::Broadcaster, key.clone())
            .await
            .expect("session should be created");

        let track = RelayTrack::new(
            TrackKind::Video,
            RTCRtpCodecCapability::default(),
            0,
            session.id.clone(),
            "livecast",
            Weak::new(),
            CancellationToken::new(),
        );
        broadcasts.register_track(&key, track);
        assert_eq!(broadcasts.tracks_for(&key).len(), 1);

        registry
            .handle_state_change(&session.id, SessionState::Failed)
            .await;
        assert!(broadcasts.tracks_for(&key).is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let registry = registry();
        for _ in 0..3 {
            registry
                .create(PeerRole::Viewer, StreamKey::from("abc"))
                .await
                .expect("session should be created");
        }
        assert_eq!(registry.len(), 3);

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert!(registry.broadcasts().is_empty());
    }
}
