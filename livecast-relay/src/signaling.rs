//! Offer/answer signaling
//!
//! `handle_offer` is the single entry point for both roles. A broadcaster
//! offer subscribes the session's future inbound tracks to the broadcast
//! map; a viewer offer attaches the current snapshot of relayed tracks to
//! the new session. Either way the offer becomes the remote description
//! and the generated answer is returned once ICE gathering settles.

use livecast_core::{Error, Result, StreamKeyValidator};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::track::track_local::TrackLocal;

use crate::registry::SessionRegistry;
use crate::session::{PeerRole, PeerSession, SessionState};
use crate::track::{RelayTrack, TrackKind};
use crate::types::StreamKey;

pub struct SignalingService {
    registry: Arc<SessionRegistry>,
    validator: Arc<dyn StreamKeyValidator>,
}

impl SignalingService {
    pub fn new(registry: Arc<SessionRegistry>, validator: Arc<dyn StreamKeyValidator>) -> Self {
        Self {
            registry,
            validator,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Negotiate a peer session from an SDP offer.
    ///
    /// Fails with [`Error::InvalidOffer`] when the payload does not parse
    /// as SDP (no session is created) and with [`Error::UnknownStreamKey`]
    /// when a broadcaster offers for a key the platform rejects. A viewer
    /// offer for an unknown or idle key is *not* an error: the answer is
    /// valid, it just carries no media until the viewer renegotiates.
    pub async fn handle_offer(
        &self,
        offer_sdp: String,
        stream_key: StreamKey,
        broadcaster: bool,
    ) -> Result<RTCSessionDescription> {
        let offer =
            RTCSessionDescription::offer(offer_sdp).map_err(|e| Error::InvalidOffer(e.to_string()))?;

        if broadcaster && !self.validator.is_valid(stream_key.as_str()).await {
            warn!(stream_key = %stream_key, "broadcaster offer rejected by stream key validator");
            return Err(Error::UnknownStreamKey(stream_key.to_string()));
        }

        let role = if broadcaster {
            PeerRole::Broadcaster
        } else {
            PeerRole::Viewer
        };
        let session = self.registry.create(role, stream_key).await?;

        match self.negotiate(&session, offer, broadcaster).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                // Failures past this point are session-local: close and
                // evict, never touch other sessions.
                self.registry.close(&session).await;
                Err(e)
            }
        }
    }

    async fn negotiate(
        &self,
        session: &Arc<PeerSession>,
        offer: RTCSessionDescription,
        broadcaster: bool,
    ) -> Result<RTCSessionDescription> {
        self.wire_connection_state(session);
        if broadcaster {
            self.wire_broadcaster_tracks(session);
        } else {
            let attached = self.attach_viewer_tracks(session).await?;
            info!(
                session_id = %session.id,
                stream_key = %session.stream_key,
                attached,
                "viewer session prepared"
            );
        }

        let pc = session.peer_connection();
        pc.set_remote_description(offer)
            .await
            .map_err(|e| Error::InvalidOffer(format!("offer rejected: {e}")))?;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("create_answer failed: {e}")))?;

        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("set_local_description failed: {e}")))?;

        // Bounded: a peer that never finishes gathering still gets an
        // answer with whatever candidates exist.
        let _ = tokio::time::timeout(
            self.registry.config().ice_gathering_timeout,
            gather_complete.recv(),
        )
        .await;

        pc.local_description()
            .await
            .ok_or_else(|| Error::Negotiation("local description unavailable after gathering".to_string()))
    }

    /// Route connectivity-state callbacks through the registry, the sole
    /// owner of session state transitions.
    fn wire_connection_state(&self, session: &Arc<PeerSession>) {
        let registry = Arc::clone(&self.registry);
        let session_id = session.id.clone();
        session
            .peer_connection()
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let registry = Arc::clone(&registry);
                let session_id = session_id.clone();
                Box::pin(async move {
                    if let Some(next) = map_connection_state(state) {
                        // Closing a session re-enters this callback path
                        // inside the webrtc stack; the transition must run
                        // on its own task.
                        tokio::spawn(async move {
                            registry.handle_state_change(&session_id, next).await;
                        });
                    }
                })
            }));
    }

    /// Relay every future inbound track of a broadcaster session into the
    /// broadcast map.
    fn wire_broadcaster_tracks(&self, session: &Arc<PeerSession>) {
        let broadcasts = Arc::clone(self.registry.broadcasts());
        let stream_key = session.stream_key.clone();
        let session_id = session.id.clone();
        let source_pc = Arc::downgrade(session.peer_connection());
        let parent = session.cancellation_token().clone();
        let keyframe_interval = self.registry.config().keyframe_interval;

        session
            .peer_connection()
            .on_track(Box::new(move |remote, _receiver, _transceiver| {
                let broadcasts = Arc::clone(&broadcasts);
                let stream_key = stream_key.clone();
                let session_id = session_id.clone();
                let source_pc = source_pc.clone();
                let cancel = parent.child_token();
                Box::pin(async move {
                    let kind = TrackKind::from(remote.kind());
                    info!(
                        stream_key = %stream_key,
                        kind = %kind,
                        codec = %remote.codec().capability.mime_type,
                        ssrc = remote.ssrc(),
                        "broadcaster track received"
                    );

                    let track = RelayTrack::new(
                        kind,
                        remote.codec().capability.clone(),
                        remote.ssrc(),
                        session_id,
                        stream_key.as_str(),
                        source_pc,
                        cancel,
                    );
                    broadcasts.register_track(&stream_key, Arc::clone(&track));
                    track.spawn_keyframe_ticker(keyframe_interval);
                    track.spawn_pump(remote, broadcasts, stream_key);
                })
            }));
    }

    /// Attach the current track snapshot to a viewer session and nudge the
    /// sources for keyframes so playback starts promptly.
    async fn attach_viewer_tracks(&self, session: &Arc<PeerSession>) -> Result<usize> {
        let tracks = self.registry.broadcasts().tracks_for(&session.stream_key);
        if tracks.is_empty() {
            debug!(
                stream_key = %session.stream_key,
                "viewer attached to a stream key with no active broadcast"
            );
            return Ok(0);
        }

        let pc = session.peer_connection();
        for track in &tracks {
            let local: Arc<dyn TrackLocal + Send + Sync> = track.local();
            pc.add_track(local)
                .await
                .map_err(|e| Error::Negotiation(format!("track attach failed: {e}")))?;
        }
        for track in &tracks {
            track.request_keyframe().await;
        }
        Ok(tracks.len())
    }
}

fn map_connection_state(state: RTCPeerConnectionState) -> Option<SessionState> {
    match state {
        RTCPeerConnectionState::Connecting => Some(SessionState::Connecting),
        RTCPeerConnectionState::Connected => Some(SessionState::Connected),
        // The session FSM has no disconnected limbo: no retry happens
        // either way, so a disconnect is a failure.
        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
            Some(SessionState::Failed)
        }
        RTCPeerConnectionState::Closed => Some(SessionState::Closed),
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => None,
    }
}
