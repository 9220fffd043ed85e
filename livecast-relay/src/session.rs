//! Peer session state
//!
//! A session is created when an offer is received and destroyed when its
//! connectivity reaches a terminal state. Transitions follow an explicit
//! table rather than ad hoc callback nesting, so terminal-state cleanup is
//! exhaustive by construction.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use webrtc::peer_connection::RTCPeerConnection;

use crate::types::{SessionId, StreamKey};

/// Role a peer session plays for its stream key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    Broadcaster,
    Viewer,
}

/// Session connectivity state
///
/// `new → connecting → connected → {failed, closed}`; `failed` and
/// `closed` are terminal. No transition is retried; a failed session is
/// closed and the client must renegotiate with a fresh offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    New,
    Connecting,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// Transition table for the session state machine.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        use SessionState::{Closed, Connected, Connecting, Failed, New};
        matches!(
            (self, next),
            (New, Connecting | Failed | Closed)
                | (Connecting, Connected | Failed | Closed)
                | (Connected, Failed | Closed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// A live peer session, exclusively owned by the [`SessionRegistry`].
///
/// [`SessionRegistry`]: crate::SessionRegistry
pub struct PeerSession {
    pub id: SessionId,
    pub role: PeerRole,
    pub stream_key: StreamKey,
    pc: Arc<RTCPeerConnection>,
    state: RwLock<SessionState>,
    /// Parents every task spawned on behalf of this session (RTP pumps,
    /// keyframe tickers). Cancelled exactly once, on close.
    cancel: CancellationToken,
    closing: AtomicBool,
}

impl PeerSession {
    pub(crate) fn new(
        role: PeerRole,
        stream_key: StreamKey,
        pc: Arc<RTCPeerConnection>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::generate(),
            role,
            stream_key,
            pc,
            state: RwLock::new(SessionState::New),
            cancel: CancellationToken::new(),
            closing: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Apply a transition if the table allows it. Returns whether the
    /// state changed.
    pub(crate) fn try_transition(&self, next: SessionState) -> bool {
        let mut state = self.state.write();
        if state.can_transition(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    /// First caller wins; later calls observe an in-progress close and
    /// skip teardown, making close idempotent.
    pub(crate) fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
