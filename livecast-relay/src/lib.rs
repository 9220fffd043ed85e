//! Livecast media relay
//!
//! This crate is the concurrency-sensitive core of the service: it owns
//! live WebRTC peer sessions, fans one broadcaster's media out to many
//! viewers, and answers SDP offers.
//!
//! ## Architecture
//!
//! - **`SessionRegistry`**: owns every live peer session and drives the
//!   session state machine; terminal states evict the session
//! - **`BroadcastMap`**: stream key → relayed tracks, the unit of fan-out
//! - **`RelayTrack`**: one inbound track wrapped for N downstream consumers
//!   without re-encoding
//! - **`SignalingService`**: accepts offers, wires broadcaster tracks into
//!   the broadcast map or attaches relayed tracks to viewers, returns the
//!   answer

mod broadcast;
mod config;
mod registry;
mod session;
mod signaling;
mod track;
mod types;

pub use broadcast::{BroadcastMap, BroadcastSummary};
pub use config::RelayConfig;
pub use registry::SessionRegistry;
pub use session::{PeerRole, PeerSession, SessionState};
pub use signaling::SignalingService;
pub use track::{RelayTrack, TrackKind, TrackStats};
pub use types::{SessionId, StreamKey, TrackId};
