//! HTTP and WebSocket surface of the livecast relay: the signaling
//! endpoint, static page delivery, and the room presence/chat channel.

pub mod http;
pub mod rooms;
