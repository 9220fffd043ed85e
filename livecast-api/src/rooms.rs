//! Room presence & chat hub
//!
//! Rooms group channel clients by stream key, independent of the media
//! relay path. Membership is purely in-memory and ephemeral; chat events
//! are forwarded to the members connected at send time and never stored.
//! Delivery is at-most-once and best-effort.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Unique identifier for a connected channel client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    #[must_use]
    pub fn generate() -> Self {
        Self(nanoid::nanoid!(12))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Channel events sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        #[serde(rename = "streamKey")]
        stream_key: String,
    },
    LeaveRoom {
        #[serde(rename = "streamKey")]
        stream_key: String,
    },
    SendChat {
        #[serde(rename = "streamKey")]
        stream_key: String,
        username: String,
        message: String,
    },
}

/// Channel events broadcast to room members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserJoined { count: usize },
    UserLeft { count: usize },
    NewChat {
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Stream key → connected channel members.
#[derive(Default)]
pub struct RoomHub {
    rooms: DashMap<String, HashMap<ClientId, mpsc::Sender<ServerEvent>>>,
}

impl RoomHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client to a room and announce the updated member count to
    /// everyone in it (the joiner included).
    pub fn join(&self, client_id: &ClientId, sender: mpsc::Sender<ServerEvent>, stream_key: &str) {
        let mut room = self.rooms.entry(stream_key.to_string()).or_default();
        room.insert(client_id.clone(), sender);
        let (count, members) = snapshot(&room);
        drop(room);

        debug!(client_id = %client_id, stream_key, count, "client joined room");
        deliver(&members, &ServerEvent::UserJoined { count });
    }

    /// Remove a client from a room and announce the updated count to the
    /// remaining members. A no-op for clients that never joined.
    pub fn leave(&self, client_id: &ClientId, stream_key: &str) {
        let Some(mut room) = self.rooms.get_mut(stream_key) else {
            return;
        };
        if room.remove(client_id).is_none() {
            return;
        }
        let (count, members) = snapshot(&room);
        drop(room);

        self.rooms.remove_if(stream_key, |_, room| room.is_empty());

        debug!(client_id = %client_id, stream_key, count, "client left room");
        deliver(&members, &ServerEvent::UserLeft { count });
    }

    /// Broadcast a chat event to the room's current members with a
    /// server-assigned timestamp. Fire-and-forget: no acknowledgement, no
    /// buffering for members not connected right now.
    pub fn chat(&self, stream_key: &str, username: &str, message: &str) {
        let Some(room) = self.rooms.get(stream_key) else {
            debug!(stream_key, "chat for a room with no members");
            return;
        };
        let (_, members) = snapshot(&room);
        drop(room);

        deliver(
            &members,
            &ServerEvent::NewChat {
                username: username.to_string(),
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    #[must_use]
    pub fn member_count(&self, stream_key: &str) -> usize {
        self.rooms.get(stream_key).map_or(0, |room| room.len())
    }

    /// Per-room view for the stats surface.
    #[must_use]
    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .map(|entry| RoomSummary {
                stream_key: entry.key().clone(),
                members: entry.value().len(),
            })
            .collect()
    }
}

fn snapshot(
    room: &HashMap<ClientId, mpsc::Sender<ServerEvent>>,
) -> (usize, Vec<mpsc::Sender<ServerEvent>>) {
    (room.len(), room.values().cloned().collect())
}

fn deliver(members: &[mpsc::Sender<ServerEvent>], event: &ServerEvent) {
    for sender in members {
        // Full or closed buffers drop the event: at-most-once delivery.
        if let Err(e) = sender.try_send(event.clone()) {
            debug!(error = %e, "channel event dropped");
        }
    }
}

/// Membership count for one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub stream_key: String,
    pub members: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (ClientId, mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (ClientId::generate(), tx, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_join_then_leave_restores_count() {
        let hub = RoomHub::new();
        let (a, a_tx, _a_rx) = client();
        let (b, b_tx, _b_rx) = client();

        hub.join(&a, a_tx, "abc");
        assert_eq!(hub.member_count("abc"), 1);

        hub.join(&b, b_tx, "abc");
        assert_eq!(hub.member_count("abc"), 2);

        hub.leave(&b, "abc");
        assert_eq!(hub.member_count("abc"), 1);

        hub.leave(&a, "abc");
        assert_eq!(hub.member_count("abc"), 0);
    }

    #[test]
    fn test_join_announces_count_to_everyone() {
        let hub = RoomHub::new();
        let (a, a_tx, mut a_rx) = client();
        let (b, b_tx, mut b_rx) = client();

        hub.join(&a, a_tx, "abc");
        assert_eq!(drain(&mut a_rx), vec![ServerEvent::UserJoined { count: 1 }]);

        hub.join(&b, b_tx, "abc");
        assert_eq!(drain(&mut a_rx), vec![ServerEvent::UserJoined { count: 2 }]);
        assert_eq!(drain(&mut b_rx), vec![ServerEvent::UserJoined { count: 2 }]);
    }

    #[test]
    fn test_chat_reaches_exactly_the_rooms_members() {
        let hub = RoomHub::new();
        let (a, a_tx, mut a_rx) = client();
        let (b, b_tx, mut b_rx) = client();
        let (c, c_tx, mut c_rx) = client();

        hub.join(&a, a_tx, "abc");
        hub.join(&b, b_tx, "abc");
        hub.join(&c, c_tx, "other");
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        hub.chat("abc", "alice", "hello");

        let a_events = drain(&mut a_rx);
        assert_eq!(a_events.len(), 1);
        assert!(matches!(
            &a_events[0],
            ServerEvent::NewChat { username, message, .. }
                if username == "alice" && message == "hello"
        ));
        assert_eq!(drain(&mut b_rx).len(), 1);
        assert!(drain(&mut c_rx).is_empty(), "other rooms never see the chat");
    }

    #[test]
    fn test_member_connected_after_chat_never_receives_it() {
        let hub = RoomHub::new();
        let (a, a_tx, mut a_rx) = client();
        hub.join(&a, a_tx, "abc");
        drain(&mut a_rx);

        hub.chat("abc", "alice", "early");

        let (b, b_tx, mut b_rx) = client();
        hub.join(&b, b_tx, "abc");
        let late_events = drain(&mut b_rx);
        assert_eq!(late_events, vec![ServerEvent::UserJoined { count: 2 }]);
    }

    #[test]
    fn test_slow_member_drops_events_without_blocking() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::channel(1);
        let a = ClientId::generate();

        hub.join(&a, tx, "abc");
        // The join announcement fills the single-slot buffer; the chat
        // below must be dropped, not block or panic.
        hub.chat("abc", "alice", "dropped");

        assert_eq!(drain(&mut rx), vec![ServerEvent::UserJoined { count: 1 }]);
    }

    #[test]
    fn test_leave_without_join_is_a_no_op() {
        let hub = RoomHub::new();
        hub.leave(&ClientId::from("ghost"), "abc");
        assert_eq!(hub.member_count("abc"), 0);
    }

    #[test]
    fn test_event_wire_names() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"join_room","data":{"streamKey":"abc"}}"#)
                .expect("join_room should parse");
        assert_eq!(
            join,
            ClientEvent::JoinRoom {
                stream_key: "abc".to_string()
            }
        );

        let chat: ClientEvent = serde_json::from_str(
            r#"{"event":"send_chat","data":{"streamKey":"abc","username":"alice","message":"hi"}}"#,
        )
        .expect("send_chat should parse");
        assert!(matches!(chat, ClientEvent::SendChat { .. }));

        let out = serde_json::to_string(&ServerEvent::UserLeft { count: 3 })
            .expect("user_left should serialize");
        assert!(out.contains(r#""event":"user_left""#));
        assert!(out.contains(r#""count":3"#));
    }
}
