//! Broadcast map
//!
//! Maps a stream key to the relayed tracks its broadcaster currently
//! contributes, the unit of fan-out. Entries are created lazily on the
//! first track, pruned per-track as upstreams end, and removed entirely
//! when empty. Viewers receive an attach-time snapshot: tracks registered
//! later are not retroactively delivered.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::track::{RelayTrack, TrackKind};
use crate::types::{SessionId, StreamKey, TrackId};

#[derive(Default)]
struct BroadcastEntry {
    /// At most one live track per media kind; `BTreeMap` keeps the
    /// audio-before-video order stable for snapshots.
    tracks: BTreeMap<TrackKind, Arc<RelayTrack>>,
}

/// Stream key → relayed tracks.
#[derive(Default)]
pub struct BroadcastMap {
    entries: DashMap<StreamKey, BroadcastEntry>,
}

impl BroadcastMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relayed track under a stream key.
    ///
    /// Arbitration for concurrent broadcasters on one key: a track of a
    /// kind that is already live atomically replaces the previous one.
    /// The superseded relay is cancelled and returned.
    pub fn register_track(
        &self,
        stream_key: &StreamKey,
        track: Arc<RelayTrack>,
    ) -> Option<Arc<RelayTrack>> {
        let mut entry = self.entries.entry(stream_key.clone()).or_default();
        let replaced = entry.tracks.insert(track.kind, Arc::clone(&track));
        drop(entry);

        if let Some(old) = &replaced {
            warn!(
                stream_key = %stream_key,
                kind = %track.kind,
                old_session = %old.session_id,
                new_session = %track.session_id,
                "track superseded by a newer broadcaster"
            );
            old.cancel();
        } else {
            info!(
                stream_key = %stream_key,
                kind = %track.kind,
                session_id = %track.session_id,
                "track registered"
            );
        }
        replaced
    }

    /// Deregister a single track and prune the entry if it was the last.
    /// A no-op for tracks already removed.
    pub fn remove_track(&self, stream_key: &StreamKey, track_id: &TrackId) {
        let Some(mut entry) = self.entries.get_mut(stream_key) else {
            return;
        };
        let before = entry.tracks.len();
        entry.tracks.retain(|_, t| t.id != *track_id);
        let removed = before - entry.tracks.len();
        drop(entry);

        if removed > 0 {
            debug!(stream_key = %stream_key, track_id = %track_id, "track deregistered");
        }
        self.entries
            .remove_if(stream_key, |_, entry| entry.tracks.is_empty());
    }

    /// Remove every track a session contributed, cancelling their relays.
    /// Part of terminal-state cleanup.
    pub fn remove_session_tracks(&self, stream_key: &StreamKey, session_id: &SessionId) -> usize {
        let Some(mut entry) = self.entries.get_mut(stream_key) else {
            return 0;
        };
        let mut removed = Vec::new();
        entry.tracks.retain(|_, t| {
            if t.session_id == *session_id {
                removed.push(Arc::clone(t));
                false
            } else {
                true
            }
        });
        drop(entry);

        for track in &removed {
            track.cancel();
        }
        self.entries
            .remove_if(stream_key, |_, entry| entry.tracks.is_empty());

        if !removed.is_empty() {
            debug!(
                stream_key = %stream_key,
                session_id = %session_id,
                count = removed.len(),
                "session tracks released"
            );
        }
        removed.len()
    }

    /// Snapshot of the tracks currently relayed for a stream key, ordered
    /// audio before video. Empty for unknown keys, which is a valid
    /// outcome: the viewer still gets an answer, just without media.
    #[must_use]
    pub fn tracks_for(&self, stream_key: &StreamKey) -> Vec<Arc<RelayTrack>> {
        self.entries
            .get(stream_key)
            .map(|entry| entry.tracks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stream keys with at least one live track.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-key view for the stats surface.
    #[must_use]
    pub fn summaries(&self) -> Vec<BroadcastSummary> {
        self.entries
            .iter()
            .map(|entry| BroadcastSummary {
                stream_key: entry.key().clone(),
                kinds: entry.value().tracks.keys().copied().collect(),
            })
            .collect()
    }

    /// Cancel every relay and drop all entries. Shutdown is a hard stop.
    pub fn clear(&self) {
        for entry in self.entries.iter() {
            for track in entry.value().tracks.values() {
                track.cancel();
            }
        }
        self.entries.clear();
    }
}

/// Active tracks for one stream key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub stream_key: StreamKey,
    pub kinds: Vec<TrackKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;
    use tokio_util::sync::CancellationToken;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

    fn track(kind: TrackKind, session: &str) -> Arc<RelayTrack> {
        RelayTrack::new(
            kind,
            RTCRtpCodecCapability::default(),
            0,
            SessionId::from(session),
            "livecast",
            Weak::new(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_register_and_snapshot() {
        let map = BroadcastMap::new();
        let key = StreamKey::from("abc");

        assert!(map.tracks_for(&key).is_empty());

        map.register_track(&key, track(TrackKind::Audio, "s1"));
        map.register_track(&key, track(TrackKind::Video, "s1"));

        let tracks = map.tracks_for(&key);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind, TrackKind::Audio);
        assert_eq!(tracks[1].kind, TrackKind::Video);
    }

    #[test]
    fn test_unknown_key_is_empty_not_error() {
        let map = BroadcastMap::new();
        assert!(map.tracks_for(&StreamKey::from("missing")).is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_second_broadcaster_replaces_same_kind() {
        let map = BroadcastMap::new();
        let key = StreamKey::from("abc");

        let first = track(TrackKind::Video, "s1");
        map.register_track(&key, Arc::clone(&first));

        let second = track(TrackKind::Video, "s2");
        let replaced = map.register_track(&key, Arc::clone(&second));

        let replaced = replaced.expect("first track should be superseded");
        assert_eq!(replaced.id, first.id);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        let tracks = map.tracks_for(&key);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, second.id);
    }

    #[test]
    fn test_remove_last_track_prunes_entry() {
        let map = BroadcastMap::new();
        let key = StreamKey::from("abc");

        let audio = track(TrackKind::Audio, "s1");
        let video = track(TrackKind::Video, "s1");
        map.register_track(&key, Arc::clone(&audio));
        map.register_track(&key, Arc::clone(&video));

        map.remove_track(&key, &audio.id);
        assert_eq!(map.tracks_for(&key).len(), 1);
        assert_eq!(map.len(), 1);

        map.remove_track(&key, &video.id);
        assert!(map.tracks_for(&key).is_empty());
        assert_eq!(map.len(), 0);

        // Removing again is a no-op.
        map.remove_track(&key, &video.id);
    }

    #[test]
    fn test_remove_session_tracks() {
        let map = BroadcastMap::new();
        let key = StreamKey::from("abc");

        let audio = track(TrackKind::Audio, "s1");
        let video = track(TrackKind::Video, "s1");
        map.register_track(&key, Arc::clone(&audio));
        map.register_track(&key, Arc::clone(&video));

        assert_eq!(map.remove_session_tracks(&key, &SessionId::from("other")), 0);
        assert_eq!(map.remove_session_tracks(&key, &SessionId::from("s1")), 2);
        assert!(audio.is_cancelled());
        assert!(video.is_cancelled());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_snapshot_does_not_see_later_tracks() {
        let map = BroadcastMap::new();
        let key = StreamKey::from("abc");

        map.register_track(&key, track(TrackKind::Audio, "s1"));
        let snapshot = map.tracks_for(&key);

        map.register_track(&key, track(TrackKind::Video, "s1"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(map.tracks_for(&key).len(), 2);
    }

    #[test]
    fn test_clear_cancels_everything() {
        let map = BroadcastMap::new();
        let a = track(TrackKind::Audio, "s1");
        let b = track(TrackKind::Video, "s2");
        map.register_track(&StreamKey::from("one"), Arc::clone(&a));
        map.register_track(&StreamKey::from("two"), Arc::clone(&b));

        map.clear();
        assert!(map.is_empty());
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
