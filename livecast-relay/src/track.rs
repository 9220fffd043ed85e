//! Track relay
//!
//! One inbound track is wrapped into a single local RTP track that every
//! attached viewer session binds to, so a broadcaster's packets are
//! forwarded to N independent consumers without re-encoding. The relay
//! task pumps RTP from the remote track until it ends or the owning
//! session is cancelled, then deregisters itself from the broadcast map.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::marshal::MarshalSize;

use crate::broadcast::BroadcastMap;
use crate::types::{SessionId, StreamKey, TrackId};

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl From<webrtc::rtp_transceiver::rtp_codec::RTPCodecType> for TrackKind {
    fn from(codec_type: webrtc::rtp_transceiver::rtp_codec::RTPCodecType) -> Self {
        match codec_type {
            webrtc::rtp_transceiver::rtp_codec::RTPCodecType::Audio => Self::Audio,
            _ => Self::Video,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// A relayed media track: the fan-out unit of the broadcast map.
pub struct RelayTrack {
    pub id: TrackId,
    pub kind: TrackKind,
    /// Session that contributed the upstream track.
    pub session_id: SessionId,
    /// Local pass-through track viewers bind to.
    local: Arc<TrackLocalStaticRTP>,
    /// Upstream SSRC, used for keyframe requests.
    ssrc: u32,
    /// Source peer connection; weak so a closed broadcaster does not
    /// linger just because its tracks are still registered.
    source_pc: Weak<RTCPeerConnection>,
    cancel: CancellationToken,
    packets_relayed: AtomicU64,
    bytes_relayed: AtomicU64,
}

impl RelayTrack {
    pub fn new(
        kind: TrackKind,
        codec: RTCRtpCodecCapability,
        ssrc: u32,
        session_id: SessionId,
        stream_label: &str,
        source_pc: Weak<RTCPeerConnection>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let id = TrackId::generate();
        let local = Arc::new(TrackLocalStaticRTP::new(
            codec,
            format!("{kind}-{id}"),
            stream_label.to_string(),
        ));
        Arc::new(Self {
            id,
            kind,
            session_id,
            local,
            ssrc,
            source_pc,
            cancel,
            packets_relayed: AtomicU64::new(0),
            bytes_relayed: AtomicU64::new(0),
        })
    }

    /// The multi-consumer local track to attach to viewer sessions.
    #[must_use]
    pub fn local(&self) -> Arc<TrackLocalStaticRTP> {
        Arc::clone(&self.local)
    }

    /// Stop relaying. The pump task observes the cancellation and
    /// deregisters the track.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ask the source to produce a keyframe (PLI). Returns false when the
    /// source peer connection is gone.
    pub async fn request_keyframe(&self) -> bool {
        if self.kind != TrackKind::Video {
            return true;
        }
        let Some(pc) = self.source_pc.upgrade() else {
            return false;
        };
        let pli = PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc: self.ssrc,
        };
        if let Err(e) = pc.write_rtcp(&[Box::new(pli)]).await {
            debug!(track_id = %self.id, error = %e, "PLI send failed");
        }
        true
    }

    /// Start forwarding RTP from the remote track into the local one.
    /// When the upstream ends (read error) or the session is cancelled,
    /// the track deregisters itself and the empty entry is pruned.
    pub fn spawn_pump(
        self: &Arc<Self>,
        remote: Arc<TrackRemote>,
        broadcasts: Arc<BroadcastMap>,
        stream_key: StreamKey,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = this.cancel.cancelled() => {
                        debug!(track_id = %this.id, "relay cancelled");
                        break;
                    }
                    result = remote.read_rtp() => {
                        let packet = match result {
                            Ok((packet, _attributes)) => packet,
                            Err(e) => {
                                debug!(track_id = %this.id, error = %e, "upstream track ended");
                                break;
                            }
                        };
                        let size = packet.header.marshal_size() + packet.payload.len();
                        match this.local.write_rtp(&packet).await {
                            Ok(_) => {
                                this.packets_relayed.fetch_add(1, Ordering::Relaxed);
                                this.bytes_relayed.fetch_add(size as u64, Ordering::Relaxed);
                            }
                            // No consumer bound yet; keep the pump alive.
                            Err(webrtc::Error::ErrClosedPipe) => {}
                            Err(e) => {
                                warn!(track_id = %this.id, error = %e, "relay write failed");
                                break;
                            }
                        }
                    }
                }
            }
            broadcasts.remove_track(&stream_key, &this.id);
        });
    }

    /// Periodically request keyframes so viewers that attach mid-stream
    /// render promptly. Stops with the track.
    pub fn spawn_keyframe_ticker(self: &Arc<Self>, interval: Duration) {
        if self.kind != TrackKind::Video {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = this.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if !this.request_keyframe().await {
                            break;
                        }
                    }
                }
            }
        });
    }

    #[must_use]
    pub fn stats(&self) -> TrackStats {
        TrackStats {
            track_id: self.id.clone(),
            kind: self.kind,
            packets_relayed: self.packets_relayed.load(Ordering::Relaxed),
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
        }
    }
}

/// Relay counters for a single track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackStats {
    pub track_id: TrackId,
    pub kind: TrackKind,
    pub packets_relayed: u64,
    pub bytes_relayed: u64,
}
