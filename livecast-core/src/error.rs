use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The client posted a session description that does not parse as SDP.
    /// No session is created.
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// A broadcaster offered for a stream key the platform does not know
    /// about (or has revoked). Viewers never hit this: an unknown key on
    /// the viewing side yields a media-less answer, not an error.
    #[error("unknown stream key: {0}")]
    UnknownStreamKey(String),

    /// SDP/ICE negotiation failed after the session was created. The
    /// session is closed and evicted; the client must submit a fresh offer.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// TLS materials were missing or unparsable. The listener falls back
    /// to unencrypted signaling; never fatal.
    #[error("transport init failed: {0}")]
    TransportInit(String),

    /// The peer channel went away mid-delivery.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
