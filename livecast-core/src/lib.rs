//! Shared foundation for the livecast relay service: configuration,
//! structured logging, the error taxonomy, TLS context loading, and the
//! stream-key validation boundary to the surrounding platform.

pub mod config;
pub mod error;
pub mod logging;
pub mod tls;
pub mod validator;

pub use config::Config;
pub use error::{Error, Result};
pub use validator::{AllowAllValidator, StaticKeyValidator, StreamKeyValidator};
