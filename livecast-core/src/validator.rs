//! Stream-key validation boundary.
//!
//! The surrounding platform owns stream-key issuance and revocation; this
//! service only consumes a validity check before wiring a broadcaster's
//! tracks. Deployments without the platform store run [`AllowAllValidator`].

use async_trait::async_trait;
use std::collections::HashSet;

/// Capability supplied by the external platform's persistent store:
/// decides whether a stream key may broadcast.
#[async_trait]
pub trait StreamKeyValidator: Send + Sync {
    async fn is_valid(&self, stream_key: &str) -> bool;
}

/// Accepts every non-empty stream key.
#[derive(Debug, Default)]
pub struct AllowAllValidator;

#[async_trait]
impl StreamKeyValidator for AllowAllValidator {
    async fn is_valid(&self, stream_key: &str) -> bool {
        !stream_key.is_empty()
    }
}

/// Accepts only the keys present in a fixed allowlist.
#[derive(Debug)]
pub struct StaticKeyValidator {
    keys: HashSet<String>,
}

impl StaticKeyValidator {
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

#[async_trait]
impl StreamKeyValidator for StaticKeyValidator {
    async fn is_valid(&self, stream_key: &str) -> bool {
        self.keys.contains(stream_key)
    }
}
