//! TLS context loading for the signaling listener.
//!
//! Secure transport is best-effort: when the configured certificate or key
//! is missing or unparsable the service starts unencrypted, which is
//! acceptable for local development and a documented weakening elsewhere.

use axum_server::tls_rustls::RustlsConfig;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Load a rustls server context from PEM certificate/key paths.
///
/// Fails with [`Error::TransportInit`] when either path is unset, either
/// file is missing, or the materials do not parse.
pub async fn load(cert_path: &str, key_path: &str) -> Result<RustlsConfig> {
    if cert_path.is_empty() || key_path.is_empty() {
        return Err(Error::TransportInit(
            "certificate or key path not configured".to_string(),
        ));
    }
    if !Path::new(cert_path).exists() {
        return Err(Error::TransportInit(format!(
            "certificate file not found: {cert_path}"
        )));
    }
    if !Path::new(key_path).exists() {
        return Err(Error::TransportInit(format!(
            "key file not found: {key_path}"
        )));
    }

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| Error::TransportInit(format!("failed to parse TLS materials: {e}")))
}

/// Load the TLS context, falling back to `None` (plain HTTP) when the
/// materials are unavailable. The fallback is logged, never fatal.
pub async fn load_optional(cert_path: &str, key_path: &str) -> Option<RustlsConfig> {
    match load(cert_path, key_path).await {
        Ok(config) => {
            info!(cert = cert_path, "TLS context loaded, signaling over HTTPS");
            Some(config)
        }
        Err(e) => {
            warn!(error = %e, "TLS unavailable, falling back to unencrypted signaling");
            None
        }
    }
}
