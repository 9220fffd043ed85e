use ::config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: TlsConfig,
    pub webrtc: WebRtcConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory the broadcast/viewer pages are served from.
    pub web_root: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5443,
            web_root: "./web".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM certificate chain path. Empty disables TLS.
    pub cert_path: String,
    /// PEM private key path. Empty disables TLS.
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// ICE server urls handed to peer connections (and to clients via
    /// the ice-servers endpoint).
    pub ice_servers: Vec<String>,
    /// Upper bound on waiting for ICE candidate gathering before the
    /// answer is returned.
    pub ice_gathering_timeout_secs: u64,
    /// Interval between keyframe (PLI) requests towards broadcasters.
    pub keyframe_interval_secs: u64,
    /// Bound on closing out live sessions during shutdown.
    pub shutdown_wait_secs: u64,
    /// Stream keys accepted from broadcasters. Empty accepts any key,
    /// which matches deployments where the platform store is not wired in.
    pub allowed_stream_keys: Vec<String>,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            ice_gathering_timeout_secs: 10,
            keyframe_interval_secs: 3,
            shutdown_wait_secs: 5,
            allowed_stream_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Outbound event buffer per connected channel client. Full buffers
    /// drop events (at-most-once delivery).
    pub send_buffer: usize,
    /// Maximum accepted channel message size in bytes.
    pub max_message_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            send_buffer: 64,
            max_message_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (LIVECAST_SERVER_HOST, etc.)
        builder = builder.add_source(
            Environment::with_prefix("LIVECAST")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Validate the configuration, collecting every problem rather than
    /// stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be non-zero".to_string());
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            errors.push(format!("logging.level '{}' is not valid", self.logging.level));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format '{}' must be 'json' or 'pretty'",
                self.logging.format
            ));
        }
        if self.webrtc.ice_gathering_timeout_secs == 0 {
            errors.push("webrtc.ice_gathering_timeout_secs must be non-zero".to_string());
        }
        if self.channel.send_buffer == 0 {
            errors.push("channel.send_buffer must be non-zero".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Get the signaling bind address
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Load configuration from the config file or environment variables.
///
/// Config file search order:
/// 1. `LIVECAST_CONFIG_PATH` environment variable (explicit path)
/// 2. `./config.yaml` (current working directory)
/// 3. `/config/config.yaml` (Kubernetes mount path)
/// 4. Fall back to environment variables only
pub fn load_config() -> anyhow::Result<Config> {
    let config_path = std::env::var("LIVECAST_CONFIG_PATH")
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.yaml";
            Path::new(cwd).exists().then(|| cwd.to_string())
        })
        .or_else(|| {
            let k8s = "/config/config.yaml";
            Path::new(k8s).exists().then(|| k8s.to_string())
        });

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                eprintln!("Falling back to environment variables");
                Config::from_env().unwrap_or_default()
            }
        }
    } else {
        Config::from_env().unwrap_or_default()
    };

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5443);
        assert!(config.tls.cert_path.is_empty());
        assert!(!config.webrtc.ice_servers.is_empty());
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5443,
                web_root: "./web".to_string(),
            },
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:5443");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.logging.level = "shouting".to_string();
        config.logging.format = "xml".to_string();

        let errors = config.validate().expect_err("config should be invalid");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_rejects_zero_gathering_timeout() {
        let mut config = Config::default();
        config.webrtc.ice_gathering_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
