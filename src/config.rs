//! Configuration management for the file stream layer
//!
//! The two roots normally come from the host runtime at startup, while the
//! cipher material and pool limits are read from an optional `fsni.toml`
//! with `FSNI_*` environment overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::stream::pool::MAX_SLOTS;

/// Length in bytes of the cipher key and the initial IV.
pub const SECRET_LEN: usize = 16;

/// Key used when no `secret_key` is configured.
pub const DEFAULT_KEY: [u8; SECRET_LEN] = [
    0xeb, 0x1b, 0x95, 0xf9, 0xb1, 0x33, 0x2a, 0x20, 0x66, 0x26, 0x66, 0x36, 0x57, 0x1b, 0x50, 0xbb,
];

/// IV used when no `secret_iv` is configured.
pub const DEFAULT_IV: [u8; SECRET_LEN] = [
    0x24, 0xf2, 0xd5, 0x3a, 0x31, 0xdf, 0xae, 0x8d, 0xfb, 0xad, 0x43, 0x8a, 0x43, 0x5e, 0xa0, 0xd0,
];

const DEFAULT_MAX_STREAMS: usize = 1024;
const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB chunks for secured writes

/// Complete mount configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MountConfig {
    /// Read-only bundled content: a directory, or
    /// `jar:file://<archive>!/<filter>` for a mounted archive
    #[serde(default)]
    pub streaming_path: String,

    /// Writable root, consulted first for reads and used for every write
    #[serde(default)]
    pub persist_path: String,

    /// Hex encoded cipher key for secured streams
    /// Environment: FSNI_SECRET_KEY
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Hex encoded initial IV for secured streams
    /// Environment: FSNI_SECRET_IV
    #[serde(default)]
    pub secret_iv: Option<String>,

    /// Upper bound on simultaneously open streams (and secured streams)
    /// Environment: FSNI_MAX_STREAMS
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,

    /// Scratch buffer size used when encrypting writes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_max_streams() -> usize {
    DEFAULT_MAX_STREAMS
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            streaming_path: String::new(),
            persist_path: String::new(),
            secret_key: None,
            secret_iv: None,
            max_streams: DEFAULT_MAX_STREAMS,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl MountConfig {
    /// Load configuration from `fsni.*` in the working directory with
    /// environment overrides. A missing file is not an error.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("fsni")
    }

    /// Load configuration from the given base name (extension optional)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("FSNI"))
            .build()?;

        let config: MountConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Replace both roots, keeping cipher and pool settings
    pub fn with_roots(mut self, streaming_path: &str, persist_path: &str) -> Self {
        self.streaming_path = streaming_path.to_string();
        self.persist_path = persist_path.to_string();
        self
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.max_streams == 0 {
            return Err(config::ConfigError::Message(
                "max_streams must be greater than 0".into(),
            ));
        }

        if self.max_streams > MAX_SLOTS {
            return Err(config::ConfigError::Message(format!(
                "max_streams cannot exceed {MAX_SLOTS}"
            )));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        for (field, value) in [("secret_key", &self.secret_key), ("secret_iv", &self.secret_iv)] {
            if let Some(value) = value {
                hex::decode(value).map_err(|e| {
                    config::ConfigError::Message(format!("{field} is not valid hex: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Get persistent root as PathBuf
    pub fn persist_root(&self) -> PathBuf {
        PathBuf::from(&self.persist_path)
    }

    /// Cipher key, normalised to [`SECRET_LEN`] bytes
    pub fn key(&self) -> [u8; SECRET_LEN] {
        decode_secret(self.secret_key.as_deref()).unwrap_or(DEFAULT_KEY)
    }

    /// Initial IV, normalised to [`SECRET_LEN`] bytes
    pub fn iv(&self) -> [u8; SECRET_LEN] {
        decode_secret(self.secret_iv.as_deref()).unwrap_or(DEFAULT_IV)
    }
}

fn decode_secret(value: Option<&str>) -> Option<[u8; SECRET_LEN]> {
    let bytes = hex::decode(value?).ok()?;
    Some(normalize_secret(&bytes))
}

/// Truncate or zero-pad raw key material to [`SECRET_LEN`] bytes.
pub fn normalize_secret(raw: &[u8]) -> [u8; SECRET_LEN] {
    let mut secret = [0u8; SECRET_LEN];
    let n = raw.len().min(SECRET_LEN);
    secret[..n].copy_from_slice(&raw[..n]);
    secret
}
