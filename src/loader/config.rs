//! Loader configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading a [`LoaderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read loader config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid loader config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration options for a main resource loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Redirects followed before the load fails with `TooManyRedirects`.
    pub redirect_limit: u32,

    /// URL schemes a load may start with or redirect to.
    pub allowed_schemes: Vec<String>,

    /// Split `multipart/x-mixed-replace` bodies in the loader. When false the
    /// transport reports every part as its own response.
    pub split_multipart: bool,

    /// Bytes buffered while a content decision is pending before the load
    /// fails with `NoBufferSpace`.
    pub max_pending_bytes: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            redirect_limit: 20, // Chromium default is 20
            allowed_schemes: ["http", "https", "file", "data", "about"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            split_multipart: true,
            max_pending_bytes: 16 * 1024 * 1024,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn allows_scheme(&self, scheme: &str) -> bool {
        self.allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }
}
