use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SafariError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Judge error: {0}")]
    Judge(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Startup failures. Any of these aborts the run before a thread is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Missing required config key `{key}` in {}", path.display())]
    Missing { key: String, path: PathBuf },

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Translate a TOML deserialization error, lifting serde's
    /// "missing field `x`" into [`ConfigError::Missing`].
    pub(crate) fn from_toml(err: toml::de::Error, path: PathBuf) -> Self {
        let message = err.message().to_string();
        match missing_field(&message) {
            Some(key) => Self::Missing {
                key: key.to_string(),
                path,
            },
            None => Self::Parse {
                path,
                message: err.to_string(),
            },
        }
    }
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next().filter(|key| !key.is_empty())
}
