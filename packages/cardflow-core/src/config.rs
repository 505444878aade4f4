/// Engine configuration.
/// Read from a JSON file; every field has a default, so a missing file or a
/// partial one is fine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::gateway::Operation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub rate_limits: RateLimitTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,
}

fn default_max_title_chars() -> usize {
    255
}

fn default_max_description_chars() -> usize {
    10_000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_title_chars: default_max_title_chars(),
            max_description_chars: default_max_description_chars(),
        }
    }
}

/// `max_requests` per fixed window of `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_window_ms() -> u64 {
    60_000
}

impl RateLimit {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window_ms: 60_000,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Built-in limit for an operation when the config file does not name it.
pub fn default_rate_limit(operation: Operation) -> RateLimit {
    match operation {
        Operation::CreateCard => RateLimit::per_minute(30),
        Operation::UpdateCard => RateLimit::per_minute(30),
        Operation::MoveCard => RateLimit::per_minute(60),
        Operation::DeleteCard => RateLimit::per_minute(20),
        Operation::CreateColumn => RateLimit::per_minute(20),
        Operation::UpdateColumn => RateLimit::per_minute(20),
        Operation::MoveColumn => RateLimit::per_minute(40),
        Operation::DeleteColumn => RateLimit::per_minute(15),
        Operation::CreateBoard => RateLimit::per_minute(10),
        Operation::UpdateBoard => RateLimit::per_minute(20),
        Operation::DeleteBoard => RateLimit::per_minute(10),
        Operation::LoadBoard | Operation::ListBoards => RateLimit::per_minute(60),
    }
}

/// Per-operation overrides, keyed by operation name (`"card:move"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLimitTable(pub BTreeMap<Operation, RateLimit>);

impl RateLimitTable {
    pub fn limit_for(&self, operation: Operation) -> RateLimit {
        self.0
            .get(&operation)
            .copied()
            .unwrap_or_else(|| default_rate_limit(operation))
    }

    pub fn set(&mut self, operation: Operation, limit: RateLimit) {
        self.0.insert(operation, limit);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load config from `path`. Returns defaults if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("[cardflow.config] No config at {}, using defaults", path.display());
            return Ok(EngineConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| {
        log::warn!("[cardflow.config] Failed to parse config {}: {}", path.display(), source);
        ConfigError::Parse {
            path: path.display().to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("cardflow.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.validation.max_title_chars, 255);
        assert_eq!(
            config.rate_limits.limit_for(Operation::MoveCard),
            RateLimit::per_minute(60)
        );
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "validation": {{ "max_title_chars": 80 }},
                "rate_limits": {{ "card:move": {{ "max_requests": 5, "window_ms": 1000 }} }}
            }}"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.validation.max_title_chars, 80);
        assert_eq!(config.validation.max_description_chars, 10_000);

        let moves = config.rate_limits.limit_for(Operation::MoveCard);
        assert_eq!(moves.max_requests, 5);
        assert_eq!(moves.window(), Duration::from_secs(1));
        assert_eq!(
            config.rate_limits.limit_for(Operation::DeleteColumn),
            RateLimit::per_minute(15)
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_operation_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "rate_limits": {{ "card:teleport": {{ "max_requests": 1 }} }} }}"#).unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
