use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqlReactiveDbError;

/// What happens to a row that arrives while the consumer has no outstanding demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeliveryPolicy {
    /// The engine hands the same row back after `resume`; nothing is held locally.
    #[default]
    EngineRedelivers,
    /// Hold the refused row and emit it ahead of anything the engine sends after `resume`.
    BufferPausedRow,
}

/// Per-session settings.
///
/// ```rust
/// use sql_reactive::prelude::*;
///
/// let cfg = SessionConfig::from_json(r#"{ "autocommit": false, "prefetch": 8 }"#).unwrap();
/// assert!(!cfg.autocommit);
/// assert_eq!(cfg.redelivery, RedeliveryPolicy::EngineRedelivers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial autocommit flag.
    pub autocommit: bool,
    pub redelivery: RedeliveryPolicy,
    /// Demand requested up front by `RowStream`, and the refill threshold.
    pub prefetch: u64,
    /// Query run by `Connection::health_check`.
    pub validation_query: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autocommit: true,
            redelivery: RedeliveryPolicy::default(),
            prefetch: 32,
            validation_query: "SELECT 1".to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// Returns `ConfigParse` for malformed JSON and `ConfigError` for invalid values.
    pub fn from_json(raw: &str) -> Result<Self, SqlReactiveDbError> {
        let cfg: SessionConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `ConfigError` if `prefetch` is zero or `validation_query` is blank.
    pub fn validate(&self) -> Result<(), SqlReactiveDbError> {
        if self.prefetch == 0 {
            return Err(SqlReactiveDbError::ConfigError(
                "prefetch must be greater than zero".into(),
            ));
        }
        if self.validation_query.trim().is_empty() {
            return Err(SqlReactiveDbError::ConfigError(
                "validation_query must not be empty".into(),
            ));
        }
        Ok(())
    }
}
