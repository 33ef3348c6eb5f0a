//! Rule, sync and runtime configuration.
//!
//! Every struct has a working [`Default`]; a host may override any subset of
//! fields from TOML through [`CoreConfig::from_toml_str`]:
//!
//! ```
//! use cricklog::config::CoreConfig;
//!
//! let cfg = CoreConfig::from_toml_str(
//!     "[rules]\novers_per_innings = 10\n[sync]\nmax_attempts = 5\n",
//! )
//! .expect("parse");
//! assert_eq!(cfg.rules.overs_per_innings, 10);
//! assert_eq!(cfg.rules.squad_size, 11);
//! assert_eq!(cfg.sync.max_attempts, 5);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::DismissalKind;

/// Configuration parse failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML syntax or shape error.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Dismissal kinds refused while a free hit is in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeHitRules {
    /// Refused kinds; anything else stays permitted.
    pub disallowed: BTreeSet<DismissalKind>,
}

impl Default for FreeHitRules {
    fn default() -> Self {
        Self {
            disallowed: [
                DismissalKind::Bowled,
                DismissalKind::Caught,
                DismissalKind::Lbw,
                DismissalKind::Stumped,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl FreeHitRules {
    /// True when `kind` may be recorded on a free hit.
    pub fn permits(&self, kind: DismissalKind) -> bool {
        !self.disallowed.contains(&kind)
    }
}

/// Match format and procedural rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    /// Over limit per innings.
    pub overs_per_innings: u32,
    /// Players per side; all out at `squad_size - 1` wickets.
    pub squad_size: u32,
    /// Powerplay length in overs, 0 disables the notification.
    pub powerplay_overs: u32,
    /// Free-hit dismissal table.
    pub free_hit: FreeHitRules,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            overs_per_innings: 20,
            squad_size: 11,
            powerplay_overs: 6,
            free_hit: FreeHitRules::default(),
        }
    }
}

impl MatchRules {
    /// Wickets that end an innings.
    pub fn all_out_wickets(&self) -> u32 {
        self.squad_size.saturating_sub(1)
    }
}

/// Queue replay policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Failed attempts after which a queued operation is dropped.
    pub max_attempts: u32,
    /// Replay queued inserts as upserts by row id.
    pub upsert_on_replay: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            upsert_on_replay: false,
        }
    }
}

/// Persistence facade policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// While operations are pending, queue new writes behind them instead of
    /// writing directly, so the remote never sees a later fact first.
    pub queue_behind_pending: bool,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            queue_behind_pending: true,
        }
    }
}

/// Scorer actor sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound of the command channel.
    pub command_queue_bound: usize,
    /// Capacity of the event broadcast.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 64,
            event_capacity: 256,
        }
    }
}

/// All configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Match rules.
    pub rules: MatchRules,
    /// Replay policy.
    pub sync: SyncConfig,
    /// Facade policy.
    pub facade: FacadeConfig,
    /// Actor sizing.
    pub runtime: RuntimeConfig,
}

impl CoreConfig {
    /// Parses a possibly partial TOML document over the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
