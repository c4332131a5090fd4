//! Session configuration
//!
//! Loaded from TOML and then overridden from `DUELIST_*` environment variables.
//!
//! ```toml
//! format_id = "gen9randombattle"
//! difficulty = "hard"
//! start_timeout_ms = 5000
//!
//! [p1]
//! name = "Alice"
//!
//! [p2]
//! name = "Bob"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use duelist_battle::{Dex, PositionEvaluator};
use duelist_protocol::Player;
use duelist_search::{Agent, BattleEngine, DuctAgent, DuctConfig, HeuristicAgent};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub const ENV_FORMAT: &str = "DUELIST_FORMAT";
pub const ENV_DIFFICULTY: &str = "DUELIST_DIFFICULTY";
pub const ENV_START_TIMEOUT: &str = "DUELIST_START_TIMEOUT_MS";
pub const ENV_SIMULATOR: &str = "DUELIST_SIMULATOR";

/// Search budget presets for agent-controlled sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Rule-based decisions only
    Easy,
    #[default]
    Normal,
    Hard,
    Expert,
}

impl Difficulty {
    /// DUCT budget for this level; `None` means no search
    pub fn search_config(&self) -> Option<DuctConfig> {
        let (max_iterations, max_time_ms, rollout_depth) = match self {
            Difficulty::Easy => return None,
            Difficulty::Normal => (200, 500, 3),
            Difficulty::Hard => (1000, 2000, 4),
            Difficulty::Expert => (4000, 5000, 6),
        };
        Some(DuctConfig {
            max_iterations,
            max_time: Duration::from_millis(max_time_ms),
            rollout_depth,
            ..DuctConfig::default()
        })
    }

    /// Agent for this level; without an engine every level falls back to the heuristic
    pub fn agent<E: BattleEngine + 'static>(
        &self,
        engine: Option<Arc<E>>,
        dex: Option<Arc<dyn Dex>>,
    ) -> Arc<dyn Agent> {
        match (self.search_config(), engine) {
            (Some(config), Some(engine)) => {
                let evaluator = match dex {
                    Some(dex) => PositionEvaluator::new().with_dex(dex),
                    None => PositionEvaluator::new(),
                };
                Arc::new(DuctAgent::new(engine, Arc::new(evaluator), config))
            }
            _ => Arc::new(HeuristicAgent::new()),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        })
    }
}

impl FromStr for Difficulty {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(SessionError::Config(format!("unknown difficulty '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub name: String,
    /// Packed team; `None` lets the format generate one
    pub team: Option<String>,
}

impl PlayerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub format_id: String,
    pub p1: PlayerConfig,
    pub p2: PlayerConfig,
    pub difficulty: Difficulty,
    pub start_timeout_ms: u64,
    pub update_timeout_ms: u64,
    /// Pause before an agent starts thinking
    pub think_delay_ms: u64,
    /// Simulator command line, split on whitespace
    pub simulator: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format_id: "gen9randombattle".to_string(),
            p1: PlayerConfig::new("Player 1"),
            p2: PlayerConfig::new("Player 2"),
            difficulty: Difficulty::Normal,
            start_timeout_ms: 10_000,
            update_timeout_ms: 30_000,
            think_delay_ms: 0,
            simulator: None,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Read a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SessionError> {
        if let Some(format) = lookup(ENV_FORMAT) {
            self.format_id = format;
        }
        if let Some(difficulty) = lookup(ENV_DIFFICULTY) {
            self.difficulty = difficulty.parse()?;
        }
        if let Some(timeout) = lookup(ENV_START_TIMEOUT) {
            self.start_timeout_ms = timeout.trim().parse().map_err(|_| {
                SessionError::Config(format!("{ENV_START_TIMEOUT} must be an integer, got '{timeout}'"))
            })?;
        }
        if let Some(command) = lookup(ENV_SIMULATOR) {
            self.simulator = Some(command);
        }
        Ok(())
    }

    pub fn player(&self, side: Player) -> &PlayerConfig {
        match side {
            Player::P1 => &self.p1,
            Player::P2 => &self.p2,
        }
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    pub fn think_delay(&self) -> Duration {
        Duration::from_millis(self.think_delay_ms)
    }
}
