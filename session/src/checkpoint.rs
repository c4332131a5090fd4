//! Saved battles
//!
//! A checkpoint pairs the simulator's opaque serialized battle with the tracked
//! [`BattleState`] and the raw protocol log, so a session can be resumed without
//! replaying the stream.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use duelist_battle::BattleState;
use serde::{Deserialize, Serialize};

use crate::config::{Difficulty, SessionConfig};
use crate::error::SessionError;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Unix time in seconds
    pub saved_at: u64,
    pub serialized_battle: String,
    pub battle_state: BattleState,
    pub protocol_log: Vec<String>,
    pub config: SessionConfig,
    pub ai_difficulty: Difficulty,
}

impl Checkpoint {
    pub fn new(
        serialized_battle: String,
        battle_state: BattleState,
        protocol_log: Vec<String>,
        config: SessionConfig,
    ) -> Self {
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            version: CHECKPOINT_VERSION,
            saved_at,
            serialized_battle,
            battle_state,
            protocol_log,
            ai_difficulty: config.difficulty,
            config,
        }
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let checkpoint: Checkpoint = serde_json::from_str(json)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(SessionError::Checkpoint(format!(
                "unsupported version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            )));
        }
        if checkpoint.serialized_battle.is_empty() {
            return Err(SessionError::Checkpoint("empty serialized battle".to_string()));
        }
        Ok(checkpoint)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
