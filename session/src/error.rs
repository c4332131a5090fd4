use std::time::Duration;

use duelist_protocol::Player;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to open simulator")]
    Simulator(#[source] anyhow::Error),

    #[error("Simulator rejected the battle: {0}")]
    StartRejected(String),

    #[error("Battle did not start within {0:?}")]
    StartTimeout(Duration),

    #[error("No battle update within {0:?}")]
    Stalled(Duration),

    #[error("Simulator stream closed")]
    Closed,

    #[error("A submission for {0} is already in progress")]
    SubmissionInProgress(Player),

    #[error("No pending decision for {0}")]
    NoPendingDecision(Player),

    #[error("Invalid slot {slot} for {side}")]
    InvalidSlot { side: Player, slot: usize },

    #[error("Checkpoint unavailable: {0}")]
    CheckpointUnavailable(&'static str),

    #[error("Simulator does not support snapshots")]
    SnapshotUnsupported,

    #[error("Snapshot operation failed")]
    Snapshot(#[source] anyhow::Error),

    #[error("Invalid checkpoint: {0}")]
    Checkpoint(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
