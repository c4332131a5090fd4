//! Drives battles against an external simulator
//!
//! [`BattleSession`] is the turn-flow coordinator: it opens a [`Simulator`]
//! stream, keeps a [`BattleState`](duelist_battle::BattleState) current from the
//! simulator's output, and routes each side's requests either to an agent or
//! to the caller. Sessions can be checkpointed mid-battle and resumed later
//! when the simulator supports snapshots.
//!
//! ```no_run
//! use duelist_search::HeuristicAgent;
//! use duelist_session::{BattleSession, Controller, ProcessSimulator, SessionConfig};
//! use duelist_protocol::Player;
//!
//! # async fn run() -> Result<(), duelist_session::SessionError> {
//! let session = BattleSession::builder(SessionConfig::default())
//!     .controller(Player::P1, Controller::agent(HeuristicAgent::new()))
//!     .controller(Player::P2, Controller::agent(HeuristicAgent::new()))
//!     .start(&ProcessSimulator::default())
//!     .await?;
//! let summary = session.run_to_end().await?;
//! println!("winner: {:?} after {} turns", summary.winner, summary.turns);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod simulator;

pub use batch::{BatchOutcome, BatchStats, run_batch};
pub use checkpoint::{CHECKPOINT_VERSION, Checkpoint};
pub use config::{Difficulty, PlayerConfig, SessionConfig};
pub use coordinator::{
    BattleSession, BattleSummary, Controller, SessionBuilder, SlotProgress, UpdateStatus,
};
pub use dedup::BlockDeduper;
pub use error::SessionError;
pub use simulator::{ProcessSimulator, Simulator, SimulatorLink, SnapshotControl};
