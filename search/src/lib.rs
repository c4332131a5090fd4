//! Decision search for simulator-driven battles
//!
//! [`DuctSearch`] runs decoupled UCT over snapshots of the simulator's own
//! battle object, reached through the [`BattleEngine`] / [`SimBattle`]
//! capability traits. Agents wrap the search (and a rule-based fallback)
//! behind a single [`Agent`] interface used by the session coordinator.

pub mod agent;
pub mod duct;
pub mod engine;
pub mod error;

pub use agent::{Agent, DecisionContext, DuctAgent, HeuristicAgent, RandomAgent};
pub use duct::{
    ActionStats, ActionTable, DuctConfig, DuctNode, DuctSearch, FinalSelection, SearchResult,
};
pub use engine::{BattleEngine, SimBattle, terminal_value};
pub use error::SearchError;
