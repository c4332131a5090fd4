//! Read-only analysis of a tracked battle
//!
//! Type matchup helpers and the static position evaluator used as the search
//! leaf heuristic and by the simpler agents.

mod evaluate;
mod matchup;

pub use evaluate::{
    Evaluate, FAST_THRESHOLD, PositionEvaluator, Weights, effective_speed, estimated_speed,
};
pub use matchup::{
    IMMUNE_LOG2, best_attack, effectiveness_log2, is_immune_to, is_weak_to_any, resists_all,
    weaknesses,
};
