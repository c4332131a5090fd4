//! Capability traits for the simulator battle object
//!
//! The search never looks inside the engine's battle representation. It only
//! needs to snapshot and restore it, list each side's legal choice strings,
//! advance it by one joint action and read the outcome.

use anyhow::Result;
use duelist_battle::BattleState;
use duelist_protocol::Player;

/// A live battle inside the simulator engine
pub trait SimBattle {
    /// Full choice strings `side` may submit now (`"move 1"`, `"switch 3"`,
    /// `"move 1 2, move 2 1"` in doubles). Empty when the side owes nothing.
    fn legal_choices(&self, side: Player) -> Vec<String>;

    /// Advance by one joint action. An empty string means that side makes no choice.
    fn apply(&mut self, p1: &str, p2: &str) -> Result<()>;

    fn is_over(&self) -> bool;

    /// Winner once over; `None` for a tie or an unfinished battle
    fn winner(&self) -> Option<Player>;

    /// Project the battle into tracked state for evaluation
    fn observe(&self) -> BattleState;
}

/// Snapshot and restore of engine battles
pub trait BattleEngine: Send + Sync {
    type Battle: SimBattle;

    /// Serialize a battle to an opaque snapshot
    fn serialize(&self, battle: &Self::Battle) -> Result<String>;

    /// Restore an independent copy from a snapshot
    fn deserialize(&self, snapshot: &str) -> Result<Self::Battle>;
}

/// Terminal value of a finished battle from `perspective`
pub fn terminal_value(winner: Option<Player>, perspective: Player) -> f64 {
    match winner {
        Some(w) if w == perspective => 1.0,
        Some(_) => -1.0,
        None => 0.0,
    }
}
