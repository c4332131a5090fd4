//! Battle state for Pokemon Showdown simulator streams
//!
//! `duelist-battle` turns the loosely typed lines from `duelist-protocol` into a
//! normalized [`BattleState`], converts requests into typed action sets and
//! scores positions for search.
//!
//! ```text
//! duelist-protocol (wire format)
//!        │
//!        ▼
//! duelist-battle (state + interpreter + evaluator)
//!        │
//!        ├─> duelist-search (DUCT over engine snapshots)
//!        └─> duelist-session (turn flow against a live simulator)
//! ```
//!
//! # Example
//!
//! ```
//! use duelist_battle::{BattleState, Player, process_chunk};
//!
//! let mut state = BattleState::new();
//! process_chunk(
//!     &mut state,
//!     "|switch|p1a: Garchomp|Garchomp, L100, M|319/319\n|-damage|p1a: Garchomp|200/319",
//! );
//!
//! let chomp = state.side(Player::P1).active_pokemon(0).unwrap();
//! assert_eq!(chomp.hp_percent, 63);
//! ```

pub mod dex;
pub mod query;
pub mod tracking;
pub mod types;

pub use dex::{Dex, MoveCategory, MoveData, SpeciesData, StaticDex};
pub use query::{Evaluate, PositionEvaluator, Weights};
pub use tracking::{BattleState, Handler, Interpreter, Phase, process_chunk, process_line};
pub use types::{
    BattleActionSet, BattlePokemon, BattleSide, FieldState, LogEntry, LogKind, MoveOption,
    RequestKind, SideConditionState, StatStages, Status, SwitchOption, Terrain, Type, Weather,
};

pub use duelist_protocol::{GameType, Player, Stat};
