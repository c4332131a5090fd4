//! Domain types for battle state

mod actions;
mod conditions;
mod field;
mod log;
mod pokemon;
mod pokemon_type;
mod side;
mod stats;
mod status;

pub use actions::{BattleActionSet, MoveOption, RequestKind, SwitchOption};
pub use conditions::{
    ConditionKind, SIDE_CONDITIONS, SideConditionState, Terrain, Weather, effect_id, is_hazard,
    is_screen, side_condition_kind,
};
pub use field::FieldState;
pub use log::{LogEntry, LogKind};
pub use pokemon::{BattlePokemon, KnownMove, KnownStats};
pub use pokemon_type::{TYPE_CHART, Type};
pub use side::BattleSide;
pub use stats::StatStages;
pub use status::Status;
