//! Battle state tracking from the protocol stream

mod battle;
mod handlers;
mod interpreter;
mod request;

pub use battle::{BattleState, Phase};
pub use interpreter::{Handler, Interpreter, process_chunk, process_line};
