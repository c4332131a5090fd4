//! Wire format for a Pokemon Showdown simulator stream.
//!
//! The simulator speaks a line protocol (`|command|arg|arg`), groups its output into
//! `update` / `sideupdate` / `end` blocks, and describes legal decisions in JSON
//! `|request|` payloads. This crate parses all three and encodes the commands written
//! back to the simulator.

use thiserror::Error;

pub mod client;
pub mod server;

pub use client::{Choice, SimCommand, SlotAction};
pub use server::{
    ActivePokemon, BattleRequest, BlockFramer, BlockKind, GameType, HpStatus, MoveSlot, Player,
    Pokemon, PokemonDetails, PokemonStats, ProtocolLine, ServerMessage, Side, SideInfo,
    SidePokemon, SimBlock, Stat, parse_line, parse_server_message, split_output,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Empty message")]
    EmptyMessage,
}
