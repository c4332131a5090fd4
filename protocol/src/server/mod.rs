mod battle;
mod frame;
mod line;
mod request;

pub use battle::{GameType, HpStatus, Player, Pokemon, PokemonDetails, Side, Stat};
pub use frame::{BlockFramer, BlockKind, SimBlock, split_output};
pub use line::{ProtocolLine, parse_line};
pub use request::{ActivePokemon, BattleRequest, MoveSlot, PokemonStats, SideInfo, SidePokemon};

use crate::ParseError;
use anyhow::Result;

/// One classified line of simulator output
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// A battle event such as `|switch|...` or `|turn|3`
    Event(ProtocolLine),
    /// A decoded `|request|` payload
    Request(BattleRequest),
    /// `|error|MESSAGE`
    Error(String),
    /// Anything that is not a protocol line (headers, side ids, JSON logs)
    Raw(String),
}

/// Classify a single output line
///
/// Requests are decoded eagerly so that a malformed payload surfaces as an error
/// here instead of leaking loosely-typed JSON further in.
pub fn parse_server_message(line: &str) -> Result<ServerMessage> {
    let line = line.trim_end_matches(['\r', '\n']);

    if !line.starts_with('|') {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    // |request|JSON may legitimately contain '|' inside strings
    if let Some(json) = line.strip_prefix("|request|") {
        if json.trim().is_empty() {
            return Err(ParseError::MissingField("request body".to_string()).into());
        }
        return Ok(ServerMessage::Request(BattleRequest::from_json(json)?));
    }

    if let Some(message) = line.strip_prefix("|error|") {
        return Ok(ServerMessage::Error(message.to_string()));
    }

    Ok(ServerMessage::Event(parse_line(line)?))
}
