//! Generic `|command|arg|arg` line parsing
//!
//! Battle events are kept loosely typed at this layer: the interpreter dispatches
//! on `command` and pulls typed fields out of `args` with the accessors below.

use super::battle::{HpStatus, Pokemon, PokemonDetails, Side};
use crate::ParseError;
use anyhow::Result;

/// A single protocol line split into its command and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolLine {
    /// Command name without the leading pipe (`"switch"`, `"-damage"`, ...)
    pub command: String,
    /// Remaining pipe-delimited fields, including `[tag]` suffixes
    pub args: Vec<String>,
}

impl ProtocolLine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Raw argument at `index`
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Raw argument at `index`, or `""` when absent
    pub fn arg_or_empty(&self, index: usize) -> &str {
        self.arg(index).unwrap_or("")
    }

    /// Parse the argument at `index` as a pokemon identifier
    pub fn pokemon(&self, index: usize) -> Option<Pokemon> {
        self.arg(index).and_then(Pokemon::parse)
    }

    /// Parse the argument at `index` as a side identifier
    pub fn side(&self, index: usize) -> Option<Side> {
        self.arg(index).and_then(Side::parse)
    }

    /// Parse the argument at `index` as a details string
    pub fn details(&self, index: usize) -> PokemonDetails {
        self.arg(index).map(PokemonDetails::parse).unwrap_or_default()
    }

    /// Parse the argument at `index` as an HP/status pair
    pub fn hp_status(&self, index: usize) -> Option<HpStatus> {
        self.arg(index).and_then(HpStatus::parse)
    }

    /// Value of a `[name] value` tag, e.g. `tag("from")` on `[from] item: Leftovers`
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| {
            let rest = arg.strip_prefix('[')?;
            let (tag, value) = rest.split_once(']')?;
            (tag == name).then(|| value.trim())
        })
    }

    /// Whether a bare `[name]` flag is present, e.g. `[upkeep]`
    pub fn has_flag(&self, name: &str) -> bool {
        self.args.iter().any(|arg| {
            arg.strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .is_some_and(|flag| flag == name)
        })
    }
}

/// Parse a `|command|arg|...` line
pub fn parse_line(line: &str) -> Result<ProtocolLine> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.is_empty() {
        return Err(ParseError::EmptyMessage.into());
    }

    let Some(body) = line.strip_prefix('|') else {
        return Err(ParseError::InvalidFormat(format!("not a protocol line: {line}")).into());
    };

    let mut parts = body.split('|');
    let command = parts.next().unwrap_or_default().to_string();
    let args = parts.map(str::to_string).collect();

    Ok(ProtocolLine { command, args })
}
