//! Battle request types
//!
//! These types represent the JSON structure of |request| messages.

use super::battle::{HpStatus, Player, PokemonDetails};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

/// A battle request asking one side to make a decision
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRequest {
    /// Request ID for synchronization
    pub rqid: Option<u64>,

    /// Active pokemon and their available moves, one entry per active slot
    #[serde(default)]
    pub active: Option<Vec<ActivePokemon>>,

    /// Information about the requesting side's team
    pub side: Option<SideInfo>,

    /// Which active slots must switch
    #[serde(default)]
    pub force_switch: Option<Vec<bool>>,

    /// Whether this is team preview
    #[serde(default)]
    pub team_preview: bool,

    /// Maximum number of pokemon that may be brought in team preview
    #[serde(default)]
    pub max_chosen_team_size: Option<usize>,

    /// Whether the side is waiting on its opponent
    #[serde(default)]
    pub wait: bool,

    #[serde(default)]
    pub no_cancel: bool,
}

impl BattleRequest {
    /// Decode a request from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to decode request JSON")
    }

    /// Side this request is addressed to
    pub fn player(&self) -> Option<Player> {
        self.side.as_ref().and_then(SideInfo::player)
    }

    /// Check if this request requires a decision
    pub fn needs_decision(&self) -> bool {
        !self.wait && (self.team_preview || self.force_switch.is_some() || self.active.is_some())
    }

    /// Check if any slot is being forced to switch
    pub fn is_force_switch(&self) -> bool {
        self.force_switch
            .as_ref()
            .is_some_and(|fs| fs.iter().any(|&b| b))
    }

    /// Whether slot `slot` is flagged in `forceSwitch`
    pub fn slot_must_switch(&self, slot: usize) -> bool {
        self.force_switch
            .as_ref()
            .and_then(|fs| fs.get(slot).copied())
            .unwrap_or(false)
    }

    /// Team members that may be switched in, as 1-based team positions
    pub fn available_switches(&self) -> Vec<(usize, &SidePokemon)> {
        self.side
            .as_ref()
            .map(|s| {
                s.pokemon
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| !p.active && !p.is_fainted())
                    .map(|(i, p)| (i + 1, p))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Information about an active pokemon in battle
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePokemon {
    #[serde(default)]
    pub moves: Vec<MoveSlot>,

    #[serde(default)]
    pub trapped: bool,

    #[serde(default)]
    pub maybe_trapped: bool,

    #[serde(default)]
    pub can_mega_evo: bool,

    /// Tera type offered for this slot, if terastallization is available
    #[serde(default)]
    pub can_terastallize: Option<String>,
}

impl ActivePokemon {
    /// Moves that can currently be selected, with their 1-based slot numbers
    pub fn available_moves(&self) -> Vec<(usize, &MoveSlot)> {
        self.moves
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_usable())
            .map(|(i, m)| (i + 1, m))
            .collect()
    }

    pub fn can_switch(&self) -> bool {
        !self.trapped
    }
}

/// A move slot on an active pokemon
///
/// Locked-in moves (Outrage, Struggle) arrive without PP information.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSlot {
    #[serde(rename = "move")]
    pub name: String,

    pub id: String,

    #[serde(default)]
    pub pp: Option<u32>,

    #[serde(default, rename = "maxpp")]
    pub max_pp: Option<u32>,

    /// Target type (normal, self, allAdjacentFoes, ...)
    #[serde(default)]
    pub target: Option<String>,

    /// The simulator sends either `true` or the name of the disabling effect
    #[serde(default, deserialize_with = "flag_or_reason")]
    pub disabled: bool,
}

impl MoveSlot {
    pub fn is_usable(&self) -> bool {
        !self.disabled && self.pp.is_none_or(|pp| pp > 0)
    }
}

fn flag_or_reason<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Null => false,
        _ => true,
    })
}

/// Information about the requesting side
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideInfo {
    pub name: String,

    /// Player ID (p1, p2)
    pub id: String,

    #[serde(default)]
    pub pokemon: Vec<SidePokemon>,
}

impl SideInfo {
    pub fn player(&self) -> Option<Player> {
        Player::parse(&self.id)
    }
}

/// A pokemon on the requesting side, with exact information
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidePokemon {
    /// Pokemon identifier (e.g., "p1: Pikachu")
    pub ident: String,

    pub details: String,

    /// Current condition ("HP/MAXHP STATUS")
    pub condition: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub stats: PokemonStats,

    /// Move ids in slot order
    #[serde(default)]
    pub moves: Vec<String>,

    #[serde(default)]
    pub base_ability: String,

    #[serde(default)]
    pub ability: String,

    #[serde(default)]
    pub item: String,

    #[serde(default)]
    pub tera_type: Option<String>,

    /// Type the pokemon has terastallized into, if it already did
    #[serde(default)]
    pub terastallized: Option<String>,
}

impl SidePokemon {
    pub fn is_fainted(&self) -> bool {
        self.hp_status().is_some_and(|hp| hp.is_fainted())
    }

    pub fn hp_status(&self) -> Option<HpStatus> {
        HpStatus::parse(&self.condition)
    }

    /// Display name from the ident ("p1: Nick" -> "Nick")
    pub fn name(&self) -> &str {
        self.ident
            .split_once(": ")
            .map(|(_, name)| name)
            .unwrap_or(&self.ident)
    }

    pub fn parsed_details(&self) -> PokemonDetails {
        PokemonDetails::parse(&self.details)
    }
}

/// Pokemon stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PokemonStats {
    pub atk: u32,
    pub def: u32,
    pub spa: u32,
    pub spd: u32,
    pub spe: u32,
}
