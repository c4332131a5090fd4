//! Shared types for battle protocol fields

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// One of the two sides in a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    P1,
    P2,
}

impl Player {
    pub const BOTH: [Player; 2] = [Player::P1, Player::P2];

    pub fn parse(s: &str) -> Option<Self> {
        match s.get(..2)? {
            "p1" => Some(Player::P1),
            "p2" => Some(Player::P2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Player::P1 => "p1",
            Player::P2 => "p2",
        }
    }

    /// Array index for per-side storage
    pub fn index(&self) -> usize {
        match self {
            Player::P1 => 0,
            Player::P2 => 1,
        }
    }

    pub fn opponent(&self) -> Player {
        match self {
            Player::P1 => Player::P2,
            Player::P2 => Player::P1,
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Player {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Player::parse(s).ok_or_else(|| ParseError::InvalidFormat(format!("unknown side: {s}")))
    }
}

/// Pokemon identifier in the form "POSITION: NAME" (e.g., "p1a: Pikachu")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pokemon {
    /// Player who owns this pokemon
    pub player: Player,
    /// Position letter (a, b for active slots, or None if inactive)
    pub position: Option<char>,
    /// Pokemon's name/nickname
    pub name: String,
}

impl Pokemon {
    /// Parse a pokemon ID string like "p1a: Pikachu" or "p1: Pikachu"
    pub fn parse(s: &str) -> Option<Self> {
        let (pos_part, name) = s.split_once(": ")?;
        let player = Player::parse(pos_part)?;
        let position = pos_part.chars().nth(2).filter(char::is_ascii_lowercase);

        Some(Pokemon {
            player,
            position,
            name: name.trim().to_string(),
        })
    }

    /// Active slot index addressed by the position letter
    pub fn slot(&self) -> Option<usize> {
        match self.position? {
            'a' => Some(0),
            'b' => Some(1),
            'c' => Some(2),
            _ => None,
        }
    }
}

/// Pokemon details string (species, level, gender, shiny, tera)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PokemonDetails {
    pub species: String,
    pub level: Option<u8>,
    pub gender: Option<char>,
    pub shiny: bool,
    pub tera_type: Option<String>,
}

impl PokemonDetails {
    /// Parse a details string like "Pikachu, L50, M, shiny"
    pub fn parse(s: &str) -> Self {
        let mut details = PokemonDetails::default();
        let mut parts = s.split(", ");

        if let Some(species) = parts.next() {
            details.species = species.trim().to_string();
        }

        for part in parts {
            if let Some(level) = part.strip_prefix('L') {
                details.level = level.parse().ok();
            } else if part == "M" || part == "F" {
                details.gender = part.chars().next();
            } else if part == "shiny" {
                details.shiny = true;
            } else if let Some(tera) = part.strip_prefix("tera:") {
                details.tera_type = Some(tera.to_string());
            }
        }

        details
    }
}

/// HP and status condition (e.g., "100/100", "50/100 slp", "0 fnt")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HpStatus {
    /// Current HP, absolute or out of 100 depending on the viewer
    pub current: u32,
    /// Denominator, absent for "0 fnt"
    pub max: Option<u32>,
    /// Status condition (slp, par, brn, psn, tox, frz, fnt)
    pub status: Option<String>,
}

impl HpStatus {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace();
        let hp_part = parts.next()?;
        let status = parts.next().map(str::to_string);

        match hp_part.split_once('/') {
            Some((current, max)) => Some(HpStatus {
                current: current.parse().ok()?,
                max: Some(max.parse().ok()?),
                status,
            }),
            None => Some(HpStatus {
                current: hp_part.parse().ok()?,
                max: None,
                status,
            }),
        }
    }

    pub fn is_fainted(&self) -> bool {
        self.current == 0 || self.status.as_deref() == Some("fnt")
    }
}

/// Game type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    #[default]
    Singles,
    Doubles,
}

impl GameType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "singles" => Some(GameType::Singles),
            "doubles" => Some(GameType::Doubles),
            _ => None,
        }
    }

    /// Number of active slots per side
    pub fn active_slots(&self) -> usize {
        match self {
            GameType::Singles => 1,
            GameType::Doubles => 2,
        }
    }
}

/// Stat abbreviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Atk,
    Def,
    Spa,
    Spd,
    Spe,
    Accuracy,
    Evasion,
}

impl Stat {
    pub const ALL: [Stat; 7] = [
        Stat::Atk,
        Stat::Def,
        Stat::Spa,
        Stat::Spd,
        Stat::Spe,
        Stat::Accuracy,
        Stat::Evasion,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "atk" => Some(Stat::Atk),
            "def" => Some(Stat::Def),
            "spa" => Some(Stat::Spa),
            "spd" => Some(Stat::Spd),
            "spe" => Some(Stat::Spe),
            "accuracy" => Some(Stat::Accuracy),
            "evasion" => Some(Stat::Evasion),
            _ => None,
        }
    }
}

/// Side reference used by side conditions and `player`, e.g. "p1: Alice"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub player: Player,
    pub name: Option<String>,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        let player = Player::parse(s)?;
        let name = s
            .split_once(": ")
            .map(|(_, name)| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Some(Side { player, name })
    }
}
