//! Field and side conditions
//!
//! Side conditions are keyed by a normalized effect id ("move: Stealth Rock" becomes
//! "stealthrock") and described by [`SIDE_CONDITIONS`]; supporting a new hazard or
//! screen is a single table entry.

/// Normalize a protocol effect name into an id
///
/// Strips `move: ` / `ability: ` / `item: ` prefixes, lowercases, and drops everything
/// that is not alphanumeric.
pub fn effect_id(s: &str) -> String {
    let s = s.trim();
    let clean = ["move: ", "ability: ", "item: "]
        .iter()
        .find_map(|prefix| s.strip_prefix(prefix))
        .unwrap_or(s);

    clean
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// How a side condition accumulates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Stackable up to the given number of layers (hazards)
    Layers(u8),
    /// Lasts the given number of turns (screens, tailwind)
    Turns(u8),
}

/// Known side conditions
pub static SIDE_CONDITIONS: &[(&str, ConditionKind)] = &[
    ("spikes", ConditionKind::Layers(3)),
    ("toxicspikes", ConditionKind::Layers(2)),
    ("stealthrock", ConditionKind::Layers(1)),
    ("stickyweb", ConditionKind::Layers(1)),
    ("gmaxsteelsurge", ConditionKind::Layers(1)),
    ("reflect", ConditionKind::Turns(5)),
    ("lightscreen", ConditionKind::Turns(5)),
    ("auroraveil", ConditionKind::Turns(5)),
    ("tailwind", ConditionKind::Turns(4)),
    ("safeguard", ConditionKind::Turns(5)),
    ("mist", ConditionKind::Turns(5)),
    ("luckychant", ConditionKind::Turns(5)),
];

/// Look up how a side condition behaves; unknown ids behave as a single layer
pub fn side_condition_kind(id: &str) -> ConditionKind {
    SIDE_CONDITIONS
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, kind)| *kind)
        .unwrap_or(ConditionKind::Layers(1))
}

pub fn is_hazard(id: &str) -> bool {
    matches!(id, "spikes" | "toxicspikes" | "stealthrock" | "stickyweb" | "gmaxsteelsurge")
}

pub fn is_screen(id: &str) -> bool {
    matches!(id, "reflect" | "lightscreen" | "auroraveil")
}

/// State for one active side condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideConditionState {
    pub layers: u8,
    /// Estimated turns remaining, for timed conditions
    pub turns_left: Option<u8>,
}

impl SideConditionState {
    pub fn new(kind: ConditionKind) -> Self {
        match kind {
            ConditionKind::Layers(_) => Self {
                layers: 1,
                turns_left: None,
            },
            ConditionKind::Turns(turns) => Self {
                layers: 1,
                turns_left: Some(turns),
            },
        }
    }

    /// Re-apply the condition; returns true if anything changed
    pub fn reapply(&mut self, kind: ConditionKind) -> bool {
        match kind {
            ConditionKind::Layers(max) if self.layers < max => {
                self.layers += 1;
                true
            }
            ConditionKind::Layers(_) => false,
            ConditionKind::Turns(turns) => {
                let changed = self.turns_left != Some(turns);
                self.turns_left = Some(turns);
                changed
            }
        }
    }

    /// Count down one turn; the condition itself only ends on `-sideend`
    pub fn tick(&mut self) {
        if let Some(turns) = self.turns_left.as_mut()
            && *turns > 1
        {
            *turns -= 1;
        }
    }
}

/// Weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Weather {
    Sun,
    Rain,
    Sand,
    Hail,
    Snow,
    HarshSun,
    HeavyRain,
    StrongWinds,
}

impl Weather {
    pub fn from_protocol(s: &str) -> Option<Self> {
        match effect_id(s).as_str() {
            "sunnyday" | "sun" => Some(Weather::Sun),
            "raindance" | "rain" => Some(Weather::Rain),
            "sandstorm" | "sand" => Some(Weather::Sand),
            "hail" => Some(Weather::Hail),
            "snow" | "snowscape" => Some(Weather::Snow),
            "desolateland" | "harshsun" => Some(Weather::HarshSun),
            "primordialsea" | "heavyrain" => Some(Weather::HeavyRain),
            "deltastream" | "strongwinds" => Some(Weather::StrongWinds),
            _ => None,
        }
    }

    /// Primal weathers last until their source leaves the field
    pub fn is_primal(&self) -> bool {
        matches!(
            self,
            Weather::HarshSun | Weather::HeavyRain | Weather::StrongWinds
        )
    }
}

/// Terrain conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terrain {
    Electric,
    Grassy,
    Misty,
    Psychic,
}

impl Terrain {
    pub fn from_protocol(s: &str) -> Option<Self> {
        match effect_id(s).as_str() {
            "electricterrain" => Some(Terrain::Electric),
            "grassyterrain" => Some(Terrain::Grassy),
            "mistyterrain" => Some(Terrain::Misty),
            "psychicterrain" => Some(Terrain::Psychic),
            _ => None,
        }
    }
}
