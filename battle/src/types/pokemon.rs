//! Per-pokemon battle state

use std::collections::BTreeSet;

use duelist_protocol::{HpStatus, PokemonDetails};

use super::conditions::effect_id;
use super::pokemon_type::Type;
use super::stats::StatStages;
use super::status::Status;

/// A move revealed in battle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnownMove {
    pub id: String,
    pub name: String,
    /// Only known once a request for the owning side supplied it
    pub pp: Option<u32>,
    pub max_pp: Option<u32>,
}

impl KnownMove {
    pub fn new(name: &str) -> Self {
        Self {
            id: effect_id(name),
            name: name.to_string(),
            pp: None,
            max_pp: None,
        }
    }
}

/// Exact stats, available for the requesting side only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnownStats {
    pub atk: u32,
    pub def: u32,
    pub spa: u32,
    pub spd: u32,
    pub spe: u32,
}

/// One pokemon as seen through the protocol
///
/// `max_hp` is 0 until the first HP report.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattlePokemon {
    /// Species including forme (e.g. "Rotom-Wash")
    pub species: String,
    /// Display name from the protocol identifier
    pub nickname: String,
    pub level: u8,
    pub gender: Option<char>,

    pub hp: u32,
    pub max_hp: u32,
    /// Always `round(hp / max_hp * 100)`
    pub hp_percent: u32,
    pub status: Option<Status>,
    pub fainted: bool,
    pub active: bool,

    /// Moves in reveal order (request order for the requesting side)
    pub moves: Vec<KnownMove>,
    pub boosts: StatStages,
    /// Volatile effect ids (confusion, substitute, ...)
    pub volatiles: BTreeSet<String>,

    pub item: Option<String>,
    pub ability: Option<String>,

    /// Current types, possibly changed by `typechange` or tera
    pub types: Vec<Type>,
    /// Types of the species, restored on switch-out
    pub species_types: Vec<Type>,
    pub tera_type: Option<Type>,
    pub terastallized: bool,

    pub stats: Option<KnownStats>,
    pub base_speed: Option<u32>,
}

impl BattlePokemon {
    pub fn new(species: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            nickname: nickname.into(),
            level: 100,
            gender: None,
            hp: 0,
            max_hp: 0,
            hp_percent: 0,
            status: None,
            fainted: false,
            active: false,
            moves: Vec::new(),
            boosts: StatStages::new(),
            volatiles: BTreeSet::new(),
            item: None,
            ability: None,
            types: Vec::new(),
            species_types: Vec::new(),
            tera_type: None,
            terastallized: false,
            stats: None,
            base_speed: None,
        }
    }

    /// Create from a details string and the identifier's display name
    pub fn from_details(details: &PokemonDetails, nickname: &str) -> Self {
        let mut poke = Self::new(&details.species, nickname);
        poke.apply_details(details);
        poke
    }

    /// Update identity fields from a (possibly changed) details string
    pub fn apply_details(&mut self, details: &PokemonDetails) {
        if !details.species.is_empty() {
            self.species = details.species.clone();
        }
        self.level = details.level.unwrap_or(100);
        self.gender = details.gender;
        if let Some(tera) = details.tera_type.as_deref() {
            self.tera_type = Type::from_protocol(tera);
        }
    }

    pub fn name(&self) -> &str {
        &self.nickname
    }

    /// Set HP from a `current/max` pair
    ///
    /// A denominator below the known maximum is a percentage view of the same
    /// pokemon and is rescaled; anything else raises the maximum. `max_hp` never
    /// decreases.
    pub fn set_hp(&mut self, current: u32, max: Option<u32>) {
        match max {
            Some(max) if max > 0 && max < self.max_hp => {
                let scaled = current as f64 / max as f64 * self.max_hp as f64;
                self.hp = scaled.round() as u32;
            }
            Some(max) if max > 0 => {
                self.max_hp = max;
                self.hp = current;
            }
            _ => self.hp = current,
        }
        self.hp = self.hp.min(self.max_hp);
        self.refresh_vitals();
    }

    /// Apply an HP/status field such as "200/319 par" or "0 fnt"
    pub fn apply_hp_status(&mut self, hp: &HpStatus) {
        if hp.is_fainted() {
            self.set_hp(0, hp.max);
            self.status = None;
            return;
        }
        self.set_hp(hp.current, hp.max);
        self.status = hp.status.as_deref().and_then(Status::from_protocol);
    }

    fn refresh_vitals(&mut self) {
        self.hp_percent = if self.max_hp == 0 {
            0
        } else {
            (self.hp as f64 / self.max_hp as f64 * 100.0).round() as u32
        };
        self.fainted = self.hp == 0;
    }

    /// HP as a fraction of maximum; a pokemon with no HP report yet counts as full
    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp == 0 {
            if self.fainted { 0.0 } else { 1.0 }
        } else {
            self.hp as f64 / self.max_hp as f64
        }
    }

    pub fn faint(&mut self) {
        self.set_hp(0, None);
        self.status = None;
        self.active = false;
    }

    pub fn is_alive(&self) -> bool {
        !self.fainted
    }

    /// Record a move use, adding it to the known moveset
    pub fn record_move(&mut self, name: &str) {
        let id = effect_id(name);
        if id.is_empty() || id == "struggle" || self.moves.iter().any(|m| m.id == id) {
            return;
        }
        self.moves.push(KnownMove::new(name));
    }

    pub fn find_move_mut(&mut self, id: &str) -> Option<&mut KnownMove> {
        self.moves.iter_mut().find(|m| m.id == id)
    }

    pub fn has_volatile(&self, id: &str) -> bool {
        self.volatiles.contains(id)
    }

    pub fn set_species_types(&mut self, types: Vec<Type>) {
        if !self.terastallized && self.types == self.species_types {
            self.types = types.clone();
        }
        self.species_types = types;
    }

    /// Types used for matchups (tera type once terastallized)
    pub fn effective_types(&self) -> Vec<Type> {
        match (self.terastallized, self.tera_type) {
            (true, Some(tera)) => vec![tera],
            _ => self.types.clone(),
        }
    }

    pub fn terastallize(&mut self, tera: Option<Type>) {
        if tera.is_some() {
            self.tera_type = tera;
        }
        self.terastallized = true;
    }

    pub fn on_switch_in(&mut self) {
        self.active = true;
    }

    /// Clear everything that does not survive leaving the field
    pub fn on_switch_out(&mut self) {
        self.active = false;
        self.boosts.clear();
        self.volatiles.clear();
        self.types = self.species_types.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_hp_exact_then_damage() {
        let mut poke = BattlePokemon::new("Garchomp", "Garchomp");
        poke.set_hp(319, Some(319));
        poke.set_hp(200, Some(319));

        assert_eq!(poke.hp, 200);
        assert_eq!(poke.max_hp, 319);
        assert_eq!(poke.hp_percent, 63);
        assert!(!poke.fainted);
    }

    #[test]
    fn test_percentage_view_never_lowers_max() {
        let mut poke = BattlePokemon::new("Garchomp", "Garchomp");
        poke.set_hp(319, Some(319));
        poke.set_hp(63, Some(100));

        assert_eq!(poke.max_hp, 319);
        assert_eq!(poke.hp, 201);
        assert_eq!(poke.hp_percent, 63);
    }

    #[test]
    fn test_percentage_then_exact_raises_max() {
        let mut poke = BattlePokemon::new("Heatran", "Heatran");
        poke.set_hp(50, Some(100));
        poke.set_hp(193, Some(386));

        assert_eq!(poke.max_hp, 386);
        assert_eq!(poke.hp_percent, 50);
    }

    #[test]
    fn test_apply_hp_status() {
        let mut poke = BattlePokemon::new("Toxapex", "Pex");
        poke.apply_hp_status(&HpStatus::parse("40/100 tox").unwrap());
        assert_eq!(poke.status, Some(Status::Toxic));

        poke.apply_hp_status(&HpStatus::parse("0 fnt").unwrap());
        assert!(poke.fainted);
        assert_eq!(poke.hp, 0);
        assert_eq!(poke.hp_percent, 0);
        assert_eq!(poke.status, None);
    }

    #[test]
    fn test_record_move_dedups() {
        let mut poke = BattlePokemon::new("Pikachu", "Pikachu");
        poke.record_move("Thunderbolt");
        poke.record_move("Thunderbolt");
        poke.record_move("Struggle");
        assert_eq!(poke.moves.len(), 1);
        assert_eq!(poke.moves[0].id, "thunderbolt");
        assert_eq!(poke.moves[0].pp, None);
    }

    #[test]
    fn test_switch_out_resets_volatile_state() {
        let mut poke = BattlePokemon::new("Dragonite", "Dragonite");
        poke.set_species_types(vec![Type::Dragon, Type::Flying]);
        poke.on_switch_in();
        poke.boosts.atk = 2;
        poke.volatiles.insert("substitute".to_string());
        poke.types = vec![Type::Water];

        poke.on_switch_out();
        assert!(!poke.active);
        assert!(poke.boosts.is_clear());
        assert!(poke.volatiles.is_empty());
        assert_eq!(poke.types, vec![Type::Dragon, Type::Flying]);
    }

    #[test]
    fn test_effective_types_after_tera() {
        let mut poke = BattlePokemon::new("Dragonite", "Dragonite");
        poke.set_species_types(vec![Type::Dragon, Type::Flying]);
        poke.terastallize(Type::from_protocol("Normal"));
        assert_eq!(poke.effective_types(), vec![Type::Normal]);
    }
}
