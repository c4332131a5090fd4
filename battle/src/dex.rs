//! Static game data lookups
//!
//! The interpreter and the action-set builder work without a dex, but fill in
//! species types, base speed and move metadata when one is provided.

use std::collections::HashMap;

use crate::types::{Type, effect_id};

/// Move damage category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SpeciesData {
    pub types: Vec<Type>,
    pub base_speed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MoveData {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub move_type: Type,
    pub category: MoveCategory,
    #[cfg_attr(feature = "serde", serde(default))]
    pub base_power: u32,
    /// None for moves that never miss
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "accuracy_or_true")
    )]
    pub accuracy: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: i8,
}

/// Lookup of species and move data by name or id
pub trait Dex: Send + Sync {
    fn species(&self, name: &str) -> Option<&SpeciesData>;
    fn move_data(&self, name: &str) -> Option<&MoveData>;
}

/// In-memory dex keyed by normalized id
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct StaticDex {
    #[cfg_attr(feature = "serde", serde(default))]
    species: HashMap<String, SpeciesData>,
    #[cfg_attr(feature = "serde", serde(default))]
    moves: HashMap<String, MoveData>,
}

impl StaticDex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_species(mut self, name: &str, types: &[Type], base_speed: u32) -> Self {
        self.species.insert(
            effect_id(name),
            SpeciesData {
                types: types.to_vec(),
                base_speed,
            },
        );
        self
    }

    pub fn with_move(mut self, name: &str, data: MoveData) -> Self {
        self.moves.insert(effect_id(name), data);
        self
    }

    /// Load from `{"species": {...}, "moves": {...}}`
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        fn normalize<T>(map: HashMap<String, T>) -> HashMap<String, T> {
            map.into_iter().map(|(k, v)| (effect_id(&k), v)).collect()
        }

        let raw: StaticDex = serde_json::from_str(json)?;
        Ok(Self {
            species: normalize(raw.species),
            moves: normalize(raw.moves),
        })
    }

    pub fn len(&self) -> usize {
        self.species.len() + self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dex for StaticDex {
    fn species(&self, name: &str) -> Option<&SpeciesData> {
        self.species.get(&effect_id(name)).or_else(|| {
            // Formes fall back to their base species ("Rotom-Wash" -> "rotom")
            let base = name.split('-').next()?;
            self.species.get(&effect_id(base))
        })
    }

    fn move_data(&self, name: &str) -> Option<&MoveData> {
        self.moves.get(&effect_id(name))
    }
}

#[cfg(feature = "serde")]
fn accuracy_or_true<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().map(|n| n as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_lookup_by_name() {
        let dex = StaticDex::new().with_species("Rotom", &[Type::Electric, Type::Ghost], 91);
        assert_eq!(dex.species("Rotom").unwrap().base_speed, 91);
        assert_eq!(
            dex.species("Rotom-Wash").unwrap().types,
            vec![Type::Electric, Type::Ghost]
        );
        assert!(dex.species("Garchomp").is_none());
    }

    #[test]
    fn test_move_lookup_normalizes() {
        let dex = StaticDex::new().with_move(
            "Close Combat",
            MoveData {
                move_type: Type::Fighting,
                category: MoveCategory::Physical,
                base_power: 120,
                accuracy: Some(100),
                priority: 0,
            },
        );
        assert_eq!(dex.move_data("closecombat").unwrap().base_power, 120);
        assert_eq!(dex.move_data("Close Combat").unwrap().move_type, Type::Fighting);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let json = r#"{
            "species": {"Garchomp": {"types": ["Dragon", "Ground"], "baseSpeed": 102}},
            "moves": {"aerialace": {"type": "Flying", "category": "Physical", "basePower": 60, "accuracy": true}}
        }"#;
        let dex = StaticDex::from_json(json).unwrap();
        assert_eq!(dex.species("garchomp").unwrap().base_speed, 102);
        assert_eq!(dex.move_data("Aerial Ace").unwrap().accuracy, None);
    }
}
