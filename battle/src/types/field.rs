//! Global field state

use std::collections::BTreeSet;

use super::conditions::{Terrain, Weather, effect_id};

const WEATHER_TURNS: u8 = 5;
const TERRAIN_TURNS: u8 = 5;
const TRICK_ROOM_TURNS: u8 = 5;

/// Field-wide effects started by `-fieldstart`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEffect {
    Terrain(Terrain),
    TrickRoom,
    Pseudo,
}

/// Conditions affecting both sides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldState {
    pub weather: Option<Weather>,
    pub weather_turns: u8,

    pub terrain: Option<Terrain>,
    pub terrain_turns: u8,

    /// Turns of Trick Room remaining; 0 when inactive
    pub trick_room_turns: u8,

    /// Other field effects by id (gravity, magicroom, ...)
    pub pseudo_weather: BTreeSet<String>,
}

impl FieldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trick_room(&self) -> bool {
        self.trick_room_turns > 0
    }

    /// Apply a `-weather` event
    pub fn apply_weather(&mut self, name: &str, upkeep: bool) {
        let Some(weather) = Weather::from_protocol(name) else {
            self.weather = None;
            self.weather_turns = 0;
            return;
        };

        if upkeep && self.weather == Some(weather) {
            return;
        }

        self.weather = Some(weather);
        self.weather_turns = if weather.is_primal() {
            0
        } else if upkeep {
            1
        } else {
            WEATHER_TURNS
        };
    }

    fn classify(id: &str) -> FieldEffect {
        if let Some(terrain) = Terrain::from_protocol(id) {
            return FieldEffect::Terrain(terrain);
        }
        match id {
            "trickroom" => FieldEffect::TrickRoom,
            _ => FieldEffect::Pseudo,
        }
    }

    /// Apply a `-fieldstart` event
    pub fn apply_field_start(&mut self, condition: &str) {
        let id = effect_id(condition);
        match Self::classify(&id) {
            FieldEffect::Terrain(terrain) => {
                self.terrain = Some(terrain);
                self.terrain_turns = TERRAIN_TURNS;
            }
            FieldEffect::TrickRoom => self.trick_room_turns = TRICK_ROOM_TURNS,
            FieldEffect::Pseudo => {
                self.pseudo_weather.insert(id);
            }
        }
    }

    /// Apply a `-fieldend` event
    pub fn apply_field_end(&mut self, condition: &str) {
        let id = effect_id(condition);
        match Self::classify(&id) {
            FieldEffect::Terrain(terrain) => {
                if self.terrain == Some(terrain) {
                    self.terrain = None;
                    self.terrain_turns = 0;
                }
            }
            FieldEffect::TrickRoom => self.trick_room_turns = 0,
            FieldEffect::Pseudo => {
                self.pseudo_weather.remove(&id);
            }
        }
    }

    /// Count down timers at the start of a new turn
    ///
    /// Effects are only removed by their explicit end events; counters floor at 1
    /// while the effect is still reported active.
    pub fn tick(&mut self) {
        if self.weather.is_some() && self.weather_turns > 1 {
            self.weather_turns -= 1;
        }
        if self.terrain.is_some() && self.terrain_turns > 1 {
            self.terrain_turns -= 1;
        }
        if self.trick_room_turns > 1 {
            self.trick_room_turns -= 1;
        }
    }
}
