//! Stat stages

use duelist_protocol::Stat;

/// Stat stages, each clamped to -6..=+6
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatStages {
    pub atk: i8,
    pub def: i8,
    pub spa: i8,
    pub spd: i8,
    pub spe: i8,
    pub accuracy: i8,
    pub evasion: i8,
}

impl StatStages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stat: Stat) -> i8 {
        match stat {
            Stat::Atk => self.atk,
            Stat::Def => self.def,
            Stat::Spa => self.spa,
            Stat::Spd => self.spd,
            Stat::Spe => self.spe,
            Stat::Accuracy => self.accuracy,
            Stat::Evasion => self.evasion,
        }
    }

    fn slot_mut(&mut self, stat: Stat) -> &mut i8 {
        match stat {
            Stat::Atk => &mut self.atk,
            Stat::Def => &mut self.def,
            Stat::Spa => &mut self.spa,
            Stat::Spd => &mut self.spd,
            Stat::Spe => &mut self.spe,
            Stat::Accuracy => &mut self.accuracy,
            Stat::Evasion => &mut self.evasion,
        }
    }

    /// Set stage for a stat (clamped to -6..+6)
    pub fn set(&mut self, stat: Stat, value: i8) {
        *self.slot_mut(stat) = value.clamp(-6, 6);
    }

    /// Apply a boost, returns the change actually applied
    pub fn boost(&mut self, stat: Stat, amount: i8) -> i8 {
        let current = self.get(stat);
        let new_value = current.saturating_add(amount).clamp(-6, 6);
        self.set(stat, new_value);
        new_value - current
    }

    pub fn unboost(&mut self, stat: Stat, amount: i8) -> i8 {
        self.boost(stat, amount.saturating_neg())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn retain(&mut self, keep: impl Fn(i8) -> bool) {
        for stat in Stat::ALL {
            let slot = self.slot_mut(stat);
            if !keep(*slot) {
                *slot = 0;
            }
        }
    }

    pub fn clear_positive(&mut self) {
        self.retain(|stage| stage <= 0);
    }

    pub fn clear_negative(&mut self) {
        self.retain(|stage| stage >= 0);
    }

    /// Invert all stages (Topsy-Turvy)
    pub fn invert(&mut self) {
        for stat in Stat::ALL {
            let slot = self.slot_mut(stat);
            *slot = -*slot;
        }
    }

    /// Sum of the five battle stats' stages
    pub fn net(&self) -> i32 {
        [self.atk, self.def, self.spa, self.spd, self.spe]
            .iter()
            .map(|&s| s as i32)
            .sum()
    }

    /// Multiplier for a stage of atk/def/spa/spd/spe
    /// +1 = 1.5x, +6 = 4x, -1 = 0.67x, -6 = 0.25x
    pub fn multiplier(stage: i8) -> f32 {
        let stage = stage.clamp(-6, 6) as i32;
        if stage >= 0 {
            (2 + stage) as f32 / 2.0
        } else {
            2.0 / (2 - stage) as f32
        }
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}
