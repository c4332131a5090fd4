//! Side (player) state

use std::collections::BTreeMap;

use duelist_protocol::Player;

use super::conditions::{SideConditionState, is_hazard, is_screen, side_condition_kind};
use super::pokemon::BattlePokemon;

/// One player's side of the battle
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleSide {
    pub id: Player,
    pub name: String,

    /// Team index of the pokemon in each active slot
    pub active: Vec<Option<usize>>,

    /// Pokemon seen so far, in reveal order (request order for the requesting side)
    pub team: Vec<BattlePokemon>,

    /// Size announced by `teamsize`
    pub team_size: Option<usize>,

    /// Side conditions by effect id
    pub conditions: BTreeMap<String, SideConditionState>,

    /// Whether the latest request offered terastallization; cleared once used
    pub can_tera: bool,

    /// Set the first time this side terastallizes, never reset
    pub has_terastallized: bool,
}

impl BattleSide {
    pub fn new(id: Player) -> Self {
        Self {
            id,
            name: String::new(),
            active: vec![None],
            team: Vec::new(),
            team_size: None,
            conditions: BTreeMap::new(),
            can_tera: false,
            has_terastallized: false,
        }
    }

    /// Set the number of active slots (1 for singles, 2 for doubles)
    pub fn set_active_slots(&mut self, count: usize) {
        self.active.resize(count.max(1), None);
    }

    pub fn active_pokemon(&self, slot: usize) -> Option<&BattlePokemon> {
        let index = (*self.active.get(slot)?)?;
        self.team.get(index)
    }

    pub fn active_pokemon_mut(&mut self, slot: usize) -> Option<&mut BattlePokemon> {
        let index = (*self.active.get(slot)?)?;
        self.team.get_mut(index)
    }

    /// Active, non-fainted pokemon
    pub fn active_alive(&self) -> impl Iterator<Item = &BattlePokemon> {
        self.active
            .iter()
            .filter_map(|idx| idx.and_then(|i| self.team.get(i)))
            .filter(|p| p.is_alive())
    }

    /// Non-active, non-fainted team members with their team index
    pub fn bench(&self) -> impl Iterator<Item = (usize, &BattlePokemon)> {
        self.team
            .iter()
            .enumerate()
            .filter(|(i, p)| !self.active.contains(&Some(*i)) && p.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.team.iter().filter(|p| p.is_alive()).count()
    }

    /// Alive count including members not revealed yet
    pub fn remaining(&self) -> usize {
        let unseen = self.team_size.unwrap_or(0).saturating_sub(self.team.len());
        self.alive_count() + unseen
    }

    /// Resolve a display name to a team index
    ///
    /// Active slots are searched before the bench (the addressed slot first), and
    /// nicknames win over species names.
    pub fn find_index(&self, name: &str, slot: Option<usize>) -> Option<usize> {
        let mut active: Vec<usize> = Vec::with_capacity(self.active.len());
        if let Some(Some(idx)) = slot.and_then(|s| self.active.get(s)) {
            active.push(*idx);
        }
        active.extend(self.active.iter().flatten().copied());

        let by_nickname = |idx: &usize| self.team[*idx].nickname == name;
        let by_species = |idx: &usize| self.team[*idx].species == name;

        active
            .iter()
            .copied()
            .find(by_nickname)
            .or_else(|| active.iter().copied().find(by_species))
            .or_else(|| (0..self.team.len()).find(by_nickname))
            .or_else(|| (0..self.team.len()).find(by_species))
    }

    /// Find a pokemon by name, or append a new roster entry for it
    pub fn find_or_insert(
        &mut self,
        name: &str,
        slot: Option<usize>,
        create: impl FnOnce() -> BattlePokemon,
    ) -> usize {
        if let Some(idx) = self.find_index(name, slot) {
            return idx;
        }
        self.team.push(create());
        self.team.len() - 1
    }

    /// Put team member `index` into `slot`, switching out whatever was there
    pub fn set_active(&mut self, slot: usize, index: Option<usize>) {
        if slot >= self.active.len() {
            self.active.resize(slot + 1, None);
        }

        if let Some(old) = self.active[slot]
            && Some(old) != index
            && let Some(poke) = self.team.get_mut(old)
        {
            poke.on_switch_out();
        }

        // A pokemon can only occupy one slot (ally switch / shuffles)
        if let Some(new) = index {
            for other in self.active.iter_mut() {
                if *other == Some(new) {
                    *other = None;
                }
            }
        }

        self.active[slot] = index;
        if let Some(poke) = index.and_then(|i| self.team.get_mut(i)) {
            poke.on_switch_in();
        }
    }

    pub fn layers(&self, id: &str) -> u8 {
        self.conditions.get(id).map_or(0, |c| c.layers)
    }

    pub fn has_condition(&self, id: &str) -> bool {
        self.conditions.contains_key(id)
    }

    /// Start or stack a condition; returns false if it was already at its cap
    pub fn add_condition(&mut self, id: &str) -> bool {
        let kind = side_condition_kind(id);
        match self.conditions.get_mut(id) {
            Some(state) => state.reapply(kind),
            None => {
                self.conditions
                    .insert(id.to_string(), SideConditionState::new(kind));
                true
            }
        }
    }

    pub fn remove_condition(&mut self, id: &str) -> bool {
        self.conditions.remove(id).is_some()
    }

    pub fn tick_conditions(&mut self) {
        for state in self.conditions.values_mut() {
            state.tick();
        }
    }

    /// Hazards with their layer counts
    pub fn hazards(&self) -> impl Iterator<Item = (&str, u8)> {
        self.conditions
            .iter()
            .filter(|(id, _)| is_hazard(id))
            .map(|(id, state)| (id.as_str(), state.layers))
    }

    pub fn screen_count(&self) -> usize {
        self.conditions.keys().filter(|id| is_screen(id)).count()
    }

    /// Record that this side used terastallization
    pub fn mark_terastallized(&mut self) {
        self.has_terastallized = true;
        self.can_tera = false;
    }
}
