//! Turning `|request|` payloads into state updates and typed action sets

use duelist_protocol::{ActivePokemon, BattleRequest, MoveSlot, SidePokemon};

use super::battle::BattleState;
use crate::dex::Dex;
use crate::types::{
    BattleActionSet, BattlePokemon, BattleSide, KnownMove, KnownStats, MoveOption, RequestKind,
    SwitchOption, Type, effect_id,
};

impl BattleState {
    /// Copy the exact information a request carries into the requesting side
    ///
    /// Requests never reorder the roster or change active slots; those follow
    /// the protocol stream.
    pub fn sync_from_request(&mut self, request: &BattleRequest, dex: Option<&dyn Dex>) {
        let (Some(player), Some(info)) = (request.player(), request.side.as_ref()) else {
            return;
        };
        let side = self.side_mut(player);
        if side.name.is_empty() {
            side.name = info.name.clone();
        }

        for (position, member) in info.pokemon.iter().enumerate() {
            let details = member.parsed_details();
            let name = member.name();
            let idx = side.find_or_insert(name, None, || BattlePokemon::from_details(&details, name));

            let active = member
                .active
                .then(|| request.active.as_ref()?.get(position))
                .flatten();
            let poke = &mut side.team[idx];
            sync_member(poke, member, active);
            if poke.species_types.is_empty()
                && let Some(data) = dex.and_then(|d| d.species(&poke.species))
            {
                poke.set_species_types(data.types.clone());
                poke.base_speed = Some(data.base_speed);
            }
            if member.terastallized.is_some() {
                side.mark_terastallized();
            }
        }

        side.can_tera = !side.has_terastallized
            && request
                .active
                .iter()
                .flatten()
                .any(|a| a.can_terastallize.is_some());
    }
}

fn sync_member(poke: &mut BattlePokemon, member: &SidePokemon, active: Option<&ActivePokemon>) {
    poke.apply_details(&member.parsed_details());
    if let Some(hp) = member.hp_status() {
        poke.apply_hp_status(&hp);
    }

    let stats = member.stats;
    poke.stats = Some(KnownStats {
        atk: stats.atk,
        def: stats.def,
        spa: stats.spa,
        spd: stats.spd,
        spe: stats.spe,
    });

    if !member.item.is_empty() {
        poke.item = Some(member.item.clone());
    } else {
        poke.item = None;
    }
    if !member.ability.is_empty() {
        poke.ability = Some(member.ability.clone());
    }
    if let Some(tera) = member.tera_type.as_deref().and_then(Type::from_protocol) {
        poke.tera_type = Some(tera);
    }
    if let Some(tera) = member.terastallized.as_deref() {
        poke.terastallize(Type::from_protocol(tera));
    }

    // Request move ids are authoritative; keep display names we already know
    let moves = member
        .moves
        .iter()
        .map(|id| {
            let id = effect_id(id);
            let slot = active.and_then(|a| a.moves.iter().find(|m| effect_id(&m.id) == id));
            let known = poke.moves.iter().find(|m| m.id == id);
            KnownMove {
                name: slot
                    .map(|s| s.name.clone())
                    .or_else(|| known.map(|k| k.name.clone()))
                    .unwrap_or_else(|| id.clone()),
                pp: slot.and_then(|s| s.pp).or(known.and_then(|k| k.pp)),
                max_pp: slot.and_then(|s| s.max_pp).or(known.and_then(|k| k.max_pp)),
                id,
            }
        })
        .collect();
    poke.moves = moves;
}

impl RequestKind {
    /// Classify a request and build one action set per active slot
    ///
    /// `side` is the requesting side's tracked state, used for the
    /// terastallization flag; `dex` adds move metadata when present.
    pub fn from_request(request: &BattleRequest, side: &BattleSide, dex: Option<&dyn Dex>) -> Self {
        if !request.needs_decision() {
            return RequestKind::Wait;
        }

        if request.team_preview {
            let team_size = request.side.as_ref().map_or(0, |s| s.pokemon.len());
            return RequestKind::TeamPreview {
                team_size,
                max_chosen: request.max_chosen_team_size,
            };
        }

        let switches = switch_options(request);

        if request.is_force_switch() {
            // More flagged slots than healthy reserves: the surplus slots pass
            let mut reserves = switches.len();
            let flagged = request.force_switch.as_ref().map_or(0, Vec::len);
            let slots = (0..flagged)
                .map(|slot| {
                    if !request.slot_must_switch(slot) || reserves == 0 {
                        return None;
                    }
                    reserves -= 1;
                    Some(BattleActionSet {
                        active_slot: slot,
                        switches: switches.clone(),
                        force_switch: true,
                        ..Default::default()
                    })
                })
                .collect();
            return RequestKind::Decision(slots);
        }

        let Some(active) = request.active.as_ref() else {
            return RequestKind::Wait;
        };
        let roster = request.side.as_ref().map(|s| s.pokemon.as_slice()).unwrap_or_default();

        let slots = active
            .iter()
            .enumerate()
            .map(|(slot, options)| {
                if roster.get(slot).is_some_and(|p| p.is_fainted()) {
                    return None;
                }
                let set = BattleActionSet {
                    active_slot: slot,
                    moves: options
                        .moves
                        .iter()
                        .enumerate()
                        .map(|(i, m)| move_option(i + 1, m, dex))
                        .collect(),
                    switches: if options.can_switch() {
                        switches.clone()
                    } else {
                        Vec::new()
                    },
                    force_switch: false,
                    can_tera: options.can_terastallize.is_some() && !side.has_terastallized,
                    tera_type: options.can_terastallize.as_deref().and_then(Type::from_protocol),
                    can_mega: options.can_mega_evo,
                    trapped: options.trapped,
                };
                // A slot with nothing selectable can only pass
                (!set.is_empty()).then_some(set)
            })
            .collect();

        RequestKind::Decision(slots)
    }
}

fn switch_options(request: &BattleRequest) -> Vec<SwitchOption> {
    request
        .available_switches()
        .into_iter()
        .map(|(index, member)| {
            let hp_percent = member.hp_status().map_or(100, |hp| match hp.max {
                Some(max) if max > 0 => (hp.current as f64 / max as f64 * 100.0).round() as u32,
                _ => 0,
            });
            SwitchOption {
                index,
                name: member.name().to_string(),
                species: member.parsed_details().species,
                hp_percent,
            }
        })
        .collect()
}

fn move_option(index: usize, slot: &MoveSlot, dex: Option<&dyn Dex>) -> MoveOption {
    let data = dex.and_then(|d| d.move_data(&slot.id));
    MoveOption {
        index,
        id: effect_id(&slot.id),
        name: slot.name.clone(),
        pp: slot.pp,
        max_pp: slot.max_pp,
        disabled: slot.disabled,
        target: slot.target.clone(),
        move_type: data.map(|d| d.move_type),
        category: data.map(|d| d.category),
        accuracy: data.and_then(|d| d.accuracy),
        base_power: data.map(|d| d.base_power),
    }
}

#[cfg(test)]
mod tests {
    use duelist_protocol::Player;

    use super::*;
    use crate::dex::{MoveCategory, MoveData, StaticDex};

    const SINGLES: &str = r#"{
        "rqid": 3,
        "active": [{
            "moves": [
                {"move": "Earthquake", "id": "earthquake", "pp": 16, "maxpp": 16, "target": "allAdjacent"},
                {"move": "Dragon Claw", "id": "dragonclaw", "pp": 0, "maxpp": 24, "target": "normal"},
                {"move": "Swords Dance", "id": "swordsdance", "pp": 32, "maxpp": 32, "target": "self", "disabled": "Taunt"}
            ],
            "canTerastallize": "Steel"
        }],
        "side": {"name": "Player", "id": "p1", "pokemon": [
            {"ident": "p1: Garchomp", "details": "Garchomp, L50, M", "condition": "200/319", "active": true,
             "stats": {"atk": 200, "def": 150, "spa": 100, "spd": 110, "spe": 169},
             "moves": ["earthquake", "dragonclaw", "swordsdance"], "baseAbility": "roughskin",
             "ability": "roughskin", "item": "lifeorb", "teraType": "Steel"},
            {"ident": "p1: Ferrothorn", "details": "Ferrothorn, L50", "condition": "160/160", "active": false,
             "moves": ["stealthrock"], "ability": "ironbarbs", "item": "leftovers"},
            {"ident": "p1: Toxapex", "details": "Toxapex, L50", "condition": "0 fnt", "active": false,
             "moves": ["scald"], "ability": "regenerator", "item": ""}
        ]}
    }"#;

    #[test]
    fn test_singles_decision() {
        let request = BattleRequest::from_json(SINGLES).unwrap();
        let side = BattleSide::new(Player::P1);
        let RequestKind::Decision(slots) = RequestKind::from_request(&request, &side, None) else {
            panic!("expected a decision");
        };

        let set = slots[0].as_ref().unwrap();
        assert_eq!(set.moves.len(), 3);
        assert_eq!(set.usable_moves().count(), 1);
        assert_eq!(set.switches.len(), 1);
        assert_eq!(set.switches[0].index, 2);
        assert!(set.can_tera);
        assert_eq!(set.tera_type, Some(Type::Steel));
    }

    #[test]
    fn test_tera_unavailable_after_use() {
        let request = BattleRequest::from_json(SINGLES).unwrap();
        let mut side = BattleSide::new(Player::P1);
        side.mark_terastallized();
        let RequestKind::Decision(slots) = RequestKind::from_request(&request, &side, None) else {
            panic!("expected a decision");
        };
        assert!(!slots[0].as_ref().unwrap().can_tera);
    }

    #[test]
    fn test_move_metadata_from_dex() {
        let dex = StaticDex::new().with_move(
            "Earthquake",
            MoveData {
                move_type: Type::Ground,
                category: MoveCategory::Physical,
                base_power: 100,
                accuracy: Some(100),
                priority: 0,
            },
        );
        let request = BattleRequest::from_json(SINGLES).unwrap();
        let side = BattleSide::new(Player::P1);
        let RequestKind::Decision(slots) = RequestKind::from_request(&request, &side, Some(&dex))
        else {
            panic!("expected a decision");
        };
        let quake = &slots[0].as_ref().unwrap().moves[0];
        assert_eq!(quake.move_type, Some(Type::Ground));
        assert_eq!(quake.base_power, Some(100));
    }

    #[test]
    fn test_wait_and_preview() {
        let wait = BattleRequest::from_json(r#"{"wait": true, "side": {"name": "P", "id": "p1", "pokemon": []}}"#)
            .unwrap();
        let side = BattleSide::new(Player::P1);
        assert_eq!(RequestKind::from_request(&wait, &side, None), RequestKind::Wait);

        let preview = BattleRequest::from_json(
            r#"{"teamPreview": true, "maxChosenTeamSize": 4, "side": {"name": "P", "id": "p1", "pokemon": [
                {"ident": "p1: A", "details": "A", "condition": "100/100"},
                {"ident": "p1: B", "details": "B", "condition": "100/100"}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(
            RequestKind::from_request(&preview, &side, None),
            RequestKind::TeamPreview {
                team_size: 2,
                max_chosen: Some(4)
            }
        );
    }

    #[test]
    fn test_unflagged_force_switch_is_a_normal_turn() {
        let request = BattleRequest::from_json(
            r#"{"forceSwitch": [false], "active": [{"moves": [{"move": "Tackle", "id": "tackle"}]}],
                "side": {"name": "P", "id": "p1", "pokemon": [
                {"ident": "p1: A", "details": "A", "condition": "100/100", "active": true}
            ]}}"#,
        )
        .unwrap();
        let side = BattleSide::new(Player::P1);
        let RequestKind::Decision(slots) = RequestKind::from_request(&request, &side, None) else {
            panic!("expected a decision");
        };
        let set = slots[0].as_ref().unwrap();
        assert!(!set.force_switch);
        assert_eq!(set.moves[0].id, "tackle");
    }

    #[test]
    fn test_doubles_force_switch_one_slot() {
        let request = BattleRequest::from_json(
            r#"{"forceSwitch": [false, true], "side": {"name": "P", "id": "p1", "pokemon": [
                {"ident": "p1: Incineroar", "details": "Incineroar", "condition": "100/100", "active": true},
                {"ident": "p1: Amoonguss", "details": "Amoonguss", "condition": "0 fnt", "active": true},
                {"ident": "p1: Rillaboom", "details": "Rillaboom", "condition": "100/100", "active": false}
            ]}}"#,
        )
        .unwrap();
        let side = BattleSide::new(Player::P1);
        let kind = RequestKind::from_request(&request, &side, None);

        let RequestKind::Decision(slots) = &kind else {
            panic!("expected a decision");
        };
        assert!(slots[0].is_none());
        assert!(slots[1].as_ref().unwrap().force_switch);

        let choice = kind
            .assemble(|set| duelist_protocol::SlotAction::Switch {
                index: set.switches[0].index,
            })
            .unwrap();
        assert_eq!(choice.to_string(), "pass, switch 3");
    }

    #[test]
    fn test_double_faint_with_one_reserve() {
        let request = BattleRequest::from_json(
            r#"{"forceSwitch": [true, true], "side": {"name": "P", "id": "p1", "pokemon": [
                {"ident": "p1: A", "details": "A", "condition": "0 fnt", "active": true},
                {"ident": "p1: B", "details": "B", "condition": "0 fnt", "active": true},
                {"ident": "p1: C", "details": "C", "condition": "100/100", "active": false}
            ]}}"#,
        )
        .unwrap();
        let side = BattleSide::new(Player::P1);
        let RequestKind::Decision(slots) = RequestKind::from_request(&request, &side, None) else {
            panic!("expected a decision");
        };
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
    }

    #[test]
    fn test_doubles_fainted_active_passes() {
        let request = BattleRequest::from_json(
            r#"{"active": [
                {"moves": [{"move": "Tackle", "id": "tackle", "pp": 35, "maxpp": 35, "target": "normal"}]},
                {"moves": [{"move": "Tackle", "id": "tackle", "pp": 35, "maxpp": 35, "target": "normal"}]}
            ], "side": {"name": "P", "id": "p1", "pokemon": [
                {"ident": "p1: A", "details": "A", "condition": "0 fnt", "active": true},
                {"ident": "p1: B", "details": "B", "condition": "100/100", "active": true}
            ]}}"#,
        )
        .unwrap();
        let side = BattleSide::new(Player::P1);
        let RequestKind::Decision(slots) = RequestKind::from_request(&request, &side, None) else {
            panic!("expected a decision");
        };
        assert!(slots[0].is_none());
        assert_eq!(slots[1].as_ref().unwrap().enumerate(true).len(), 2);
    }

    #[test]
    fn test_sync_from_request() {
        let request = BattleRequest::from_json(SINGLES).unwrap();
        let mut state = BattleState::new();
        state.sync_from_request(&request, None);

        let side = state.side(Player::P1);
        assert_eq!(side.name, "Player");
        assert_eq!(side.team.len(), 3);
        assert!(side.can_tera);

        let chomp = &side.team[0];
        assert_eq!(chomp.hp, 200);
        assert_eq!(chomp.max_hp, 319);
        assert_eq!(chomp.stats.unwrap().spe, 169);
        assert_eq!(chomp.item.as_deref(), Some("lifeorb"));
        assert_eq!(chomp.tera_type, Some(Type::Steel));
        assert_eq!(chomp.moves[0].name, "Earthquake");
        assert_eq!(chomp.moves[0].pp, Some(16));

        assert!(side.team[2].fainted);
        assert_eq!(side.team[2].item, None);
    }
}
