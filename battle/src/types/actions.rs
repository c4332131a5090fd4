//! Typed legal-action sets built from requests
//!
//! A set is rebuilt from scratch for every request and never patched in place.

use duelist_protocol::{Choice, SlotAction};

use super::pokemon_type::Type;
use crate::dex::MoveCategory;

/// A selectable move in one active slot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveOption {
    /// 1-based move slot, as used in `move N`
    pub index: usize,
    pub id: String,
    pub name: String,
    pub pp: Option<u32>,
    pub max_pp: Option<u32>,
    pub disabled: bool,
    pub target: Option<String>,
    pub move_type: Option<Type>,
    pub category: Option<MoveCategory>,
    /// None for moves that never miss or when unknown
    pub accuracy: Option<u32>,
    pub base_power: Option<u32>,
}

impl MoveOption {
    pub fn is_usable(&self) -> bool {
        !self.disabled && self.pp.is_none_or(|pp| pp > 0)
    }

    /// Whether the choice string needs an explicit target in doubles
    pub fn needs_target(&self) -> bool {
        matches!(
            self.target.as_deref(),
            Some("normal" | "any" | "adjacentFoe" | "adjacentAlly" | "adjacentAllyOrSelf")
        )
    }
}

/// A team member that may be switched in
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchOption {
    /// 1-based team position, as used in `switch N`
    pub index: usize,
    pub name: String,
    pub species: String,
    pub hp_percent: u32,
}

/// Everything one active slot may do in response to a request
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleActionSet {
    /// Active slot this set belongs to (0 = a, 1 = b)
    pub active_slot: usize,
    pub moves: Vec<MoveOption>,
    pub switches: Vec<SwitchOption>,
    /// The slot must switch; `moves` is empty
    pub force_switch: bool,
    pub can_tera: bool,
    pub tera_type: Option<Type>,
    pub can_mega: bool,
    pub trapped: bool,
}

impl BattleActionSet {
    pub fn usable_moves(&self) -> impl Iterator<Item = &MoveOption> {
        self.moves.iter().filter(|m| m.is_usable())
    }

    /// No move and no switch can be chosen
    pub fn is_empty(&self) -> bool {
        self.usable_moves().next().is_none() && self.switches.is_empty()
    }

    /// Every distinct action this slot may take
    pub fn enumerate(&self, doubles: bool) -> Vec<SlotAction> {
        let mut actions = Vec::new();

        for option in self.usable_moves() {
            let targets: Vec<Option<i8>> = if doubles && option.needs_target() {
                vec![Some(1), Some(2)]
            } else {
                vec![None]
            };
            for target in targets {
                actions.push(SlotAction::Move {
                    index: option.index,
                    target,
                    terastallize: false,
                    mega: false,
                });
                if self.can_tera {
                    actions.push(SlotAction::Move {
                        index: option.index,
                        target,
                        terastallize: true,
                        mega: false,
                    });
                }
            }
        }

        actions.extend(
            self.switches
                .iter()
                .map(|s| SlotAction::Switch { index: s.index }),
        );
        actions
    }
}

/// What a request asks of its side
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestKind {
    /// Nothing to do until the opponent acts
    Wait,
    /// Choose a lead order
    TeamPreview {
        team_size: usize,
        max_chosen: Option<usize>,
    },
    /// One entry per active slot; `None` means the slot passes
    Decision(Vec<Option<BattleActionSet>>),
}

impl RequestKind {
    pub fn needs_choice(&self) -> bool {
        !matches!(self, RequestKind::Wait)
    }

    /// Build a full choice from per-slot picks, emitting `pass` for slots without a set
    pub fn assemble(&self, mut pick: impl FnMut(&BattleActionSet) -> SlotAction) -> Option<Choice> {
        let RequestKind::Decision(slots) = self else {
            return None;
        };
        let actions = slots
            .iter()
            .map(|slot| slot.as_ref().map_or(SlotAction::Pass, &mut pick))
            .collect();
        Some(Choice::new(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(index: usize, target: &str) -> MoveOption {
        MoveOption {
            index,
            id: format!("move{index}"),
            name: format!("Move {index}"),
            pp: Some(10),
            max_pp: Some(10),
            disabled: false,
            target: Some(target.to_string()),
            move_type: None,
            category: None,
            accuracy: None,
            base_power: None,
        }
    }

    #[test]
    fn test_enumerate_singles_with_tera() {
        let set = BattleActionSet {
            moves: vec![option(1, "normal"), option(2, "self")],
            switches: vec![SwitchOption {
                index: 3,
                name: "Ferrothorn".into(),
                species: "Ferrothorn".into(),
                hp_percent: 100,
            }],
            can_tera: true,
            ..Default::default()
        };

        let actions = set.enumerate(false);
        assert_eq!(actions.len(), 5);
        assert!(actions.contains(&SlotAction::Switch { index: 3 }));
    }

    #[test]
    fn test_enumerate_doubles_targets() {
        let set = BattleActionSet {
            moves: vec![option(1, "normal"), option(2, "allAdjacentFoes")],
            ..Default::default()
        };
        let actions: Vec<String> = set.enumerate(true).iter().map(|a| a.to_string()).collect();
        assert_eq!(actions, vec!["move 1 1", "move 1 2", "move 2"]);
    }

    #[test]
    fn test_disabled_and_empty_pp_are_unusable() {
        let mut disabled = option(1, "normal");
        disabled.disabled = true;
        let mut empty = option(2, "normal");
        empty.pp = Some(0);

        let set = BattleActionSet {
            moves: vec![disabled, empty],
            ..Default::default()
        };
        assert!(set.is_empty());
    }

    #[test]
    fn test_assemble_passes_missing_slots() {
        let kind = RequestKind::Decision(vec![
            None,
            Some(BattleActionSet {
                active_slot: 1,
                force_switch: true,
                switches: vec![SwitchOption {
                    index: 3,
                    name: "Amoonguss".into(),
                    species: "Amoonguss".into(),
                    hp_percent: 100,
                }],
                ..Default::default()
            }),
        ]);

        let choice = kind
            .assemble(|set| SlotAction::Switch {
                index: set.switches[0].index,
            })
            .unwrap();
        assert_eq!(choice.to_string(), "pass, switch 3");
        assert!(RequestKind::Wait.assemble(|_| SlotAction::Pass).is_none());
    }
}
