//! Decision makers for one side of a battle

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use duelist_battle::query::{is_weak_to_any, resists_all};
use duelist_battle::{
    BattleActionSet, BattlePokemon, BattleState, Evaluate, MoveCategory, MoveOption, RequestKind,
    Type,
};
use duelist_protocol::{Choice, GameType, Player, SlotAction};
use rand::seq::SliceRandom;

use crate::duct::{DuctConfig, DuctSearch};
use crate::engine::BattleEngine;

/// Everything an agent sees when asked for a decision
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub state: &'a BattleState,
    pub side: Player,
    pub request: &'a RequestKind,
    /// Serialized engine battle, when the simulator supports snapshots
    pub snapshot: Option<&'a str>,
}

impl DecisionContext<'_> {
    pub fn doubles(&self) -> bool {
        self.state.game_type == GameType::Doubles
    }

    fn own(&self, name: &str) -> Option<&BattlePokemon> {
        let side = self.state.side(self.side);
        side.find_index(name, None).map(|i| &side.team[i])
    }

    /// Opposing active pokemon by slot
    fn foes(&self) -> Vec<Option<&BattlePokemon>> {
        let side = self.state.side(self.side.opponent());
        (0..side.active.len())
            .map(|slot| side.active_pokemon(slot).filter(|p| p.is_alive()))
            .collect()
    }
}

pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Full choice for a decision request; `None` when nothing is owed
    fn choose(&self, ctx: &DecisionContext<'_>) -> Option<Choice>;

    /// 1-based lead order for team preview
    fn team_order(&self, ctx: &DecisionContext<'_>) -> Vec<usize> {
        match ctx.request {
            RequestKind::TeamPreview { team_size, .. } => (1..=*team_size).collect(),
            _ => Vec::new(),
        }
    }
}

/// Score below which a healthier, resistant switch is preferred over attacking
const SWITCH_THRESHOLD: f64 = 40.0;
const UNKNOWN_POWER: f64 = 60.0;
const STATUS_MOVE_SCORE: f64 = 15.0;

/// Rule-based agent: strongest expected hit, switch out of bad matchups
#[derive(Debug, Clone, Default)]
pub struct HeuristicAgent;

impl HeuristicAgent {
    pub fn new() -> Self {
        Self
    }

    fn pick(&self, ctx: &DecisionContext<'_>, set: &BattleActionSet, taken: &[usize]) -> SlotAction {
        let attacker = ctx.state.side(ctx.side).active_pokemon(set.active_slot);
        let attacker_types = attacker.map(BattlePokemon::effective_types).unwrap_or_default();
        let foes = ctx.foes();

        let best_move = set
            .usable_moves()
            .filter(|_| !set.force_switch)
            .map(|option| {
                let (target, score) = best_target(option, &attacker_types, &foes, ctx.doubles());
                (option, target, score)
            })
            .fold(None, |best: Option<(&MoveOption, Option<i8>, f64)>, candidate| {
                match best {
                    Some(top) if top.2 >= candidate.2 => Some(top),
                    _ => Some(candidate),
                }
            });

        let switch = self.best_switch(ctx, set, taken, &foes);

        match (best_move, switch) {
            (Some((_, _, score)), Some((index, switch_score)))
                if score < SWITCH_THRESHOLD && switch_score > 1.0 =>
            {
                SlotAction::Switch { index }
            }
            (Some((option, target, _)), _) => SlotAction::Move {
                index: option.index,
                target,
                terastallize: false,
                mega: false,
            },
            (None, Some((index, _))) => SlotAction::Switch { index },
            (None, None) => SlotAction::Pass,
        }
    }

    /// Best untaken switch with its score
    fn best_switch(
        &self,
        ctx: &DecisionContext<'_>,
        set: &BattleActionSet,
        taken: &[usize],
        foes: &[Option<&BattlePokemon>],
    ) -> Option<(usize, f64)> {
        let foe_types: Vec<Type> = foes
            .iter()
            .flatten()
            .flat_map(|p| p.effective_types())
            .collect();

        set.switches
            .iter()
            .filter(|s| !taken.contains(&s.index))
            .map(|s| {
                let types = ctx
                    .own(&s.name)
                    .map(BattlePokemon::effective_types)
                    .unwrap_or_default();
                let mut score = s.hp_percent as f64 / 100.0;
                if !types.is_empty() && resists_all(&types, &foe_types) {
                    score += 1.0;
                }
                if is_weak_to_any(&types, &foe_types) {
                    score -= 1.0;
                }
                (s.index, score)
            })
            .fold(None, |best: Option<(usize, f64)>, candidate| match best {
                Some(top) if top.1 >= candidate.1 => Some(top),
                _ => Some(candidate),
            })
    }
}

/// Expected damage proxy for `option` against its best target
fn best_target(
    option: &MoveOption,
    attacker_types: &[Type],
    foes: &[Option<&BattlePokemon>],
    doubles: bool,
) -> (Option<i8>, f64) {
    let score_against = |defender: Option<&BattlePokemon>| -> f64 {
        if option.category == Some(MoveCategory::Status) {
            return STATUS_MOVE_SCORE;
        }
        let power = option.base_power.map_or(UNKNOWN_POWER, f64::from);
        let (effectiveness, stab) = match option.move_type {
            Some(move_type) => {
                let defender_types = defender.map(BattlePokemon::effective_types).unwrap_or_default();
                let eff = if defender_types.is_empty() {
                    1.0
                } else {
                    move_type.effectiveness_multi(&defender_types) as f64
                };
                let stab = if attacker_types.contains(&move_type) { 1.5 } else { 1.0 };
                (eff, stab)
            }
            None => (1.0, 1.0),
        };
        let accuracy = option.accuracy.map_or(1.0, |a| a as f64 / 100.0);
        power * effectiveness * stab * accuracy
    };

    if !(doubles && option.needs_target()) {
        let front = foes.iter().flatten().next().copied();
        return (None, score_against(front));
    }

    foes.iter()
        .enumerate()
        .filter_map(|(slot, foe)| foe.map(|p| (slot as i8 + 1, score_against(Some(p)))))
        .fold(None, |best: Option<(i8, f64)>, candidate| match best {
            Some(top) if top.1 >= candidate.1 => Some(top),
            _ => Some(candidate),
        })
        .map_or((Some(1), score_against(None)), |(target, score)| (Some(target), score))
}

impl Agent for HeuristicAgent {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn choose(&self, ctx: &DecisionContext<'_>) -> Option<Choice> {
        let mut taken = Vec::new();
        ctx.request.assemble(|set| {
            let action = self.pick(ctx, set, &taken);
            if let SlotAction::Switch { index } = action {
                taken.push(index);
            }
            action
        })
    }
}

/// Uniformly random legal actions
#[derive(Debug, Clone, Default)]
pub struct RandomAgent;

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn choose(&self, ctx: &DecisionContext<'_>) -> Option<Choice> {
        let mut rng = rand::thread_rng();
        let mut taken = Vec::new();
        ctx.request.assemble(|set| {
            let options: Vec<SlotAction> = set
                .enumerate(ctx.doubles())
                .into_iter()
                .filter(|a| !matches!(a, SlotAction::Switch { index } if taken.contains(index)))
                .collect();
            let action = options.choose(&mut rng).cloned().unwrap_or(SlotAction::Pass);
            if let SlotAction::Switch { index } = action {
                taken.push(index);
            }
            action
        })
    }
}

/// DUCT search over engine snapshots, falling back to [`HeuristicAgent`]
pub struct DuctAgent<E: BattleEngine> {
    engine: Arc<E>,
    evaluator: Arc<dyn Evaluate>,
    config: DuctConfig,
    fallback: HeuristicAgent,
}

impl<E: BattleEngine> DuctAgent<E> {
    pub fn new(engine: Arc<E>, evaluator: Arc<dyn Evaluate>, config: DuctConfig) -> Self {
        Self {
            engine,
            evaluator,
            config,
            fallback: HeuristicAgent,
        }
    }

    pub fn config(&self) -> &DuctConfig {
        &self.config
    }
}

impl<E: BattleEngine> Agent for DuctAgent<E> {
    fn name(&self) -> &str {
        "duct"
    }

    fn choose(&self, ctx: &DecisionContext<'_>) -> Option<Choice> {
        if !matches!(ctx.request, RequestKind::Decision(_)) {
            return None;
        }
        let Some(snapshot) = ctx.snapshot else {
            tracing::debug!(side = %ctx.side, "No snapshot available, using heuristic");
            return self.fallback.choose(ctx);
        };

        let search = DuctSearch::new(self.engine.as_ref(), self.evaluator.as_ref(), self.config.clone());
        // Engine panics fall back like search errors
        let searched = panic::catch_unwind(AssertUnwindSafe(|| search.search(snapshot, ctx.side)));
        let Ok(searched) = searched else {
            tracing::error!(side = %ctx.side, "Search panicked, using heuristic");
            return self.fallback.choose(ctx);
        };
        match searched {
            Ok(result) if result.iterations > 0 => {
                match result.action.as_deref().map(str::parse::<Choice>) {
                    Some(Ok(choice)) => Some(choice),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Search returned an unusable choice");
                        self.fallback.choose(ctx)
                    }
                    None => self.fallback.choose(ctx),
                }
            }
            Ok(_) => self.fallback.choose(ctx),
            Err(e) => {
                tracing::warn!(side = %ctx.side, error = %e, "Search failed, using heuristic");
                self.fallback.choose(ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use duelist_battle::{SwitchOption, process_chunk};

    use super::*;

    fn option(index: usize, move_type: Type, power: u32) -> MoveOption {
        MoveOption {
            index,
            id: format!("move{index}"),
            name: format!("Move {index}"),
            pp: Some(10),
            max_pp: Some(10),
            disabled: false,
            target: Some("normal".into()),
            move_type: Some(move_type),
            category: Some(MoveCategory::Special),
            accuracy: Some(100),
            base_power: Some(power),
        }
    }

    fn garchomp_vs_heatran() -> BattleState {
        let mut state = BattleState::new();
        process_chunk(
            &mut state,
            "|switch|p1a: Garchomp|Garchomp|100/100\n|switch|p2a: Heatran|Heatran|100/100",
        );
        state.side_mut(Player::P1).team[0].set_species_types(vec![Type::Dragon, Type::Ground]);
        state.side_mut(Player::P2).team[0].set_species_types(vec![Type::Fire, Type::Steel]);
        state
    }

    #[test]
    fn test_heuristic_picks_super_effective_move() {
        let state = garchomp_vs_heatran();
        let request = RequestKind::Decision(vec![Some(BattleActionSet {
            moves: vec![option(1, Type::Dragon, 120), option(2, Type::Ground, 100)],
            ..Default::default()
        })]);
        let ctx = DecisionContext {
            state: &state,
            side: Player::P1,
            request: &request,
            snapshot: None,
        };

        let choice = HeuristicAgent.choose(&ctx).unwrap();
        assert_eq!(choice.to_string(), "move 2");
    }

    #[test]
    fn test_heuristic_forced_switch_avoids_duplicates() {
        let state = garchomp_vs_heatran();
        let switches = vec![
            SwitchOption {
                index: 3,
                name: "Ferrothorn".into(),
                species: "Ferrothorn".into(),
                hp_percent: 100,
            },
            SwitchOption {
                index: 4,
                name: "Toxapex".into(),
                species: "Toxapex".into(),
                hp_percent: 50,
            },
        ];
        let forced = |slot| {
            Some(BattleActionSet {
                active_slot: slot,
                force_switch: true,
                switches: switches.clone(),
                ..Default::default()
            })
        };
        let request = RequestKind::Decision(vec![forced(0), forced(1)]);
        let ctx = DecisionContext {
            state: &state,
            side: Player::P1,
            request: &request,
            snapshot: None,
        };

        let choice = HeuristicAgent.choose(&ctx).unwrap();
        assert_eq!(choice.to_string(), "switch 3, switch 4");
    }

    #[test]
    fn test_team_order_defaults_to_identity() {
        let state = BattleState::new();
        let request = RequestKind::TeamPreview {
            team_size: 4,
            max_chosen: None,
        };
        let ctx = DecisionContext {
            state: &state,
            side: Player::P2,
            request: &request,
            snapshot: None,
        };
        assert_eq!(HeuristicAgent.team_order(&ctx), vec![1, 2, 3, 4]);
        assert!(HeuristicAgent.choose(&ctx).is_none());
    }

    #[test]
    fn test_random_agent_stays_legal() {
        let state = BattleState::new();
        let request = RequestKind::Decision(vec![Some(BattleActionSet {
            moves: vec![option(1, Type::Normal, 40)],
            ..Default::default()
        })]);
        let ctx = DecisionContext {
            state: &state,
            side: Player::P1,
            request: &request,
            snapshot: None,
        };
        for _ in 0..10 {
            assert_eq!(RandomAgent.choose(&ctx).unwrap().to_string(), "move 1");
        }
    }
}
