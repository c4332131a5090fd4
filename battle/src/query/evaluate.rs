//! Static position evaluation
//!
//! A weighted sum of side-level differentials plus an active matchup term,
//! squashed into `[-1, 1]`. Positive values favor the requested perspective.

use std::sync::Arc;

use duelist_protocol::Player;

use super::matchup::best_attack;
use crate::dex::{Dex, MoveCategory};
use crate::tracking::BattleState;
use crate::types::{BattlePokemon, BattleSide, StatStages, Status, Type};

/// Scores a position from one side's point of view
pub trait Evaluate: Send + Sync {
    /// Score in `[-1, 1]`, positive when `perspective` is ahead
    fn evaluate(&self, state: &BattleState, perspective: Player) -> f64;
}

impl<F> Evaluate for F
where
    F: Fn(&BattleState, Player) -> f64 + Send + Sync,
{
    fn evaluate(&self, state: &BattleState, perspective: Player) -> f64 {
        self(state, perspective)
    }
}

/// Feature weights for [`PositionEvaluator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub hp: f64,
    pub alive: f64,
    pub fast: f64,
    pub hazard: f64,
    pub screen: f64,
    pub status: f64,
    pub matchup: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            hp: 1.5,
            alive: 1.0,
            fast: 0.2,
            hazard: 0.4,
            screen: 0.3,
            status: 0.3,
            matchup: 0.6,
        }
    }
}

/// Divisor applied before `tanh`
const SCALE: f64 = 4.0;

/// Default speed at which a pokemon counts as fast
pub const FAST_THRESHOLD: u32 = 250;

#[derive(Clone)]
pub struct PositionEvaluator {
    pub weights: Weights,
    pub fast_threshold: u32,
    dex: Option<Arc<dyn Dex>>,
}

impl std::fmt::Debug for PositionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionEvaluator")
            .field("weights", &self.weights)
            .field("fast_threshold", &self.fast_threshold)
            .field("dex", &self.dex.is_some())
            .finish()
    }
}

impl PositionEvaluator {
    pub fn new() -> Self {
        Self {
            weights: Weights::default(),
            fast_threshold: FAST_THRESHOLD,
            dex: None,
        }
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// Use move metadata for coverage and STAB instead of the attacker's own types
    pub fn with_dex(mut self, dex: Arc<dyn Dex>) -> Self {
        self.dex = Some(dex);
        self
    }

    /// Weighted sum before squashing
    pub fn raw_score(&self, state: &BattleState, perspective: Player) -> f64 {
        let me = state.side(perspective);
        let them = state.side(perspective.opponent());
        let w = &self.weights;

        let hp = hp_total(me) - hp_total(them);
        let alive = me.remaining() as f64 - them.remaining() as f64;
        let fast = self.fast_count(me) - self.fast_count(them);
        let hazard = hazard_score(them) - hazard_score(me);
        let screen = screen_score(me) - screen_score(them);
        let status = status_burden(them) - status_burden(me);
        let matchup = self.matchup(state, me, them);

        w.hp * hp
            + w.alive * alive
            + w.fast * fast
            + w.hazard * hazard
            + w.screen * screen
            + w.status * status
            + w.matchup * matchup
    }

    fn fast_count(&self, side: &BattleSide) -> f64 {
        side.team
            .iter()
            .filter(|p| p.is_alive())
            .filter(|p| estimated_speed(p).is_some_and(|s| s >= self.fast_threshold as f64))
            .count() as f64
    }

    /// Active matchup, averaged over every alive attacker/defender pair
    fn matchup(&self, state: &BattleState, me: &BattleSide, them: &BattleSide) -> f64 {
        let mut total = 0.0;
        let mut pairs = 0;
        for mine in me.active_alive() {
            for theirs in them.active_alive() {
                total += self.pair_matchup(state, (me, mine), (them, theirs));
                pairs += 1;
            }
        }
        if pairs == 0 { 0.0 } else { total / pairs as f64 }
    }

    fn pair_matchup(
        &self,
        state: &BattleState,
        (my_side, mine): (&BattleSide, &BattlePokemon),
        (their_side, theirs): (&BattleSide, &BattlePokemon),
    ) -> f64 {
        let (my_attack, my_stab) = self.offense(mine, theirs);
        let (their_attack, their_stab) = self.offense(theirs, mine);
        let coverage = my_attack - their_attack;
        let stab = f64::from(u8::from(my_stab)) - f64::from(u8::from(their_stab));

        let speed = match (
            effective_speed(mine, my_side),
            effective_speed(theirs, their_side),
        ) {
            (Some(a), Some(b)) if a != b => {
                let faster = if state.field.trick_room() { a < b } else { a > b };
                if faster { 1.0 } else { -1.0 }
            }
            _ => 0.0,
        };

        let boosts = (mine.boosts.net() - theirs.boosts.net()) as f64;
        let substitute = f64::from(u8::from(mine.has_volatile("substitute")))
            - f64::from(u8::from(theirs.has_volatile("substitute")));

        0.5 * coverage + 0.3 * stab + 0.5 * speed + 0.1 * boosts + 0.5 * substitute
    }

    /// Best log2 effectiveness against the defender and whether that attack gets STAB
    fn offense(&self, attacker: &BattlePokemon, defender: &BattlePokemon) -> (f64, bool) {
        let own_types = attacker.effective_types();
        let defender_types = defender.effective_types();

        let move_types: Vec<Type> = self
            .dex
            .as_deref()
            .map(|dex| {
                attacker
                    .moves
                    .iter()
                    .filter_map(|m| dex.move_data(&m.id))
                    .filter(|d| d.category != MoveCategory::Status)
                    .map(|d| d.move_type)
                    .collect()
            })
            .unwrap_or_default();

        let attacking = if move_types.is_empty() {
            &own_types
        } else {
            &move_types
        };
        match best_attack(attacking, &defender_types) {
            Some((best, score)) => (score, own_types.contains(&best)),
            None => (0.0, false),
        }
    }
}

impl Default for PositionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluate for PositionEvaluator {
    fn evaluate(&self, state: &BattleState, perspective: Player) -> f64 {
        if state.is_over() {
            return state.outcome(perspective);
        }
        (self.raw_score(state, perspective) / SCALE).tanh()
    }
}

/// Sum of HP fractions, counting unrevealed members as full
fn hp_total(side: &BattleSide) -> f64 {
    let unseen = side.team_size.unwrap_or(0).saturating_sub(side.team.len());
    side.team
        .iter()
        .filter(|p| p.is_alive())
        .map(BattlePokemon::hp_fraction)
        .sum::<f64>()
        + unseen as f64
}

/// Entry hazards laid on this side
fn hazard_score(side: &BattleSide) -> f64 {
    side.hazards()
        .map(|(id, layers)| match id {
            "stealthrock" | "gmaxsteelsurge" => 1.0,
            "stickyweb" => 0.75,
            _ => 0.5 * layers as f64,
        })
        .sum()
}

fn screen_score(side: &BattleSide) -> f64 {
    side.screen_count() as f64 + if side.has_condition("tailwind") { 1.0 } else { 0.0 }
}

fn status_burden(side: &BattleSide) -> f64 {
    side.team
        .iter()
        .filter(|p| p.is_alive())
        .filter_map(|p| p.status.as_ref())
        .map(Status::severity)
        .sum()
}

/// Exact speed when known, otherwise an estimate from base speed
/// (31 IVs, no investment, neutral nature)
pub fn estimated_speed(poke: &BattlePokemon) -> Option<f64> {
    if let Some(stats) = poke.stats {
        return Some(stats.spe as f64);
    }
    let base = poke.base_speed? as f64;
    Some(((2.0 * base + 31.0) * poke.level as f64 / 100.0).floor() + 5.0)
}

/// Speed after boosts, paralysis and tailwind
pub fn effective_speed(poke: &BattlePokemon, side: &BattleSide) -> Option<f64> {
    let mut speed = estimated_speed(poke)? * StatStages::multiplier(poke.boosts.spe) as f64;
    if poke.status == Some(Status::Paralysis) {
        speed *= 0.5;
    }
    if side.has_condition("tailwind") {
        speed *= 2.0;
    }
    Some(speed)
}
