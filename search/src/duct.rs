//! Decoupled UCT search
//!
//! Both sides choose simultaneously, so each keeps its own action statistics at
//! the root and selects with UCB1 independently of the other. Every iteration
//! restores a fresh copy of the battle from the snapshot, plays one joint action
//! chosen by the two tables, finishes with a short random rollout and backs the
//! leaf value into both tables (negated for the opponent).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use duelist_battle::Evaluate;
use duelist_protocol::Player;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::engine::{BattleEngine, SimBattle, terminal_value};
use crate::error::SearchError;

/// How the final root action is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalSelection {
    /// Highest visit count; ties go to the first observed action
    #[default]
    MostVisited,
    /// Highest average value among visited actions
    BestAverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuctConfig {
    pub max_iterations: u32,
    pub max_time: Duration,
    /// Random joint turns played after the selected pair
    pub rollout_depth: u32,
    /// UCB1 exploration constant
    pub exploration: f64,
    /// Fixed RNG seed for reproducible rollouts
    pub seed: Option<u64>,
    pub final_selection: FinalSelection,
}

impl Default for DuctConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_time: Duration::from_millis(2000),
            rollout_depth: 4,
            exploration: std::f64::consts::SQRT_2,
            seed: None,
            final_selection: FinalSelection::MostVisited,
        }
    }
}

/// Visit statistics for one action of one player
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionStats {
    pub visits: u32,
    /// Sum of values from this player's own point of view
    pub total_value: f64,
}

impl ActionStats {
    pub fn average(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_value / self.visits as f64
        }
    }

    fn ucb(&self, parent_visits: u32, exploration: f64) -> f64 {
        let explore = ((parent_visits as f64 + 1.0).ln() / (self.visits as f64 + 1.0)).sqrt();
        self.average() + exploration * explore
    }
}

/// Per-player action statistics in first-observed order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionTable {
    entries: Vec<(String, ActionStats)>,
}

impl ActionTable {
    /// Add stats for any action not seen before
    pub fn observe(&mut self, actions: &[String]) {
        for action in actions {
            if !self.entries.iter().any(|(a, _)| a == action) {
                self.entries.push((action.clone(), ActionStats::default()));
            }
        }
    }

    pub fn get(&self, action: &str) -> Option<&ActionStats> {
        self.entries
            .iter()
            .find(|(a, _)| a == action)
            .map(|(_, stats)| stats)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionStats)> {
        self.entries.iter().map(|(a, s)| (a.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// UCB1 over the currently legal actions; unvisited actions come first
    fn select(&self, legal: &[String], parent_visits: u32, exploration: f64) -> Option<&str> {
        let candidates = || {
            self.entries
                .iter()
                .filter(|(action, _)| legal.contains(action))
        };

        if let Some((action, _)) = candidates().find(|(_, s)| s.visits == 0) {
            return Some(action.as_str());
        }

        let mut best: Option<(&str, f64)> = None;
        for (action, stats) in candidates() {
            let score = stats.ucb(parent_visits, exploration);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((action.as_str(), score));
            }
        }
        best.map(|(action, _)| action)
    }

    fn update(&mut self, action: &str, value: f64) {
        if let Some((_, stats)) = self.entries.iter_mut().find(|(a, _)| a == action) {
            stats.visits += 1;
            stats.total_value += value;
        }
    }
}

/// Root of one decision's search tree
#[derive(Debug, Clone, Default)]
pub struct DuctNode {
    pub visits: u32,
    pub total_value: f64,
    /// Indexed by [`Player::index`]
    pub players: [ActionTable; 2],
    /// Joint action counts, kept for diagnostics
    pub joint: HashMap<(String, String), u32>,
}

impl DuctNode {
    fn record(&mut self, picks: &[Option<String>; 2], perspective: Player, value: f64) {
        for side in Player::BOTH {
            if let Some(action) = &picks[side.index()] {
                let signed = if side == perspective { value } else { -value };
                self.players[side.index()].update(action, signed);
            }
        }
        if picks.iter().any(Option::is_some) {
            let key = (
                picks[0].clone().unwrap_or_default(),
                picks[1].clone().unwrap_or_default(),
            );
            *self.joint.entry(key).or_default() += 1;
        }
        self.visits += 1;
        self.total_value += value;
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Chosen root action; `None` when the root has nothing to choose
    pub action: Option<String>,
    pub iterations: u32,
    /// `(average + 1) / 2 * 100` of the chosen action
    pub win_probability: f64,
    /// Mean backed-up value over all iterations
    pub value: f64,
    /// Root statistics for the searching side, in first-observed order
    pub stats: Vec<(String, ActionStats)>,
    pub joint: HashMap<(String, String), u32>,
    pub elapsed: Duration,
}

/// One DUCT search over an engine's battles
pub struct DuctSearch<'a, E: BattleEngine, V: Evaluate + ?Sized> {
    engine: &'a E,
    evaluator: &'a V,
    config: DuctConfig,
}

impl<'a, E: BattleEngine, V: Evaluate + ?Sized> DuctSearch<'a, E, V> {
    pub fn new(engine: &'a E, evaluator: &'a V, config: DuctConfig) -> Self {
        Self {
            engine,
            evaluator,
            config,
        }
    }

    pub fn config(&self) -> &DuctConfig {
        &self.config
    }

    /// Search from `snapshot` for the best choice of `perspective`
    pub fn search(&self, snapshot: &str, perspective: Player) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let root = self
            .engine
            .deserialize(snapshot)
            .map_err(SearchError::Snapshot)?;

        let root_choices = root.legal_choices(perspective);
        if root_choices.is_empty() && !root.is_over() {
            return Err(SearchError::NoLegalChoices(perspective));
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut node = DuctNode::default();
        node.players[perspective.index()].observe(&root_choices);

        let mut iterations = 0;
        while iterations < self.config.max_iterations && started.elapsed() < self.config.max_time {
            self.iterate(snapshot, perspective, &mut node, &mut rng);
            iterations += 1;
        }

        let table = &node.players[perspective.index()];
        let action = self
            .pick_final(table, &root_choices)
            .or_else(|| root_choices.first().cloned());
        let chosen_average = action
            .as_deref()
            .and_then(|a| table.get(a))
            .filter(|s| s.visits > 0)
            .map(ActionStats::average);

        let result = SearchResult {
            win_probability: chosen_average.map_or(50.0, |avg| (avg + 1.0) / 2.0 * 100.0),
            value: if node.visits == 0 {
                0.0
            } else {
                node.total_value / node.visits as f64
            },
            stats: table.entries.clone(),
            joint: node.joint,
            elapsed: started.elapsed(),
            action,
            iterations,
        };

        tracing::debug!(
            side = %perspective,
            iterations = result.iterations,
            elapsed_ms = result.elapsed.as_millis() as u64,
            action = result.action.as_deref().unwrap_or("-"),
            win_probability = result.win_probability,
            "Search finished"
        );
        Ok(result)
    }

    fn iterate(&self, snapshot: &str, perspective: Player, node: &mut DuctNode, rng: &mut StdRng) {
        let mut battle = match self.engine.deserialize(snapshot) {
            Ok(battle) => battle,
            Err(e) => {
                tracing::trace!(error = %e, "Snapshot restore failed during iteration");
                node.record(&[None, None], perspective, 0.0);
                return;
            }
        };

        if battle.is_over() {
            let value = terminal_value(battle.winner(), perspective);
            node.record(&[None, None], perspective, value);
            return;
        }

        let mut picks: [Option<String>; 2] = [None, None];
        for side in Player::BOTH {
            let legal = battle.legal_choices(side);
            let table = &mut node.players[side.index()];
            table.observe(&legal);
            picks[side.index()] = table
                .select(&legal, node.visits, self.config.exploration)
                .map(str::to_string);
        }

        let applied = battle.apply(
            picks[0].as_deref().unwrap_or_default(),
            picks[1].as_deref().unwrap_or_default(),
        );
        let value = match applied {
            Ok(()) => {
                self.rollout(&mut battle, rng);
                self.leaf_value(&battle, perspective)
            }
            Err(e) => {
                tracing::trace!(error = %e, ?picks, "Joint action rejected");
                0.0
            }
        };

        node.record(&picks, perspective, value);
    }

    fn rollout(&self, battle: &mut E::Battle, rng: &mut StdRng) {
        for _ in 0..self.config.rollout_depth {
            if battle.is_over() {
                return;
            }
            let p1 = battle.legal_choices(Player::P1);
            let p2 = battle.legal_choices(Player::P2);
            if p1.is_empty() && p2.is_empty() {
                return;
            }
            let a = p1.choose(rng).map(String::as_str).unwrap_or_default();
            let b = p2.choose(rng).map(String::as_str).unwrap_or_default();
            if battle.apply(a, b).is_err() {
                return;
            }
        }
    }

    fn leaf_value(&self, battle: &E::Battle, perspective: Player) -> f64 {
        if battle.is_over() {
            terminal_value(battle.winner(), perspective)
        } else {
            self.evaluator.evaluate(&battle.observe(), perspective)
        }
    }

    fn pick_final(&self, table: &ActionTable, legal: &[String]) -> Option<String> {
        let visited = table
            .entries
            .iter()
            .filter(|(a, s)| s.visits > 0 && legal.contains(a));

        let mut best: Option<(&String, &ActionStats)> = None;
        for (action, stats) in visited {
            let better = match (best, self.config.final_selection) {
                (None, _) => true,
                (Some((_, top)), FinalSelection::MostVisited) => stats.visits > top.visits,
                (Some((_, top)), FinalSelection::BestAverage) => stats.average() > top.average(),
            };
            if better {
                best = Some((action, stats));
            }
        }
        best.map(|(action, _)| action.clone())
    }
}
