//! Many independent battles with bounded concurrency

use std::sync::Arc;

use duelist_protocol::Player;
use futures_util::StreamExt;
use futures_util::stream;

use crate::config::SessionConfig;
use crate::coordinator::{BattleSession, BattleSummary, Controller};
use crate::error::SessionError;
use crate::simulator::Simulator;

/// Result of one battle in a batch, in submission order
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub result: Result<BattleSummary, SessionError>,
}

/// Tally of a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub p1_wins: usize,
    pub p2_wins: usize,
    pub ties: usize,
    pub failures: usize,
}

impl BatchStats {
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            match &outcome.result {
                Ok(summary) => match summary.winner {
                    Some(Player::P1) => stats.p1_wins += 1,
                    Some(Player::P2) => stats.p2_wins += 1,
                    None => stats.ties += 1,
                },
                Err(_) => stats.failures += 1,
            }
        }
        stats
    }
}

/// Run every config to completion, at most `concurrency` at a time
///
/// `controllers` picks who plays each side of a battle.
pub async fn run_batch<F>(
    simulator: Arc<dyn Simulator>,
    configs: Vec<SessionConfig>,
    concurrency: usize,
    controllers: F,
) -> Vec<BatchOutcome>
where
    F: Fn(usize, &SessionConfig) -> [Controller; 2],
{
    let jobs = configs.into_iter().enumerate().map(|(index, config)| {
        let [p1, p2] = controllers(index, &config);
        let simulator = Arc::clone(&simulator);
        async move {
            let result = async {
                let session = BattleSession::builder(config)
                    .controller(Player::P1, p1)
                    .controller(Player::P2, p2)
                    .start(simulator.as_ref())
                    .await?;
                session.run_to_end().await
            }
            .await;

            match &result {
                Ok(summary) => tracing::info!(index, winner = ?summary.winner, turns = summary.turns, "Battle finished"),
                Err(e) => tracing::warn!(index, error = %e, "Battle failed"),
            }
            BatchOutcome { index, result }
        }
    });

    let mut outcomes: Vec<BatchOutcome> = stream::iter(jobs)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    outcomes.sort_by_key(|o| o.index);
    outcomes
}
