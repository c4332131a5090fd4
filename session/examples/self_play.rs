//! Self-play against a local simulator
//!
//! Runs a handful of heuristic-vs-random battles through `pokemon-showdown
//! simulate-battle` (or `DUELIST_SIMULATOR`) and prints the tally. An optional
//! first argument points at a TOML session config.
//!
//! ```text
//! RUST_LOG=duelist_session=debug cargo run --example self_play -- battle.toml
//! ```

use std::sync::Arc;

use anyhow::Result;
use duelist_search::{HeuristicAgent, RandomAgent};
use duelist_session::{
    BatchStats, Controller, ProcessSimulator, SessionConfig, logging, run_batch,
};

const BATTLES: usize = 4;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::from_env()?,
    };
    let simulator = match config.simulator.as_deref() {
        Some(command) => ProcessSimulator::from_command_line(command)?,
        None => ProcessSimulator::default(),
    };
    tracing::info!(simulator = %simulator.command_line(), format = %config.format_id, "Starting self-play");

    let outcomes = run_batch(Arc::new(simulator), vec![config; BATTLES], 2, |_, _| {
        [
            Controller::agent(HeuristicAgent::new()),
            Controller::agent(RandomAgent),
        ]
    })
    .await;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "battle {}: winner {:?} after {} turns",
                outcome.index, summary.winner, summary.turns
            ),
            Err(e) => println!("battle {}: failed: {e}", outcome.index),
        }
    }

    let stats = BatchStats::from_outcomes(&outcomes);
    println!(
        "heuristic {} / random {} / ties {} / failures {}",
        stats.p1_wins, stats.p2_wins, stats.ties, stats.failures
    );
    Ok(())
}
