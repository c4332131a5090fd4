//! Link to the external battle simulator
//!
//! A [`Simulator`] opens one battle stream: an input channel taking command
//! lines, an output channel yielding raw output text, and optionally a
//! [`SnapshotControl`] for simulators that can export and import battles.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use duelist_protocol::{BattleRequest, Player};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

pub const DEFAULT_COMMAND: &str = "pokemon-showdown simulate-battle";

const CHANNEL_CAPACITY: usize = 256;

/// Access to the simulator's own battle object
pub trait SnapshotControl: Send + Sync {
    /// Serialize the live battle
    fn export(&self) -> Result<String>;

    /// Replace the live battle with a serialized one
    fn import(&self, serialized: &str) -> Result<()>;

    /// Request the imported battle is waiting on for `side`
    fn pending_request(&self, side: Player) -> Option<BattleRequest>;
}

/// One open battle stream
pub struct SimulatorLink {
    pub input: mpsc::Sender<String>,
    pub output: mpsc::Receiver<String>,
    pub control: Option<Arc<dyn SnapshotControl>>,
}

pub trait Simulator: Send + Sync {
    /// Open a fresh battle stream; must be called inside a tokio runtime
    fn open(&self) -> Result<SimulatorLink>;
}

/// Simulator running as a child process speaking the protocol on stdio
#[derive(Debug, Clone)]
pub struct ProcessSimulator {
    program: String,
    args: Vec<String>,
}

impl ProcessSimulator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace separated command line
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("Empty simulator command");
        };
        Ok(Self::new(program, parts.collect()))
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ProcessSimulator {
    fn default() -> Self {
        let mut parts = DEFAULT_COMMAND.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self::new(program, parts.collect())
    }
}

impl Simulator for ProcessSimulator {
    fn open(&self) -> Result<SimulatorLink> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn simulator '{}'", self.command_line()))?;

        let mut stdin = child.stdin.take().context("Simulator stdin unavailable")?;
        let stdout = child.stdout.take().context("Simulator stdout unavailable")?;

        let (input_tx, mut input_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Writer owns the child so the process lives as long as the input side
        tokio::spawn(async move {
            while let Some(line) = input_rx.recv().await {
                tracing::trace!(line = %line, "To simulator");
                let written = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                };
                if let Err(e) = written.await {
                    tracing::warn!(error = %e, "Simulator stdin closed");
                    break;
                }
            }
            drop(stdin);
            match child.wait().await {
                Ok(status) => tracing::debug!(%status, "Simulator exited"),
                Err(e) => tracing::warn!(error = %e, "Failed to reap simulator"),
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if output_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read simulator output");
                        break;
                    }
                }
            }
        });

        Ok(SimulatorLink {
            input: input_tx,
            output: output_rx,
            control: None,
        })
    }
}
