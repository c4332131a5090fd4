//! Turn-flow coordination for one battle
//!
//! A [`BattleSession`] owns one simulator stream. A single reader task frames
//! the simulator output into blocks, feeds event blocks to the [`Interpreter`]
//! and turns `|request|` payloads into per-side pending decisions. Sides are
//! either driven by an [`Agent`] or left to an external caller, who submits
//! through [`BattleSession::submit`] or one slot at a time through
//! [`BattleSession::choose_slot`].
//!
//! ```text
//!  simulator ──output──▶ reader task ──▶ BattleState (RwLock)
//!      ▲                     │                 │
//!      │                     ├── requests ──▶ agents (spawn_blocking)
//!      └───input◀────────────┴── submissions ◀─┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use duelist_battle::{BattleState, Dex, Interpreter, LogEntry, Phase, RequestKind};
use duelist_protocol::{
    BattleRequest, BlockFramer, BlockKind, Choice, Player, ServerMessage, SimBlock, SimCommand,
    SlotAction, parse_server_message,
};
use duelist_search::{Agent, DecisionContext, HeuristicAgent, RandomAgent};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::checkpoint::Checkpoint;
use crate::config::SessionConfig;
use crate::dedup::BlockDeduper;
use crate::error::SessionError;
use crate::simulator::{Simulator, SnapshotControl};

const EVENT_CAPACITY: usize = 1024;

/// Quiet period after which a partially framed block is processed
const IDLE_FLUSH: Duration = Duration::from_millis(25);

/// Agent that takes over when another agent's task dies
const FALLBACK_AGENT: &str = "heuristic";

/// Who answers a side's requests
#[derive(Clone, Default)]
pub enum Controller {
    /// Decisions are submitted by the caller
    #[default]
    External,
    Agent(Arc<dyn Agent>),
}

impl Controller {
    pub fn agent(agent: impl Agent + 'static) -> Self {
        Controller::Agent(Arc::new(agent))
    }

    fn as_agent(&self) -> Option<&Arc<dyn Agent>> {
        match self {
            Controller::Agent(agent) => Some(agent),
            Controller::External => None,
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Controller::External => f.write_str("External"),
            Controller::Agent(agent) => write!(f, "Agent({})", agent.name()),
        }
    }
}

/// Outcome of waiting for the next state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// State changed; carries the new version
    Updated(u64),
    Ended,
    /// The simulator reported an error since the given version
    Failed(String),
    /// The simulator stream closed before the battle ended
    Closed,
    TimedOut,
}

/// Progress of a slot-by-slot submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotProgress {
    /// Other slots still need an action
    Pending,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleSummary {
    pub winner: Option<Player>,
    pub tie: bool,
    pub turns: u32,
}

#[derive(Debug, Default)]
struct SideSlot {
    /// Decision currently owed to the simulator
    request: Option<RequestKind>,
    /// Most recent decision request, kept to retry after a rejected choice
    last_request: Option<RequestKind>,
    rqid: Option<u64>,
    /// Bumped on every request; stale agent answers compare against it
    seq: u64,
    /// Slot actions collected by `choose_slot`
    partial: Vec<Option<SlotAction>>,
}

/// Clears a side's `submitting` flag when dropped
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum AgentDecision {
    Choice(Choice),
    TeamOrder(Vec<usize>),
    Nothing,
}

/// Lines addressed to one side rather than battle events
fn is_directed(line: &str) -> bool {
    line.starts_with("|request|") || line.starts_with("|error|")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SessionCore {
    config: SessionConfig,
    controllers: [Controller; 2],
    interpreter: Interpreter,
    input: mpsc::Sender<String>,
    control: Option<Arc<dyn SnapshotControl>>,
    state: RwLock<BattleState>,
    sides: [Mutex<SideSlot>; 2],
    submitting: [AtomicBool; 2],
    protocol_log: Mutex<Vec<String>>,
    start_error: Mutex<Option<String>>,
    /// Latest simulator error with the version it was recorded at
    last_error: Mutex<Option<(u64, String)>>,
    closed: AtomicBool,
    version: watch::Sender<u64>,
    events: broadcast::Sender<LogEntry>,
}

impl SessionCore {
    fn read_state(&self) -> RwLockReadGuard<'_, BattleState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, BattleState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn side_slot(&self, side: Player) -> MutexGuard<'_, SideSlot> {
        lock(&self.sides[side.index()])
    }

    fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Publish a state change; never called with a lock held
    fn bump(&self) -> u64 {
        self.version.send_modify(|v| *v += 1);
        self.version()
    }

    async fn send(&self, command: SimCommand) -> Result<(), SessionError> {
        let line = command.to_protocol_string();
        tracing::debug!(command = %line, "Writing to simulator");
        self.input.send(line).await.map_err(|_| SessionError::Closed)
    }

    /// `Some` once `start` can return
    fn start_outcome(&self) -> Option<Result<(), SessionError>> {
        if let Some(message) = lock(&self.start_error).clone() {
            return Some(Err(SessionError::StartRejected(message)));
        }
        if self.read_state().phase != Phase::Setup {
            return Some(Ok(()));
        }
        if self.closed.load(Ordering::Acquire) {
            return Some(Err(SessionError::Closed));
        }
        None
    }

    fn handle_block(self: &Arc<Self>, block: SimBlock, deduper: &mut BlockDeduper) {
        let side_hint = match block.kind {
            BlockKind::End => {
                self.finish(&block.lines);
                self.bump();
                return;
            }
            BlockKind::SideUpdate(side) => Some(side),
            BlockKind::Update | BlockKind::Untagged => None,
        };

        // An echo may come back in either framing; only its events are dropped
        let (directed, events): (Vec<String>, Vec<String>) =
            block.lines.into_iter().partition(|l| is_directed(l));
        let mut lines = if deduper.is_repeat(&events) {
            tracing::debug!(lines = events.len(), "Skipping repeated event block");
            Vec::new()
        } else {
            events
        };
        if lines.is_empty() && directed.is_empty() {
            return;
        }
        lines.extend(directed);
        self.apply_lines(&lines, side_hint);
        self.bump();
    }

    fn apply_lines(self: &Arc<Self>, lines: &[String], side_hint: Option<Player>) {
        let mut events = Vec::new();
        let mut requests = Vec::new();
        let mut errors = Vec::new();

        for line in lines {
            if is_directed(line) {
                match parse_server_message(line) {
                    Ok(ServerMessage::Request(request)) => requests.push(request),
                    Ok(ServerMessage::Error(message)) => errors.push(message),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed request"),
                }
            } else if line.starts_with('|') {
                events.push(line.as_str());
            }
        }

        if !events.is_empty() {
            let entries = {
                let mut state = self.write_state();
                let entries = self.interpreter.process_chunk(&mut state, &events.join("\n"));
                if state.is_over() {
                    state.waiting_for_choice = false;
                    state.available_actions.clear();
                }
                entries
            };
            if self.read_state().is_over() {
                self.clear_pending();
            }
            for entry in entries {
                // No subscribers is fine
                let _ = self.events.send(entry);
            }
        }

        for request in requests {
            self.handle_request(request, side_hint);
        }
        for message in errors {
            self.handle_error(message, side_hint);
        }
    }

    fn handle_request(self: &Arc<Self>, request: BattleRequest, side_hint: Option<Player>) {
        let Some(side) = request.player().or(side_hint) else {
            tracing::warn!("Ignoring request without a side");
            return;
        };

        let dex = self.interpreter.dex();
        let kind = {
            let mut state = self.write_state();
            if state.is_over() {
                return;
            }
            state.sync_from_request(&request, dex);
            let kind = RequestKind::from_request(&request, state.side(side), dex);

            if side == Player::P1 {
                match (&kind, state.phase) {
                    (RequestKind::Wait, _) => {}
                    (RequestKind::TeamPreview { .. }, Phase::Setup) => state.phase = Phase::Preview,
                    (RequestKind::Decision(_), Phase::Setup | Phase::Preview) => {
                        state.phase = Phase::Battle
                    }
                    _ => {}
                }
                state.waiting_for_choice = kind.needs_choice();
                state.available_actions = match &kind {
                    RequestKind::Decision(slots) => slots.clone(),
                    _ => Vec::new(),
                };
            }
            kind
        };

        let seq = {
            let mut slot = self.side_slot(side);
            slot.seq += 1;
            slot.rqid = request.rqid;
            slot.partial.clear();
            if kind.needs_choice() {
                slot.request = Some(kind.clone());
                slot.last_request = Some(kind.clone());
            } else {
                slot.request = None;
            }
            slot.seq
        };

        tracing::debug!(%side, rqid = ?request.rqid, needs_choice = kind.needs_choice(), "Request received");

        if kind.needs_choice()
            && let Some(agent) = self.controllers[side.index()].as_agent()
        {
            self.schedule_decision(side, Arc::clone(agent), seq);
        }
    }

    fn handle_error(self: &Arc<Self>, message: String, side_hint: Option<Player>) {
        tracing::warn!(side = ?side_hint, error = %message, "Simulator error");
        let version = self.version() + 1;
        *lock(&self.last_error) = Some((version, message.clone()));
        lock(&self.start_error).get_or_insert(message);

        // A rejected choice leaves the side owing a decision again
        let Some(side) = side_hint else {
            return;
        };
        let retry = {
            let mut slot = self.side_slot(side);
            if slot.request.is_none() && slot.last_request.is_some() {
                slot.request = slot.last_request.clone();
                slot.partial.clear();
                slot.seq += 1;
                Some(slot.seq)
            } else {
                None
            }
        };
        if let Some(seq) = retry
            && self.controllers[side.index()].as_agent().is_some()
        {
            tracing::info!(%side, "Retrying rejected choice with a random legal action");
            self.schedule_decision(side, Arc::new(RandomAgent), seq);
        }
    }

    /// Handle the simulator's `end` block
    fn finish(&self, lines: &[String]) {
        let winner_name = lines
            .iter()
            .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
            .find_map(|v| v.get("winner").and_then(|w| w.as_str()).map(str::to_string));

        {
            let mut state = self.write_state();
            if !state.is_over() {
                let winner = winner_name.as_deref().and_then(|name| state.side_by_name(name));
                state.winner = winner;
                state.tie = winner.is_none();
                state.phase = Phase::Ended;
            }
            state.waiting_for_choice = false;
            state.available_actions.clear();
        }
        self.clear_pending();
        tracing::info!(winner = ?winner_name, "Battle ended");
    }

    fn clear_pending(&self) {
        for side in Player::BOTH {
            let mut slot = self.side_slot(side);
            slot.request = None;
            slot.last_request = None;
            slot.partial.clear();
        }
    }

    fn schedule_decision(self: &Arc<Self>, side: Player, agent: Arc<dyn Agent>, seq: u64) {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            let delay = core.config.think_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let request = {
                let slot = core.side_slot(side);
                match &slot.request {
                    Some(request) if slot.seq == seq => request.clone(),
                    _ => return,
                }
            };
            let agent_name = agent.name().to_string();
            let state = core.read_state().clone();
            let snapshot = core.control.as_ref().and_then(|control| {
                control
                    .export()
                    .inspect_err(|e| tracing::debug!(error = %e, "Snapshot export failed"))
                    .ok()
            });

            let decided = tokio::task::spawn_blocking(move || {
                let ctx = DecisionContext {
                    state: &state,
                    side,
                    request: &request,
                    snapshot: snapshot.as_deref(),
                };
                match &request {
                    RequestKind::TeamPreview { .. } => AgentDecision::TeamOrder(agent.team_order(&ctx)),
                    _ => agent
                        .choose(&ctx)
                        .map_or(AgentDecision::Nothing, AgentDecision::Choice),
                }
            })
            .await;

            let submitted = match decided {
                Ok(AgentDecision::Choice(choice)) => core.submit_choice(side, choice, Some(seq)).await,
                Ok(AgentDecision::TeamOrder(order)) => core.submit_order(side, order, Some(seq)).await,
                Ok(AgentDecision::Nothing) => {
                    tracing::warn!(%side, "Agent produced no decision");
                    return;
                }
                Err(e) => {
                    tracing::error!(%side, agent = %agent_name, error = %e, "Agent task failed");
                    if agent_name != FALLBACK_AGENT {
                        tracing::info!(%side, "Retrying with the heuristic agent");
                        core.schedule_decision(side, Arc::new(HeuristicAgent::new()), seq);
                    }
                    return;
                }
            };
            if let Err(e) = submitted {
                tracing::warn!(%side, error = %e, "Agent submission failed");
            }
        });
    }

    /// Take the pending request out if it matches `expected`
    fn take_request(
        &self,
        side: Player,
        expected_seq: Option<u64>,
        matches: impl Fn(&RequestKind) -> bool,
    ) -> Result<Option<RequestKind>, SessionError> {
        let mut slot = self.side_slot(side);
        if let Some(seq) = expected_seq
            && seq != slot.seq
        {
            tracing::debug!(%side, "Dropping answer to a superseded request");
            return Ok(None);
        }
        match slot.request.take() {
            Some(request) if matches(&request) => {
                slot.partial.clear();
                Ok(Some(request))
            }
            other => {
                slot.request = other;
                Err(SessionError::NoPendingDecision(side))
            }
        }
    }

    async fn submit_choice(
        &self,
        side: Player,
        choice: Choice,
        expected_seq: Option<u64>,
    ) -> Result<(), SessionError> {
        let _guard = SubmitGuard::acquire(&self.submitting[side.index()])
            .ok_or(SessionError::SubmissionInProgress(side))?;

        let Some(request) =
            self.take_request(side, expected_seq, |r| matches!(r, RequestKind::Decision(_)))?
        else {
            return Ok(());
        };
        let acting: Vec<bool> = match &request {
            RequestKind::Decision(slots) => slots.iter().map(Option::is_some).collect(),
            _ => Vec::new(),
        };
        let choice = choice.spread(&acting);

        {
            let mut state = self.write_state();
            if choice.uses_tera() {
                state.side_mut(side).mark_terastallized();
            }
            if side == Player::P1 {
                state.waiting_for_choice = false;
                state.available_actions.clear();
            }
        }

        tracing::info!(%side, choice = %choice, "Submitting choice");
        self.send(SimCommand::Choose { side, choice }).await?;
        self.bump();
        Ok(())
    }

    async fn submit_order(
        &self,
        side: Player,
        order: Vec<usize>,
        expected_seq: Option<u64>,
    ) -> Result<(), SessionError> {
        let _guard = SubmitGuard::acquire(&self.submitting[side.index()])
            .ok_or(SessionError::SubmissionInProgress(side))?;

        let Some(request) = self.take_request(side, expected_seq, |r| {
            matches!(r, RequestKind::TeamPreview { .. })
        })?
        else {
            return Ok(());
        };
        if let RequestKind::TeamPreview { team_size, .. } = request
            && let Some(&bad) = order.iter().find(|&&i| i == 0 || i > team_size)
        {
            self.side_slot(side).request = Some(request);
            return Err(SessionError::InvalidSlot { side, slot: bad });
        }

        if side == Player::P1 {
            self.write_state().waiting_for_choice = false;
        }

        tracing::info!(%side, ?order, "Submitting team order");
        self.send(SimCommand::TeamOrder { side, order }).await?;
        self.bump();
        Ok(())
    }
}

async fn read_loop(core: Arc<SessionCore>, mut output: mpsc::Receiver<String>) {
    let mut framer = BlockFramer::new();
    let mut deduper = BlockDeduper::new();

    loop {
        let received = if framer.is_idle() {
            output.recv().await
        } else {
            match tokio::time::timeout(IDLE_FLUSH, output.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    if let Some(block) = framer.flush() {
                        core.handle_block(block, &mut deduper);
                    }
                    continue;
                }
            }
        };
        let Some(chunk) = received else {
            break;
        };

        for line in chunk.split('\n') {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                lock(&core.protocol_log).push(line.to_string());
            }
            if let Some(block) = framer.push_line(line) {
                core.handle_block(block, &mut deduper);
            }
        }
    }

    if let Some(block) = framer.flush() {
        core.handle_block(block, &mut deduper);
    }
    core.closed.store(true, Ordering::Release);
    if !core.read_state().is_over() {
        tracing::warn!("Simulator stream closed before the battle ended");
    }
    core.bump();
}

/// Builds a [`BattleSession`] by starting or resuming a battle
#[derive(Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    controllers: [Controller; 2],
    dex: Option<Arc<dyn Dex>>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn controller(mut self, side: Player, controller: Controller) -> Self {
        self.controllers[side.index()] = controller;
        self
    }

    pub fn dex(mut self, dex: Arc<dyn Dex>) -> Self {
        self.dex = Some(dex);
        self
    }

    fn launch(
        self,
        simulator: &dyn Simulator,
        state: BattleState,
        protocol_log: Vec<String>,
    ) -> Result<BattleSession, SessionError> {
        let link = simulator.open().map_err(SessionError::Simulator)?;
        let interpreter = match self.dex {
            Some(dex) => Interpreter::new().with_dex(dex),
            None => Interpreter::new(),
        };
        let (version, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let core = Arc::new(SessionCore {
            config: self.config,
            controllers: self.controllers,
            interpreter,
            input: link.input,
            control: link.control,
            state: RwLock::new(state),
            sides: Default::default(),
            submitting: Default::default(),
            protocol_log: Mutex::new(protocol_log),
            start_error: Mutex::new(None),
            last_error: Mutex::new(None),
            closed: AtomicBool::new(false),
            version,
            events,
        });
        let reader = tokio::spawn(read_loop(Arc::clone(&core), link.output));
        Ok(BattleSession { core, reader })
    }

    /// Open the simulator, send the setup commands and wait for the first request
    pub async fn start(self, simulator: &dyn Simulator) -> Result<BattleSession, SessionError> {
        let session = self.launch(simulator, BattleState::new(), Vec::new())?;
        let core = Arc::clone(&session.core);

        core.send(SimCommand::Start {
            format_id: core.config.format_id.clone(),
        })
        .await?;
        for side in Player::BOTH {
            let player = core.config.player(side);
            core.send(SimCommand::Player {
                side,
                name: player.name.clone(),
                team: player.team.clone(),
            })
            .await?;
        }

        let timeout = core.config.start_timeout();
        let mut changes = core.version.subscribe();
        let started = async {
            loop {
                changes.borrow_and_update();
                if let Some(outcome) = core.start_outcome() {
                    return outcome;
                }
                if changes.changed().await.is_err() {
                    return Err(SessionError::Closed);
                }
            }
        };

        match tokio::time::timeout(timeout, started).await {
            Ok(Ok(())) => {
                tracing::info!(format = %core.config.format_id, "Battle started");
                Ok(session)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::StartTimeout(timeout)),
        }
    }

    /// Reopen the simulator from a checkpoint
    ///
    /// The checkpoint's configuration and difficulty replace the builder's.
    pub async fn resume(
        mut self,
        checkpoint: Checkpoint,
        simulator: &dyn Simulator,
    ) -> Result<BattleSession, SessionError> {
        self.config = checkpoint.config.clone();
        self.config.difficulty = checkpoint.ai_difficulty;

        let waiting_actions = checkpoint
            .battle_state
            .waiting_for_choice
            .then(|| checkpoint.battle_state.available_actions.clone());

        let session = self.launch(simulator, checkpoint.battle_state, checkpoint.protocol_log)?;
        let core = Arc::clone(&session.core);
        let control = core.control.clone().ok_or(SessionError::SnapshotUnsupported)?;
        control
            .import(&checkpoint.serialized_battle)
            .map_err(SessionError::Snapshot)?;

        for side in Player::BOTH {
            match control.pending_request(side) {
                Some(request) => core.handle_request(request, Some(side)),
                None if side == Player::P1 => {
                    if let Some(actions) = waiting_actions.clone().filter(|a| !a.is_empty()) {
                        let kind = RequestKind::Decision(actions);
                        let mut slot = core.side_slot(side);
                        slot.seq += 1;
                        slot.request = Some(kind.clone());
                        slot.last_request = Some(kind);
                    }
                }
                None => {}
            }
        }
        core.bump();

        tracing::info!(turn = core.read_state().turn, "Battle resumed from checkpoint");
        Ok(session)
    }
}

/// A running battle against one simulator stream
pub struct BattleSession {
    core: Arc<SessionCore>,
    reader: JoinHandle<()>,
}

impl BattleSession {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    /// Copy of the tracked state
    pub fn state(&self) -> BattleState {
        self.core.read_state().clone()
    }

    pub fn phase(&self) -> Phase {
        self.core.read_state().phase
    }

    /// Monotonic counter bumped on every state change
    pub fn version(&self) -> u64 {
        self.core.version()
    }

    /// Decision currently owed by `side`
    pub fn pending(&self, side: Player) -> Option<RequestKind> {
        self.core.side_slot(side).request.clone()
    }

    /// Request id of the latest request for `side`
    pub fn rqid(&self, side: Player) -> Option<u64> {
        self.core.side_slot(side).rqid
    }

    /// Log entries as they are interpreted
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.core.events.subscribe()
    }

    /// First error reported by the simulator, kept for the rest of the session
    pub fn start_error(&self) -> Option<String> {
        lock(&self.core.start_error).clone()
    }

    /// Raw simulator output lines received so far
    pub fn protocol_log(&self) -> Vec<String> {
        lock(&self.core.protocol_log).clone()
    }

    pub async fn submit(&self, side: Player, choice: Choice) -> Result<(), SessionError> {
        self.core.submit_choice(side, choice, None).await
    }

    pub async fn submit_team_order(&self, side: Player, order: Vec<usize>) -> Result<(), SessionError> {
        self.core.submit_order(side, order, None).await
    }

    /// Set the action of one active slot; the choice is sent once every slot
    /// that owes an action has one, with `pass` for the rest
    pub async fn choose_slot(
        &self,
        side: Player,
        slot: usize,
        action: SlotAction,
    ) -> Result<SlotProgress, SessionError> {
        let choice = {
            let mut guard = self.core.side_slot(side);
            let pending = &mut *guard;
            let Some(RequestKind::Decision(sets)) = &pending.request else {
                return Err(SessionError::NoPendingDecision(side));
            };
            if sets.get(slot).is_none_or(Option::is_none) {
                return Err(SessionError::InvalidSlot { side, slot });
            }
            if pending.partial.len() != sets.len() {
                pending.partial = vec![None; sets.len()];
            }
            pending.partial[slot] = Some(action);

            let complete = sets
                .iter()
                .zip(&pending.partial)
                .all(|(set, picked)| set.is_none() || picked.is_some());
            if !complete {
                return Ok(SlotProgress::Pending);
            }
            Choice::new(
                pending
                    .partial
                    .drain(..)
                    .map(|picked| picked.unwrap_or(SlotAction::Pass))
                    .collect(),
            )
        };

        self.core.submit_choice(side, choice, None).await?;
        Ok(SlotProgress::Submitted)
    }

    /// Wait for any state change after version `since`, up to the configured update timeout
    pub async fn wait_for_update(&self, since: u64) -> UpdateStatus {
        self.wait_for_update_within(since, self.core.config.update_timeout())
            .await
    }

    pub async fn wait_for_update_within(&self, since: u64, timeout: Duration) -> UpdateStatus {
        let core = &self.core;
        let mut changes = core.version.subscribe();
        let waited = async {
            loop {
                let current = *changes.borrow_and_update();
                if core.read_state().is_over() {
                    return UpdateStatus::Ended;
                }
                if current > since {
                    if let Some((at, message)) = lock(&core.last_error).clone()
                        && at > since
                    {
                        return UpdateStatus::Failed(message);
                    }
                    return UpdateStatus::Updated(current);
                }
                if core.closed.load(Ordering::Acquire) {
                    return UpdateStatus::Closed;
                }
                if changes.changed().await.is_err() {
                    return UpdateStatus::Closed;
                }
            }
        };
        tokio::time::timeout(timeout, waited)
            .await
            .unwrap_or(UpdateStatus::TimedOut)
    }

    /// Save the battle; only possible while side A owes a choice mid-battle
    pub fn checkpoint(&self) -> Result<Checkpoint, SessionError> {
        let control = self
            .core
            .control
            .as_ref()
            .ok_or(SessionError::SnapshotUnsupported)?;
        let state = self.state();
        if !state.can_checkpoint() {
            return Err(SessionError::CheckpointUnavailable(
                "side p1 is not waiting for a choice in battle",
            ));
        }
        let serialized = control.export().map_err(SessionError::Snapshot)?;
        Ok(Checkpoint::new(
            serialized,
            state,
            self.protocol_log(),
            self.core.config.clone(),
        ))
    }

    pub fn summary(&self) -> BattleSummary {
        let state = self.core.read_state();
        BattleSummary {
            winner: state.winner,
            tie: state.tie,
            turns: state.turn,
        }
    }

    /// Follow the battle until it ends
    ///
    /// Simulator errors are logged and waited out; a quiet period longer than
    /// the update timeout fails with [`SessionError::Stalled`].
    pub async fn run_to_end(&self) -> Result<BattleSummary, SessionError> {
        let mut seen = self.version();
        loop {
            match self.wait_for_update(seen).await {
                UpdateStatus::Updated(version) => seen = version,
                UpdateStatus::Failed(message) => {
                    tracing::debug!(error = %message, "Continuing after simulator error");
                    seen = self.version();
                }
                UpdateStatus::Ended => return Ok(self.summary()),
                UpdateStatus::Closed => return Err(SessionError::Closed),
                UpdateStatus::TimedOut => {
                    return Err(SessionError::Stalled(self.core.config.update_timeout()));
                }
            }
        }
    }
}

impl Drop for BattleSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
