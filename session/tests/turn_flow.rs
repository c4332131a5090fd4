use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use duelist_battle::{LogKind, Phase, RequestKind};
use duelist_protocol::{BattleRequest, Choice, Player, SlotAction};
use duelist_search::{Agent, DecisionContext, HeuristicAgent};
use duelist_session::{
    BatchStats, BattleSession, Checkpoint, Controller, SessionConfig, SessionError, Simulator,
    SimulatorLink, SlotProgress, SnapshotControl, UpdateStatus, run_batch,
};
use tokio::sync::mpsc;

/// Behaviour switches for the scripted simulator
#[derive(Debug, Clone, Copy, Default)]
struct Script {
    reject_start: bool,
    silent: bool,
    echo_updates: bool,
    /// Repeat every update block to p1 as a `sideupdate`
    echo_to_side: bool,
    snapshots: bool,
    malformed_request: bool,
}

/// Garchomp (Earthquake, 40 damage) against Heatran (Magma Storm, 20 damage).
/// Garchomp always moves first, so p1 wins at the end of turn 3.
#[derive(Debug)]
struct ScriptedBattle {
    script: Script,
    players: usize,
    hp: [i32; 2],
    turn: u32,
    rqid: u64,
    choices: [Option<String>; 2],
    over: bool,
}

impl ScriptedBattle {
    fn new(script: Script) -> Self {
        Self {
            script,
            players: 0,
            hp: [100, 100],
            turn: 1,
            rqid: 1,
            choices: [None, None],
            over: false,
        }
    }

    fn request_json(&self, side: Player) -> String {
        let (name, ident, details, id, move_name, hp, spe) = match side {
            Player::P1 => ("Alice", "p1: Garchomp", "Garchomp, L50", "earthquake", "Earthquake", self.hp[0], 102),
            Player::P2 => ("Bob", "p2: Heatran", "Heatran, L50", "magmastorm", "Magma Storm", self.hp[1], 77),
        };
        serde_json::json!({
            "rqid": self.rqid,
            "active": [{
                "moves": [{"move": move_name, "id": id, "pp": 8, "maxpp": 8, "target": "normal", "disabled": false}]
            }],
            "side": {
                "name": name,
                "id": side.as_str(),
                "pokemon": [{
                    "ident": ident,
                    "details": details,
                    "condition": format!("{}/100", hp.max(0)),
                    "active": true,
                    "stats": {"atk": 100, "def": 100, "spa": 100, "spd": 100, "spe": spe},
                    "moves": [id],
                    "baseAbility": "pressure",
                    "item": "leftovers"
                }]
            }
        })
        .to_string()
    }

    fn requests(&self) -> String {
        format!(
            "sideupdate\np1\n|request|{}\n\nsideupdate\np2\n|request|{}\n\n",
            self.request_json(Player::P1),
            self.request_json(Player::P2)
        )
    }

    fn update(&self, block: String) -> Vec<String> {
        let mut out = vec![block.clone()];
        if self.script.echo_updates {
            out.push(block.clone());
        }
        if self.script.echo_to_side {
            out.push(block.replacen("update\n", "sideupdate\np1\n", 1));
        }
        out
    }

    fn intro(&self) -> Vec<String> {
        let mut out = self.update(
            "update\n|player|p1|Alice|1\n|player|p2|Bob|2\n|teamsize|p1|1\n|teamsize|p2|1\n\
             |gametype|singles\n|start\n|switch|p1a: Garchomp|Garchomp, L50|100/100\n\
             |switch|p2a: Heatran|Heatran, L50|100/100\n|turn|1\n\n"
                .to_string(),
        );
        if self.script.malformed_request {
            out.push("sideupdate\np2\n|request|{\"side\": not json\n\n".to_string());
        }
        out.push(self.requests());
        out
    }

    fn resolve(&mut self) -> Vec<String> {
        self.choices = [None, None];
        let mut block = String::from("update\n");

        block.push_str("|move|p1a: Garchomp|Earthquake|p2a: Heatran\n");
        self.hp[1] -= 40;
        if self.hp[1] <= 0 {
            self.over = true;
            block.push_str("|-damage|p2a: Heatran|0 fnt\n|faint|p2a: Heatran\n|win|Alice\n\n");
            let mut out = self.update(block);
            out.push(format!("end\n{{\"winner\":\"Alice\",\"turns\":{}}}\n\n", self.turn));
            return out;
        }
        block.push_str(&format!("|-damage|p2a: Heatran|{}/100\n", self.hp[1]));

        block.push_str("|move|p2a: Heatran|Magma Storm|p1a: Garchomp\n");
        self.hp[0] -= 20;
        block.push_str(&format!("|-damage|p1a: Garchomp|{}/100\n", self.hp[0]));

        self.turn += 1;
        self.rqid += 1;
        block.push_str(&format!("|turn|{}\n\n", self.turn));

        let mut out = self.update(block);
        out.push(self.requests());
        out
    }

    fn handle(&mut self, line: &str) -> Vec<String> {
        if self.script.silent {
            return Vec::new();
        }
        if line.starts_with(">start") {
            if self.script.reject_start {
                return vec!["update\n|error|Unrecognized format: nope\n\n".to_string()];
            }
            return Vec::new();
        }
        if line.starts_with(">player") {
            self.players += 1;
            return if self.players == 2 { self.intro() } else { Vec::new() };
        }

        let Some((side, choice)) = line
            .strip_prefix('>')
            .and_then(|rest| rest.split_once(' '))
            .and_then(|(side, choice)| Some((Player::parse(side)?, choice)))
        else {
            return Vec::new();
        };
        if self.over || choice.starts_with("team") {
            return Vec::new();
        }
        if choice != "move 1" {
            return vec![format!(
                "sideupdate\n{side}\n|error|[Invalid choice] Can't move: {choice}\n\n"
            )];
        }
        self.choices[side.index()] = Some(choice.to_string());
        if self.choices.iter().all(Option::is_some) {
            self.resolve()
        } else {
            Vec::new()
        }
    }

    fn export(&self) -> String {
        format!("{},{},{},{}", self.hp[0], self.hp[1], self.turn, self.rqid)
    }

    fn import(&mut self, serialized: &str) -> Result<()> {
        let parts: Vec<&str> = serialized.split(',').collect();
        let [p1, p2, turn, rqid] = parts.as_slice() else {
            bail!("malformed battle: {serialized}");
        };
        self.hp = [p1.parse().context("p1 hp")?, p2.parse().context("p2 hp")?];
        self.turn = turn.parse().context("turn")?;
        self.rqid = rqid.parse().context("rqid")?;
        self.players = 2;
        self.choices = [None, None];
        self.over = false;
        Ok(())
    }
}

struct ScriptedControl(Arc<Mutex<ScriptedBattle>>);

impl SnapshotControl for ScriptedControl {
    fn export(&self) -> Result<String> {
        Ok(self.0.lock().unwrap().export())
    }

    fn import(&self, serialized: &str) -> Result<()> {
        self.0.lock().unwrap().import(serialized)
    }

    fn pending_request(&self, side: Player) -> Option<BattleRequest> {
        let battle = self.0.lock().unwrap();
        if battle.over {
            return None;
        }
        BattleRequest::from_json(&battle.request_json(side)).ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ScriptedSimulator(Script);

impl Simulator for ScriptedSimulator {
    fn open(&self) -> Result<SimulatorLink> {
        let battle = Arc::new(Mutex::new(ScriptedBattle::new(self.0)));
        let (input_tx, mut input_rx) = mpsc::channel::<String>(64);
        let (output_tx, output_rx) = mpsc::channel::<String>(64);

        let shared = Arc::clone(&battle);
        tokio::spawn(async move {
            while let Some(line) = input_rx.recv().await {
                let outputs = shared.lock().unwrap().handle(&line);
                for chunk in outputs {
                    if output_tx.send(chunk).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(SimulatorLink {
            input: input_tx,
            output: output_rx,
            control: self
                .0
                .snapshots
                .then(|| Arc::new(ScriptedControl(battle)) as Arc<dyn SnapshotControl>),
        })
    }
}

fn config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.p1.name = "Alice".to_string();
    config.p2.name = "Bob".to_string();
    config.start_timeout_ms = 2_000;
    config.update_timeout_ms = 2_000;
    config
}

fn heuristic() -> Controller {
    Controller::agent(HeuristicAgent::new())
}

async fn start(script: Script, p1: Controller, p2: Controller) -> BattleSession {
    BattleSession::builder(config())
        .controller(Player::P1, p1)
        .controller(Player::P2, p2)
        .start(&ScriptedSimulator(script))
        .await
        .unwrap()
}

async fn wait_until(session: &BattleSession, what: &str, done: impl Fn(&BattleSession) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = session.version();
    while !done(session) {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        match session
            .wait_for_update_within(seen, Duration::from_millis(200))
            .await
        {
            UpdateStatus::Updated(version) => seen = version,
            _ => seen = session.version(),
        }
    }
}

fn move_one() -> Choice {
    Choice::single(SlotAction::attack(1))
}

fn heatran_hp(session: &BattleSession) -> Option<u32> {
    session
        .state()
        .side(Player::P2)
        .active_pokemon(0)
        .map(|p| p.hp_percent)
}

#[tokio::test]
async fn test_agents_play_to_completion() {
    let session = start(Script::default(), heuristic(), heuristic()).await;
    let summary = session.run_to_end().await.unwrap();

    assert_eq!(summary.winner, Some(Player::P1));
    assert!(!summary.tie);
    assert_eq!(summary.turns, 3);

    let state = session.state();
    assert_eq!(state.phase, Phase::Ended);
    assert!(!state.waiting_for_choice);
    assert!(session.pending(Player::P1).is_none());
    assert!(session.pending(Player::P2).is_none());
    assert_eq!(session.wait_for_update(session.version()).await, UpdateStatus::Ended);
}

#[tokio::test]
async fn test_external_side_receives_actions_and_submits() {
    let session = start(Script::default(), Controller::External, heuristic()).await;

    let state = session.state();
    assert_eq!(state.phase, Phase::Battle);
    assert_eq!(state.turn, 1);
    assert!(state.waiting_for_choice);
    assert_eq!(state.available_actions.len(), 1);
    let Some(RequestKind::Decision(slots)) = session.pending(Player::P1) else {
        panic!("p1 should owe a decision");
    };
    let moves = &slots[0].as_ref().unwrap().moves;
    assert_eq!(moves[0].id, "earthquake");
    assert_eq!(session.rqid(Player::P1), Some(1));

    let mut events = session.subscribe();
    session.submit(Player::P1, move_one()).await.unwrap();
    wait_until(&session, "turn 2", |s| s.state().turn == 2).await;

    assert_eq!(heatran_hp(&session), Some(60));
    // The turn marker starts a fresh per-turn log
    assert_eq!(session.state().log.len(), 1);

    let mut saw_move = false;
    while let Ok(entry) = events.try_recv() {
        saw_move |= entry.kind == LogKind::Move;
    }
    assert!(saw_move);
}

#[tokio::test]
async fn test_second_submission_without_request_is_rejected() {
    let session = start(Script::default(), Controller::External, Controller::External).await;

    session.submit(Player::P1, move_one()).await.unwrap();
    assert!(!session.state().waiting_for_choice);
    assert!(matches!(
        session.submit(Player::P1, move_one()).await,
        Err(SessionError::NoPendingDecision(Player::P1))
    ));
    assert!(matches!(
        session.checkpoint(),
        Err(SessionError::SnapshotUnsupported)
    ));
}

#[tokio::test]
async fn test_choose_slot_submits_when_complete() {
    let session = start(Script::default(), Controller::External, Controller::External).await;
    wait_until(&session, "p2 request", |s| s.pending(Player::P2).is_some()).await;

    assert!(matches!(
        session.choose_slot(Player::P1, 1, SlotAction::attack(1)).await,
        Err(SessionError::InvalidSlot { slot: 1, .. })
    ));
    assert_eq!(
        session
            .choose_slot(Player::P1, 0, SlotAction::attack(1))
            .await
            .unwrap(),
        SlotProgress::Submitted
    );
    session
        .choose_slot(Player::P2, 0, SlotAction::attack(1))
        .await
        .unwrap();

    wait_until(&session, "turn 2", |s| s.state().turn == 2).await;
    assert_eq!(heatran_hp(&session), Some(60));
}

#[tokio::test]
async fn test_start_rejected_by_simulator() {
    let result = BattleSession::builder(config())
        .start(&ScriptedSimulator(Script {
            reject_start: true,
            ..Script::default()
        }))
        .await;
    match result {
        Err(SessionError::StartRejected(message)) => assert!(message.contains("Unrecognized format")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("start should fail"),
    }
}

#[tokio::test]
async fn test_start_times_out() {
    let mut config = config();
    config.start_timeout_ms = 50;
    let result = BattleSession::builder(config)
        .start(&ScriptedSimulator(Script {
            silent: true,
            ..Script::default()
        }))
        .await;
    assert!(matches!(result, Err(SessionError::StartTimeout(_))));
}

#[tokio::test]
async fn test_wait_for_update_times_out_quietly() {
    let session = start(Script::default(), Controller::External, Controller::External).await;
    wait_until(&session, "p2 request", |s| s.pending(Player::P2).is_some()).await;

    let status = session
        .wait_for_update_within(session.version(), Duration::from_millis(30))
        .await;
    assert_eq!(status, UpdateStatus::TimedOut);
}

#[tokio::test]
async fn test_rejected_choice_wakes_waiters_and_restores_request() {
    let session = start(Script::default(), Controller::External, Controller::External).await;
    let before = session.version();

    let bad: Choice = "move 9".parse().unwrap();
    session.submit(Player::P1, bad).await.unwrap();

    let mut seen = before;
    let message = loop {
        match session
            .wait_for_update_within(seen, Duration::from_secs(2))
            .await
        {
            UpdateStatus::Failed(message) => break message,
            UpdateStatus::Updated(version) => seen = version,
            other => panic!("unexpected status {other:?}"),
        }
    };
    assert!(message.contains("Invalid choice"));
    assert!(session.start_error().is_some());
    assert!(matches!(
        session.pending(Player::P1),
        Some(RequestKind::Decision(_))
    ));

    session.submit(Player::P1, move_one()).await.unwrap();
}

#[tokio::test]
async fn test_malformed_request_is_ignored() {
    let session = start(
        Script {
            malformed_request: true,
            ..Script::default()
        },
        heuristic(),
        heuristic(),
    )
    .await;
    let summary = session.run_to_end().await.unwrap();
    assert_eq!(summary.winner, Some(Player::P1));
}

#[tokio::test]
async fn test_repeated_update_blocks_are_applied_once() {
    let session = start(
        Script {
            echo_updates: true,
            ..Script::default()
        },
        heuristic(),
        heuristic(),
    )
    .await;
    session.run_to_end().await.unwrap();

    let moves = session
        .state()
        .full_log
        .iter()
        .filter(|e| e.kind == LogKind::Move)
        .count();
    // Both sides move on turns 1 and 2, only Garchomp on turn 3
    assert_eq!(moves, 5);
}

#[tokio::test]
async fn test_checkpoint_and_resume() {
    let script = Script {
        snapshots: true,
        ..Script::default()
    };
    let session = start(script, Controller::External, Controller::External).await;
    wait_until(&session, "p2 request", |s| s.pending(Player::P2).is_some()).await;

    let checkpoint = session.checkpoint().unwrap();
    assert_eq!(checkpoint.serialized_battle, "100,100,1,1");
    assert_eq!(checkpoint.battle_state.turn, 1);
    let checkpoint = Checkpoint::from_json(&checkpoint.to_json().unwrap()).unwrap();

    // Play on past the checkpoint, then go back to it
    session.submit(Player::P1, move_one()).await.unwrap();
    assert!(matches!(
        session.checkpoint(),
        Err(SessionError::CheckpointUnavailable(_))
    ));
    session.submit(Player::P2, move_one()).await.unwrap();
    wait_until(&session, "turn 2", |s| s.state().turn == 2).await;
    drop(session);

    let resumed = BattleSession::builder(SessionConfig::default())
        .resume(checkpoint.clone(), &ScriptedSimulator(script))
        .await
        .unwrap();
    let mut events = resumed.subscribe();

    let state = resumed.state();
    assert_eq!(state, checkpoint.battle_state);
    assert_eq!(state.turn, 1);
    assert_eq!(state.phase, Phase::Battle);
    assert!(state.waiting_for_choice);
    assert_eq!(resumed.config().p1.name, "Alice");
    assert_eq!(resumed.protocol_log(), checkpoint.protocol_log);
    assert!(matches!(
        resumed.pending(Player::P2),
        Some(RequestKind::Decision(_))
    ));
    assert!(events.try_recv().is_err());

    resumed.submit(Player::P1, move_one()).await.unwrap();
    resumed.submit(Player::P2, move_one()).await.unwrap();
    wait_until(&resumed, "turn 2 after resume", |s| s.state().turn == 2).await;
    assert_eq!(heatran_hp(&resumed), Some(60));
}

#[tokio::test]
async fn test_batch_runs_every_battle() {
    let configs = vec![config(); 3];
    let outcomes = run_batch(
        Arc::new(ScriptedSimulator::default()),
        configs,
        2,
        |_, _| [heuristic(), heuristic()],
    )
    .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().enumerate().all(|(i, o)| o.index == i));
    assert_eq!(
        BatchStats::from_outcomes(&outcomes),
        BatchStats {
            p1_wins: 3,
            ..BatchStats::default()
        }
    );
}

#[tokio::test]
async fn test_side_framed_echo_is_applied_once() {
    let session = start(
        Script {
            echo_to_side: true,
            ..Script::default()
        },
        heuristic(),
        heuristic(),
    )
    .await;
    let summary = session.run_to_end().await.unwrap();
    assert_eq!(summary.winner, Some(Player::P1));

    let moves = session
        .state()
        .full_log
        .iter()
        .filter(|e| e.kind == LogKind::Move)
        .count();
    assert_eq!(moves, 5);
}

struct PanickingAgent;

impl Agent for PanickingAgent {
    fn name(&self) -> &str {
        "panicking"
    }

    fn choose(&self, _ctx: &DecisionContext<'_>) -> Option<Choice> {
        panic!("engine blew up")
    }
}

#[tokio::test]
async fn test_agent_panic_falls_back_to_heuristic() {
    let session = start(Script::default(), Controller::agent(PanickingAgent), heuristic()).await;
    let summary = session.run_to_end().await.unwrap();
    assert_eq!(summary.winner, Some(Player::P1));
    assert_eq!(summary.turns, 3);
}

/// Doubles battle paused on p1's forced switch: slot a is healthy, slot b
/// fainted, Tyranitar waits in the back
#[derive(Debug, Clone, Default)]
struct ForcedSwitchSimulator {
    written: Arc<Mutex<Vec<String>>>,
}

const FORCED_SWITCH_INTRO: &str = "update\n|player|p1|Alice|1\n|player|p2|Bob|2\n|gametype|doubles\n|start\n\
|switch|p1a: Garchomp|Garchomp, L50|100/100\n|switch|p1b: Heatran|Heatran, L50|100/100\n\
|switch|p2a: Rillaboom|Rillaboom, L50|100/100\n|switch|p2b: Incineroar|Incineroar, L50|100/100\n\
|turn|1\n|move|p2a: Rillaboom|Wood Hammer|p1b: Heatran\n|-damage|p1b: Heatran|0 fnt\n|faint|p1b: Heatran\n\n";

fn forced_switch_request() -> String {
    serde_json::json!({
        "rqid": 3,
        "forceSwitch": [false, true],
        "side": {
            "name": "Alice",
            "id": "p1",
            "pokemon": [
                {"ident": "p1: Garchomp", "details": "Garchomp, L50", "condition": "100/100", "active": true},
                {"ident": "p1: Heatran", "details": "Heatran, L50", "condition": "0 fnt", "active": true},
                {"ident": "p1: Tyranitar", "details": "Tyranitar, L50", "condition": "100/100", "active": false}
            ]
        }
    })
    .to_string()
}

impl Simulator for ForcedSwitchSimulator {
    fn open(&self) -> Result<SimulatorLink> {
        let (input_tx, mut input_rx) = mpsc::channel::<String>(64);
        let (output_tx, output_rx) = mpsc::channel::<String>(64);
        let written = Arc::clone(&self.written);

        tokio::spawn(async move {
            let mut players = 0;
            while let Some(line) = input_rx.recv().await {
                let is_player = line.starts_with(">player");
                written.lock().unwrap().push(line);
                if is_player {
                    players += 1;
                    if players == 2 {
                        let request = format!("sideupdate\np1\n|request|{}\n\n", forced_switch_request());
                        for chunk in [FORCED_SWITCH_INTRO.to_string(), request] {
                            if output_tx.send(chunk).await.is_err() {
                                return;
                            }
                        }
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

#[tokio::test]
async fn test_short_choice_passes_for_slots_that_do_not_act() {
    let simulator = ForcedSwitchSimulator::default();
    let session = BattleSession::builder(config())
        .start(&simulator)
        .await
        .unwrap();

    let Some(RequestKind::Decision(slots)) = session.pending(Player::P1) else {
        panic!("p1 should owe a forced switch");
    };
    assert!(slots[0].is_none());
    assert!(slots[1].as_ref().unwrap().force_switch);

    session
        .submit(Player::P1, Choice::single(SlotAction::Switch { index: 3 }))
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let written = simulator.written.lock().unwrap().clone();
        if let Some(choice) = written.iter().find(|l| l.starts_with(">p1 ")) {
            assert_eq!(choice, ">p1 pass, switch 3");
            break;
        }
        assert!(Instant::now() < deadline, "choice never reached the simulator");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
