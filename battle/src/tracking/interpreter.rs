//! Protocol line interpreter
//!
//! Lines are dispatched on their command through an open table of handler
//! functions. Unknown commands are ignored, so new simulator messages never
//! break an existing battle.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use duelist_protocol::{ProtocolLine, parse_line};

use super::battle::{BattleState, SplitState};
use super::handlers;
use crate::dex::Dex;
use crate::types::LogEntry;

/// Applies one parsed line to the state, optionally producing a log entry
pub type Handler = fn(&Interpreter, &mut BattleState, &ProtocolLine) -> Option<LogEntry>;

/// Commands that are recognized but carry nothing the state tracks
const IGNORED: &[&str] = &[
    "",
    "gen",
    "tier",
    "rule",
    "rated",
    "title",
    "start",
    "upkeep",
    "t:",
    "timestamp",
    "teampreview",
    "clearpoke",
    "poke",
    "request",
    "inactive",
    "inactiveoff",
    "j",
    "J",
    "l",
    "L",
    "n",
    "c",
    "c:",
    "chat",
    "raw",
    "html",
    "uhtml",
    "debug",
    "seed",
    "badge",
    "-hint",
    "-message",
    "-center",
    "-nothing",
    "-miss",
    "-fail",
    "-block",
    "-notarget",
    "-hitcount",
    "-anim",
    "-prepare",
    "-mustrecharge",
    "-singleturn",
    "-singlemove",
    "-combine",
    "-waiting",
    "-zpower",
    "-zbroken",
];

fn ignore(_: &Interpreter, _: &mut BattleState, _: &ProtocolLine) -> Option<LogEntry> {
    None
}

/// Dispatch table from protocol command to handler
pub struct Interpreter {
    handlers: HashMap<String, Handler>,
    dex: Option<Arc<dyn Dex>>,
}

impl Interpreter {
    /// Interpreter with every built-in handler registered
    pub fn new() -> Self {
        let mut interpreter = Self {
            handlers: HashMap::new(),
            dex: None,
        };
        for command in IGNORED {
            interpreter.register(command, ignore);
        }
        for (command, handler) in handlers::BUILTIN {
            interpreter.register(command, *handler);
        }
        interpreter
    }

    pub fn with_dex(mut self, dex: Arc<dyn Dex>) -> Self {
        self.dex = Some(dex);
        self
    }

    pub fn dex(&self) -> Option<&dyn Dex> {
        self.dex.as_deref()
    }

    /// Add or replace the handler for `command`, returning the previous one
    pub fn register(&mut self, command: &str, handler: Handler) -> Option<Handler> {
        self.handlers.insert(command.to_string(), handler)
    }

    pub fn handles(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Apply one raw line to the state
    ///
    /// Does not touch the state's log; callers that want the entry recorded use
    /// [`Interpreter::process_chunk`].
    pub fn process_line(&self, state: &mut BattleState, line: &str) -> Option<LogEntry> {
        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                if !line.trim().is_empty() {
                    tracing::trace!(line, error = %e, "Skipping non-protocol line");
                }
                return None;
            }
        };

        // `|split|pN` is followed by the owner's exact line, then the public one
        if parsed.command == "split" {
            state.split = SplitState::AwaitingExact;
            return None;
        }
        match state.split {
            SplitState::SkipPublic => {
                state.split = SplitState::Inactive;
                return None;
            }
            SplitState::AwaitingExact => state.split = SplitState::SkipPublic,
            SplitState::Inactive => {}
        }

        let Some(handler) = self.handlers.get(parsed.command.as_str()) else {
            tracing::trace!(command = %parsed.command, "Unhandled protocol command");
            return None;
        };
        handler(self, state, &parsed)
    }

    /// Apply a multi-line chunk, appending entries to both logs
    pub fn process_chunk(&self, state: &mut BattleState, chunk: &str) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        for line in chunk.lines() {
            if let Some(entry) = self.process_line(state, line) {
                state.log.push(entry.clone());
                state.full_log.push(entry.clone());
                entries.push(entry);
            }
        }
        entries
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("handlers", &self.handlers.len())
            .field("dex", &self.dex.is_some())
            .finish()
    }
}

fn shared() -> &'static Interpreter {
    static DEFAULT: OnceLock<Interpreter> = OnceLock::new();
    DEFAULT.get_or_init(Interpreter::new)
}

/// Apply one line with the default interpreter
pub fn process_line(state: &mut BattleState, line: &str) -> Option<LogEntry> {
    shared().process_line(state, line)
}

/// Apply a chunk with the default interpreter
pub fn process_chunk(state: &mut BattleState, chunk: &str) -> Vec<LogEntry> {
    shared().process_chunk(state, chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogKind;

    #[test]
    fn test_unknown_command_is_ignored() {
        let mut state = BattleState::new();
        let before = state.clone();
        assert!(process_line(&mut state, "|futuremessage|a|b").is_none());
        assert!(process_line(&mut state, "not a protocol line").is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn test_split_applies_exact_and_skips_public() {
        let mut state = BattleState::new();
        process_chunk(
            &mut state,
            "|switch|p1a: Garchomp|Garchomp, L50, M|319/319\n\
             |split|p1\n\
             |-damage|p1a: Garchomp|200/319\n\
             |-damage|p1a: Garchomp|63/100",
        );

        let poke = &state.side(duelist_protocol::Player::P1).team[0];
        assert_eq!(poke.hp, 200);
        assert_eq!(poke.max_hp, 319);
    }

    #[test]
    fn test_custom_handler_overrides_builtin() {
        fn shout(_: &Interpreter, state: &mut BattleState, line: &ProtocolLine) -> Option<LogEntry> {
            Some(LogEntry::new(
                state.turn,
                LogKind::Effect,
                line.arg_or_empty(0).to_uppercase(),
            ))
        }

        let mut interpreter = Interpreter::new();
        assert!(interpreter.register("-message", shout).is_some());
        assert!(interpreter.register("-custom", shout).is_none());

        let mut state = BattleState::new();
        let entries = interpreter.process_chunk(&mut state, "|-message|hi\n|-custom|there");
        assert_eq!(entries.len(), 2);
        assert_eq!(state.log[1].text, "THERE");
    }

    #[test]
    fn test_process_line_does_not_append() {
        let mut state = BattleState::new();
        let entry = process_line(&mut state, "|turn|1");
        assert!(entry.is_some());
        assert!(state.log.is_empty());
        assert_eq!(state.turn, 1);
    }
}
