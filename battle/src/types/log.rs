//! Human-readable battle log entries

/// Broad category of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LogKind {
    Setup,
    Turn,
    Switch,
    Move,
    Damage,
    Heal,
    Faint,
    Status,
    Boost,
    Field,
    Side,
    Item,
    Ability,
    Tera,
    Effect,
    Outcome,
}

/// One entry produced by interpreting a protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogEntry {
    /// Turn the event happened on
    pub turn: u32,
    pub kind: LogKind,
    pub text: String,
}

impl LogEntry {
    pub fn new(turn: u32, kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            turn,
            kind,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[T{}] {}", self.turn, self.text)
    }
}
