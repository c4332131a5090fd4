//! Per-slot decisions and their choice-string encoding
//!
//! `move 1 2 terastallize, switch 3` is a doubles choice: one comma-separated part
//! per active slot.

use std::fmt;
use std::str::FromStr;

use crate::ParseError;

/// What one active slot does this turn
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotAction {
    /// Use the move in 1-based slot `index`
    Move {
        index: usize,
        /// Target position for doubles (positive = foe, negative = ally)
        target: Option<i8>,
        terastallize: bool,
        mega: bool,
    },
    /// Switch to the 1-based team position `index`
    Switch { index: usize },
    /// Nothing to do in this slot
    Pass,
}

impl SlotAction {
    pub fn attack(index: usize) -> Self {
        SlotAction::Move {
            index,
            target: None,
            terastallize: false,
            mega: false,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, SlotAction::Pass)
    }

    pub fn uses_tera(&self) -> bool {
        matches!(
            self,
            SlotAction::Move {
                terastallize: true,
                ..
            }
        )
    }
}

impl fmt::Display for SlotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotAction::Move {
                index,
                target,
                terastallize,
                mega,
            } => {
                write!(f, "move {index}")?;
                if let Some(target) = target {
                    write!(f, " {target}")?;
                }
                if *terastallize {
                    f.write_str(" terastallize")?;
                }
                if *mega {
                    f.write_str(" mega")?;
                }
                Ok(())
            }
            SlotAction::Switch { index } => write!(f, "switch {index}"),
            SlotAction::Pass => f.write_str("pass"),
        }
    }
}

impl FromStr for SlotAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let invalid = || ParseError::InvalidFormat(format!("bad slot action: {s}"));

        match words.next() {
            Some("pass") => Ok(SlotAction::Pass),
            Some("switch") => {
                let index = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(invalid)?;
                Ok(SlotAction::Switch { index })
            }
            Some("move") => {
                let index = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(invalid)?;
                let mut action = SlotAction::attack(index);
                if let SlotAction::Move {
                    target,
                    terastallize,
                    mega,
                    ..
                } = &mut action
                {
                    for word in words {
                        match word {
                            "terastallize" => *terastallize = true,
                            "mega" => *mega = true,
                            other => *target = Some(other.parse().map_err(|_| invalid())?),
                        }
                    }
                }
                Ok(action)
            }
            _ => Err(invalid()),
        }
    }
}

/// A full choice for one side: one action per active slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Choice {
    pub actions: Vec<SlotAction>,
}

impl Choice {
    pub fn new(actions: Vec<SlotAction>) -> Self {
        Self { actions }
    }

    pub fn single(action: SlotAction) -> Self {
        Self {
            actions: vec![action],
        }
    }

    /// Whether any slot terastallizes
    pub fn uses_tera(&self) -> bool {
        self.actions.iter().any(SlotAction::uses_tera)
    }

    /// Lay a short choice out over the slots that act
    ///
    /// `acting[i]` tells whether slot `i` owes an action. A choice with fewer
    /// parts than slots gives its parts, in order, to the acting slots and
    /// `pass` to the others. A full-length choice is kept as is.
    pub fn spread(self, acting: &[bool]) -> Self {
        if self.actions.len() >= acting.len() {
            return self;
        }
        let mut given = self.actions.into_iter();
        let actions = acting
            .iter()
            .map(|&acts| {
                if acts {
                    given.next().unwrap_or(SlotAction::Pass)
                } else {
                    SlotAction::Pass
                }
            })
            .collect();
        Self { actions }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

impl FromStr for Choice {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseError::EmptyMessage);
        }
        let actions = s
            .split(',')
            .map(|part| part.trim().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Choice { actions })
    }
}
