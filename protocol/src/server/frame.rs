//! Framing of simulator output into blocks
//!
//! The simulator writes output in blank-line separated blocks, each introduced by a
//! header line:
//!
//! ```text
//! update
//! |move|p1a: Garchomp|Earthquake|p2a: Heatran
//! |-damage|p2a: Heatran|0 fnt
//!
//! sideupdate
//! p2
//! |request|{"forceSwitch":[true],...}
//!
//! end
//! {"winner":"Alice",...}
//! ```

use super::battle::Player;

/// Which kind of output block a set of lines belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Public (or split) battle events
    Update,
    /// Lines addressed to a single side, usually a request
    SideUpdate(Player),
    /// Final battle log emitted once the battle is over
    End,
    /// Lines with no recognised header
    Untagged,
}

/// A framed output block with its header lines removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBlock {
    pub kind: BlockKind,
    pub lines: Vec<String>,
}

/// Incremental block framer, fed one line at a time
#[derive(Debug, Default)]
pub struct BlockFramer {
    kind: Option<BlockKind>,
    awaiting_side: bool,
    lines: Vec<String>,
}

impl BlockFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns a block when a blank line or a new header closes one
    pub fn push_line(&mut self, line: &str) -> Option<SimBlock> {
        let line = line.trim_end_matches(['\r', '\n']);

        if self.awaiting_side {
            self.awaiting_side = false;
            if let Some(player) = Player::parse(line.trim()) {
                self.kind = Some(BlockKind::SideUpdate(player));
                return None;
            }
            // Header without a side id: keep the line as payload of an untagged block
            self.kind = Some(BlockKind::Untagged);
        }

        if line.trim().is_empty() {
            return self.flush();
        }

        let header = match line {
            "update" => Some(BlockKind::Update),
            "end" => Some(BlockKind::End),
            "sideupdate" => Some(BlockKind::Untagged),
            _ => None,
        };

        if let Some(kind) = header {
            let finished = self.flush();
            self.kind = Some(kind);
            self.awaiting_side = line == "sideupdate";
            return finished;
        }

        self.kind.get_or_insert(BlockKind::Untagged);
        self.lines.push(line.to_string());
        None
    }

    /// No block is open
    pub fn is_idle(&self) -> bool {
        self.kind.is_none()
    }

    /// Close the current block, if it has any content
    pub fn flush(&mut self) -> Option<SimBlock> {
        let kind = self.kind.take()?;
        self.awaiting_side = false;
        let lines = std::mem::take(&mut self.lines);

        if lines.is_empty() {
            return None;
        }

        Some(SimBlock { kind, lines })
    }
}

/// Split a chunk of simulator output into blocks
pub fn split_output(text: &str) -> Vec<SimBlock> {
    let mut framer = BlockFramer::new();
    let mut blocks: Vec<SimBlock> = text.lines().filter_map(|l| framer.push_line(l)).collect();
    blocks.extend(framer.flush());
    blocks
}
