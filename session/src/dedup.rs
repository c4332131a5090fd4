//! Repeated event block suppression
//!
//! Some simulator front ends echo the same `update` block twice. A block is a
//! repeat when its payload, with framing markers removed, equals the payload of
//! the event block directly before it.

/// Whether `line` is framing rather than payload
fn is_marker(line: &str) -> bool {
    matches!(line, "update" | "sideupdate" | "end")
        || line.starts_with('>')
        || (line.len() == 2 && line.starts_with('p') && line[1..].parse::<u8>().is_ok())
}

/// Trimmed payload lines of a block
pub fn normalize<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| !l.is_empty() && !is_marker(l))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
pub struct BlockDeduper {
    previous: Option<Vec<String>>,
}

impl BlockDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `lines` against the previous event block and remember them
    pub fn is_repeat<S: AsRef<str>>(&mut self, lines: &[S]) -> bool {
        let current = normalize(lines);
        if current.is_empty() {
            return false;
        }
        if self.previous.as_ref() == Some(&current) {
            return true;
        }
        self.previous = Some(current);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_repeat_skipped() {
        let mut deduper = BlockDeduper::new();
        let block = ["|move|p1a: Garchomp|Earthquake|p2a: Heatran", "|turn|2"];
        assert!(!deduper.is_repeat(&block));
        assert!(deduper.is_repeat(&block));
    }

    #[test]
    fn test_markers_and_whitespace_ignored() {
        let mut deduper = BlockDeduper::new();
        assert!(!deduper.is_repeat(&["update", "|turn|2  "]));
        assert!(deduper.is_repeat(&["  |turn|2", "", "p1", ">p1 move 1"]));
    }

    #[test]
    fn test_only_previous_block_compared() {
        let mut deduper = BlockDeduper::new();
        assert!(!deduper.is_repeat(&["|turn|2"]));
        assert!(!deduper.is_repeat(&["|turn|3"]));
        assert!(!deduper.is_repeat(&["|turn|2"]));
    }

    #[test]
    fn test_marker_only_block_is_never_a_repeat() {
        let mut deduper = BlockDeduper::new();
        assert!(!deduper.is_repeat(&["update"]));
        assert!(!deduper.is_repeat(&["update"]));
    }

    #[test]
    fn test_side_framed_echo_is_a_repeat() {
        let mut deduper = BlockDeduper::new();
        let events = ["|move|p1a: Garchomp|Earthquake|p2a: Heatran", "|turn|2"];
        assert!(!deduper.is_repeat(&events));
        assert!(deduper.is_repeat(&["sideupdate", "p1", events[0], events[1]]));
    }
}
