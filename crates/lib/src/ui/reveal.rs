//! Character-by-character reveal of a result message.

use std::time::Duration;

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(1);

/// Finite, forward-only reveal: each step shows one more character until the whole message
/// is visible. There is no reset; reveal a new message with a new `ResultReveal`.
#[derive(Debug, Clone)]
pub struct ResultReveal {
    chars: Vec<char>,
    visible: String,
    interval: Duration,
}

impl ResultReveal {
    pub fn new(message: &str, interval: Duration) -> Self {
        Self {
            chars: message.chars().collect(),
            visible: String::with_capacity(message.len()),
            interval,
        }
    }

    pub fn visible(&self) -> &str {
        &self.visible
    }

    fn shown(&self) -> usize {
        self.visible.chars().count()
    }

    pub fn is_done(&self) -> bool {
        self.shown() >= self.chars.len()
    }

    /// Show every character due `elapsed` after the reveal started (one per interval).
    /// Returns true when more text became visible.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        let total = self.chars.len();
        let due = if self.interval.is_zero() {
            total
        } else {
            ((elapsed.as_nanos() / self.interval.as_nanos()) as usize).min(total)
        };
        let shown = self.shown();
        if due <= shown {
            return false;
        }
        self.visible.extend(&self.chars[shown..due]);
        true
    }

    /// Time until the next character is due, or None once finished.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.is_done() {
            None
        } else {
            Some(self.interval)
        }
    }
}

impl Iterator for ResultReveal {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let shown = self.shown();
        let c = *self.chars.get(shown)?;
        self.visible.push(c);
        Some(self.visible.clone())
    }
}
