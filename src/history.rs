//! Command history
//!
//! History is an abstract ordered log navigated through opaque cursors. All
//! operations are permitted to fail softly: `get` on a cursor that no longer
//! points at an entry returns the empty string, and navigation saturates at
//! the ends. This implies that the empty string is not a valid history entry
//! and that cursors are never zero.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// An opaque handle to a history entry. Valid handles are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryCursor(NonZeroUsize);

impl HistoryCursor {
    pub fn new(raw: NonZeroUsize) -> Self {
        Self(raw)
    }

    fn raw(self) -> usize {
        self.0.get()
    }

    fn from_raw(raw: usize) -> Self {
        // Position arithmetic keeps raw >= 1; see RingHistory.
        Self(NonZeroUsize::new(raw).expect("history cursor must be non-zero"))
    }
}

/// An ordered log of executed lines.
pub trait History {
    /// Cursor for the first entry.
    fn begin(&self) -> HistoryCursor;
    /// Cursor one past the last entry, where [`History::add`] will insert.
    fn end(&self) -> HistoryCursor;

    /// The entry after `pos`, saturating at [`History::end`].
    fn next(&self, pos: HistoryCursor) -> HistoryCursor;
    /// The entry before `pos`, saturating at [`History::begin`].
    fn previous(&self, pos: HistoryCursor) -> HistoryCursor;

    /// The text of the entry at `pos`, or empty if the cursor points at no
    /// live entry.
    fn get(&self, pos: HistoryCursor) -> String;
    /// Append an entry at the end. Empty strings are not valid entries and
    /// are ignored.
    fn add(&mut self, text: &str);
}

/// History kept in a bounded ring; adding beyond capacity evicts the oldest
/// entry. Cursors are absolute positions, so a handle taken before an
/// eviction still identifies the same (now possibly gone) entry.
#[derive(Debug)]
pub struct RingHistory {
    lines: VecDeque<String>,
    /// Absolute position of `lines[0]`.
    start: usize,
    max_lines: usize,
}

impl RingHistory {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            start: 0,
            max_lines: max_lines.max(1),
        }
    }

    /// Capacity taken from the editor configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.history_lines)
    }

    fn cursor_at(&self, position: usize) -> HistoryCursor {
        HistoryCursor::from_raw(position + 1)
    }

    fn position_of(&self, cursor: HistoryCursor) -> usize {
        cursor.raw() - 1
    }
}

impl History for RingHistory {
    fn begin(&self) -> HistoryCursor {
        self.cursor_at(self.start)
    }

    fn end(&self) -> HistoryCursor {
        self.cursor_at(self.start + self.lines.len())
    }

    fn next(&self, pos: HistoryCursor) -> HistoryCursor {
        let at = self.position_of(pos).saturating_add(1);
        self.cursor_at(at.min(self.start + self.lines.len()))
    }

    fn previous(&self, pos: HistoryCursor) -> HistoryCursor {
        let at = self.position_of(pos).saturating_sub(1);
        self.cursor_at(at.max(self.start))
    }

    fn get(&self, pos: HistoryCursor) -> String {
        let at = self.position_of(pos);
        at.checked_sub(self.start)
            .and_then(|n| self.lines.get(n))
            .cloned()
            .unwrap_or_default()
    }

    fn add(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.lines.push_back(text.to_string());
        if self.lines.len() > self.max_lines {
            self.lines.pop_front();
            self.start += 1;
        }
    }
}
