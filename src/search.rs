//! Reverse incremental search
//!
//! A child mode pushed on top of the Emacs mode by Ctrl-R. Each typed
//! character extends the pattern and records a snapshot of where the search
//! stood (history position, cursor line and column); backspace pops one
//! snapshot, Ctrl-R hops to the next earlier match, and any unbound key
//! ends the search and hands the key to the editing mode underneath.
//!
//! Matching walks the cursor leftward through the current buffer, stepping
//! to the previous history entry when the buffer is exhausted. A fruitless
//! search rings the bell and restores the latest snapshot.

use crate::bindings::{Command, KeyBindings};
use crate::editor::Editor;
use crate::emacs::EmacsMode;
use crate::history::HistoryCursor;
use crate::key::{ctrl, is_printable, keys, Key, KeyCombination};
use crate::mode::{Lookup, Mode};
use crate::term::decorated::{Attribute, DecoratedText};
use crate::term::Terminal;

/// Where the search stood before a pattern character was added.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot {
    history: Option<HistoryCursor>,
    line: usize,
    column: usize,
}

impl Snapshot {
    pub(crate) fn capture(mode: &mut EmacsMode) -> Self {
        Self {
            history: mode.history_position(),
            line: mode.cursor().line(),
            column: mode.cursor().column(),
        }
    }

    fn activate(&self, mode: &mut EmacsMode) {
        if let Some(pos) = self.history {
            mode.set_history_position(pos);
        }
        let cursor = mode
            .text()
            .begin()
            .moved(self.column as i32, self.line as i32);
        mode.set_cursor(cursor);
    }
}

/// The reverse-i-search mode.
pub struct SearchMode {
    pattern: String,
    /// One entry per pattern character, plus the position the search
    /// started from.
    snapshots: Vec<Snapshot>,
    bindings: KeyBindings,
}

impl SearchMode {
    pub(crate) fn new(origin: Snapshot) -> Self {
        Self {
            pattern: String::new(),
            snapshots: vec![origin],
            bindings: search_bindings(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn top_snapshot(&self) -> Snapshot {
        *self
            .snapshots
            .last()
            .expect("search keeps its origin snapshot")
    }

    /// Does the pattern match at the base mode's cursor?
    fn matches(&self, emacs: &mut EmacsMode) -> bool {
        let cursor = emacs.cursor();
        let end = cursor.moved(self.pattern.len() as i32, 0);
        emacs.text().get(&cursor, &end) == self.pattern
    }

    /// Extend the pattern by one character, hunting for a match.
    pub(crate) fn insert(
        &mut self,
        emacs: &mut EmacsMode,
        key: Key,
        terminal: Option<&mut Terminal>,
    ) {
        let Ok(byte) = u8::try_from(key) else {
            return;
        };
        self.pattern.push(char::from(byte));
        self.snapshots.push(self.top_snapshot());
        if !self.matches(emacs) && !self.advance(emacs, terminal) {
            self.delete_last(emacs);
        }
    }

    /// Drop the last pattern character and return to where the search stood
    /// before it.
    pub(crate) fn delete_last(&mut self, emacs: &mut EmacsMode) {
        if self.pattern.is_empty() {
            return;
        }
        self.pattern.pop();
        self.snapshots.pop();
        self.top_snapshot().activate(emacs);
    }

    /// Walk to the next earlier match: leftward through the buffer, then
    /// back through history. Bells and restores the snapshot on failure.
    pub(crate) fn advance(
        &mut self,
        emacs: &mut EmacsMode,
        terminal: Option<&mut Terminal>,
    ) -> bool {
        loop {
            while emacs.text().begin() != emacs.cursor() {
                emacs.set_cursor(emacs.cursor().moved(-1, 0));
                if self.matches(emacs) {
                    *self
                        .snapshots
                        .last_mut()
                        .expect("search keeps its origin snapshot") = Snapshot::capture(emacs);
                    return true;
                }
            }
            if !emacs.history_previous() {
                break;
            }
        }

        // No match anywhere.
        if let Some(terminal) = terminal {
            terminal.bell();
        }
        self.top_snapshot().activate(emacs);
        false
    }
}

impl Mode for SearchMode {
    fn handler(&mut self, combo: &KeyCombination) -> Lookup {
        if let Some(key) = combo.single() {
            if is_printable(key) {
                return Lookup::Bound(SEARCH_INSERT);
            }
        }
        match self.bindings.get(combo) {
            Some(command) => Lookup::Bound(command),
            // Anything else ends the search and goes to the base mode.
            None => Lookup::Fallthrough,
        }
    }

    fn render(&mut self, below: &mut [Box<dyn Mode>], terminal: &mut Terminal) {
        let Some(emacs) = below.iter_mut().rev().find_map(|m| m.as_emacs()) else {
            return;
        };
        let rows = terminal.num_rows();
        let cols = terminal.num_columns();
        let mut dt = DecoratedText::new();
        let (row, col) = emacs.render_into(&mut dt, rows, cols);
        dt.add(
            Attribute::Normal,
            &format!("\nreverse-i-search: {}_", self.pattern),
        );
        terminal.set_text(&dt, row, col);
    }

    fn as_search(&mut self) -> Option<&mut SearchMode> {
        Some(self)
    }
}

//
// Commands
//

fn search_insert(editor: &mut Editor, combo: &KeyCombination) {
    let Some(key) = combo.single() else { return };
    editor.with_search(|cx| cx.search.insert(cx.emacs, key, cx.terminal));
}

fn search_delete_left(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_search(|cx| cx.search.delete_last(cx.emacs));
}

fn search_next(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_search(|cx| {
        cx.search.advance(cx.emacs, cx.terminal);
    });
}

/// Ctrl-C inside the search keeps the found line and just ends the mode, so
/// it does not cancel the history entry the search landed on.
fn search_accept_line(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_search(|cx| *cx.exit = true);
}

/// Enter reverse-i-search from the editing mode.
fn reverse_i_search(editor: &mut Editor, _combo: &KeyCombination) {
    let Some(origin) = editor.with_emacs(|cx| Snapshot::capture(cx.mode)) else {
        return;
    };
    editor.push_mode(Box::new(SearchMode::new(origin)));
}

const SEARCH_INSERT: Command = Command::new("search-insert-char", search_insert);
const SEARCH_DELETE_LEFT: Command = Command::new("search-delete-left", search_delete_left);
const SEARCH_NEXT: Command = Command::new("search-next", search_next);
const SEARCH_ACCEPT_LINE: Command = Command::new("search-accept-line", search_accept_line);
pub(crate) const REVERSE_I_SEARCH: Command = Command::new("reverse-i-search", reverse_i_search);

fn search_bindings() -> KeyBindings {
    let mut b = KeyBindings::new();
    b.bind(SEARCH_DELETE_LEFT, &[keys::BACKSPACE]);
    b.bind(SEARCH_NEXT, &[ctrl('R' as Key)]);
    b.bind(crate::emacs::SIGQUIT, &[keys::QUIT]);
    b.bind(crate::emacs::SUSPEND, &[ctrl('Z' as Key), keys::SUSPEND]);
    b.bind(crate::emacs::REDISPLAY, &[ctrl('L' as Key)]);
    b.bind(SEARCH_ACCEPT_LINE, &[ctrl('C' as Key), keys::INTERRUPT]);
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emacs::{Completions, Driver};
    use crate::history::{History, RingHistory};

    struct SearchDriver {
        history: RingHistory,
    }

    impl Driver for SearchDriver {
        fn execute(&mut self, _line: &str) {}

        fn history(&mut self) -> Option<&mut dyn History> {
            Some(&mut self.history)
        }

        fn completions(&mut self, _text: &str, _offset: usize, _matches: &mut Completions) {}
    }

    fn editor_with_history(entries: &[&str]) -> Editor {
        let mut history = RingHistory::new(16);
        for entry in entries {
            history.add(entry);
        }
        let mut editor = Editor::new();
        editor.push_mode(Box::new(EmacsMode::new(SearchDriver { history })));
        editor
    }

    fn buffer(editor: &mut Editor) -> String {
        editor.with_emacs(|cx| cx.mode.text().get_all()).unwrap()
    }

    fn cursor_col(editor: &mut Editor) -> usize {
        editor.with_emacs(|cx| cx.mode.cursor().column()).unwrap()
    }

    fn dispatch(editor: &mut Editor, key: Key) {
        editor.dispatch(key);
        editor.apply_end_requests();
    }

    #[test]
    fn test_search_finds_latest_match() {
        let mut editor = editor_with_history(&["apple", "banana", "band"]);
        dispatch(&mut editor, ctrl('R' as Key));
        assert_eq!(editor.mode_depth(), 2);
        for key in "ban".bytes() {
            dispatch(&mut editor, Key::from(key));
        }
        assert_eq!(buffer(&mut editor), "band");
        assert_eq!(cursor_col(&mut editor), 0);
    }

    #[test]
    fn test_search_ctrl_r_steps_back_and_backspace_returns() {
        let mut editor = editor_with_history(&["apple", "banana", "band"]);
        dispatch(&mut editor, ctrl('R' as Key));
        for key in "ban".bytes() {
            dispatch(&mut editor, Key::from(key));
        }
        dispatch(&mut editor, ctrl('R' as Key));
        assert_eq!(buffer(&mut editor), "banana");
        dispatch(&mut editor, keys::BACKSPACE);
        assert_eq!(buffer(&mut editor), "band");
    }

    #[test]
    fn test_search_no_match_restores_position() {
        let mut editor = editor_with_history(&["apple"]);
        dispatch(&mut editor, ctrl('R' as Key));
        dispatch(&mut editor, 'z' as Key);
        // The pattern character was rejected; the buffer is untouched.
        assert_eq!(buffer(&mut editor), "");
        assert_eq!(
            editor.with_search(|cx| cx.search.pattern().to_string()),
            Some(String::new())
        );
    }

    #[test]
    fn test_search_match_in_current_buffer() {
        let mut editor = editor_with_history(&[]);
        for key in "hello world".bytes() {
            dispatch(&mut editor, Key::from(key));
        }
        dispatch(&mut editor, ctrl('R' as Key));
        dispatch(&mut editor, 'w' as Key);
        assert_eq!(buffer(&mut editor), "hello world");
        assert_eq!(cursor_col(&mut editor), 6);
    }

    #[test]
    fn test_unbound_key_exits_search_and_forwards() {
        let mut editor = editor_with_history(&["echo hi"]);
        dispatch(&mut editor, ctrl('R' as Key));
        for key in "echo".bytes() {
            dispatch(&mut editor, Key::from(key));
        }
        assert_eq!(editor.mode_depth(), 2);
        // Ctrl-E is not a search binding: it ends the search and runs
        // cursor-end in the editing mode.
        dispatch(&mut editor, ctrl('E' as Key));
        assert_eq!(editor.mode_depth(), 1);
        assert_eq!(buffer(&mut editor), "echo hi");
        assert_eq!(cursor_col(&mut editor), 7);
    }

    #[test]
    fn test_interrupt_keeps_found_line() {
        let mut editor = editor_with_history(&["make all"]);
        dispatch(&mut editor, ctrl('R' as Key));
        dispatch(&mut editor, 'm' as Key);
        assert_eq!(buffer(&mut editor), "make all");
        dispatch(&mut editor, ctrl('C' as Key));
        assert_eq!(editor.mode_depth(), 1);
        assert_eq!(buffer(&mut editor), "make all");
    }
}
