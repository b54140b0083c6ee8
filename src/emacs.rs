//! Emacs-style editing mode
//!
//! [`EmacsMode`] combines the text buffer, a cursor, history browsing with
//! a draft cache, tab completion and line acceptance into the editing
//! surface a shell or REPL embeds. Host integration goes through the
//! [`Driver`] trait: the host executes accepted lines and can supply a
//! history, completions, prompts and a line-completeness check.
//!
//! Commands are free functions dispatched by name through the binding table
//! built in [`default_bindings`]; printable keys fall through to
//! `insert-char` without being bound individually.

use std::collections::{BTreeSet, HashMap};

use nix::sys::signal::Signal;

use crate::bindings::{Command, KeyBindings};
use crate::editor::Editor;
use crate::history::{History, HistoryCursor};
use crate::key::{alt, ctrl, is_printable, keys, Key, KeyCombination};
use crate::mode::{Lookup, Mode};
use crate::term::decorated::{Attribute, DecoratedText};
use crate::term::{signal_foreground, Terminal};
use crate::text::{Cursor, Insert, Text};

/// A completion: the prefix of the word it completes (as displayed in
/// listings) and the suffix that insertion would add.
pub type Completion = (String, String);
pub type Completions = BTreeSet<Completion>;

/// Host-side behavior of an [`EmacsMode`].
pub trait Driver {
    /// Run an accepted line. The terminal is suspended around this call, so
    /// the host gets a clean tty.
    fn execute(&mut self, line: &str);

    /// Is the buffer a complete input? When false, accept-line inserts a
    /// newline instead of executing.
    fn text_is_complete(&mut self, text: &str) -> bool {
        let _ = text;
        true
    }

    /// The prompt for a given buffer line.
    fn prompt(&mut self, line: usize) -> String {
        if line == 0 {
            "$ ".to_string()
        } else {
            "> ".to_string()
        }
    }

    /// The history log, if the host keeps one.
    fn history(&mut self) -> Option<&mut dyn History> {
        None
    }

    /// Completions for the buffer with the cursor at byte `offset` of
    /// `text`.
    fn completions(&mut self, text: &str, offset: usize, matches: &mut Completions) {
        let _ = (text, offset, matches);
    }
}

/// The Emacs-style editing mode.
pub struct EmacsMode {
    driver: Box<dyn Driver>,
    text: Text,
    cursor: Cursor,
    bindings: KeyBindings,
    /// Current history position; `None` means end-of-history.
    history_at: Option<HistoryCursor>,
    /// Unsaved edits made while browsing history, keyed by the position
    /// they belong to.
    edits: HashMap<HistoryCursor, String>,
    /// Set while consecutive tab presses accumulate; cleared by any other
    /// command.
    tab_latch: bool,
    hint: String,
}

impl EmacsMode {
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self::with_boxed_driver(Box::new(driver))
    }

    pub fn with_boxed_driver(driver: Box<dyn Driver>) -> Self {
        let text = Text::new();
        let cursor = text.begin();
        Self {
            driver,
            text,
            cursor,
            bindings: default_bindings(),
            history_at: None,
            edits: HashMap::new(),
            tab_latch: false,
            hint: String::new(),
        }
    }

    pub fn text(&self) -> &Text {
        &self.text
    }

    pub fn text_mut(&mut self) -> &mut Text {
        &mut self.text
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor.clone()
    }

    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    /// A line of advisory text shown under the buffer whenever the whole
    /// buffer fits on screen.
    pub fn set_hint_text(&mut self, text: &str) {
        self.hint = text.to_string();
    }

    //
    // Rendering
    //

    /// Draw the buffer to the terminal.
    pub fn render_to(&mut self, terminal: &mut Terminal) {
        let rows = terminal.num_rows();
        let cols = terminal.num_columns();
        let mut dt = DecoratedText::new();
        let (row, col) = self.render_into(&mut dt, rows, cols);
        terminal.set_text(&dt, row, col);
    }

    /// Build the decorated text for a `rows` x `cols` screen; returns the
    /// on-screen cursor position.
    pub(crate) fn render_into(
        &mut self,
        dt: &mut DecoratedText,
        rows: usize,
        cols: usize,
    ) -> (usize, usize) {
        let mut row = self.cursor.line();
        let mut col = self.cursor.column().min(self.text.line_len(row));

        let mut start_line = 0usize;
        let mut end_line = self.text.num_lines();
        // Way more buffer than screen: render a window around the cursor
        // and let prepare() do the fine clipping.
        if end_line > 2 * rows {
            start_line = start_line.max(row.saturating_sub(rows));
            end_line = end_line.min(row + rows);
        }
        let chars_on_screen = rows * cols;

        for line in start_line..end_line {
            if line != start_line {
                dt.add(Attribute::Normal, "\n");
            }

            let prompt = self.driver.prompt(line);
            if line == row {
                col += prompt.len();
            }
            dt.add(Attribute::Normal, &prompt);

            // Bound the cost of pathological single lines.
            let mut text_this_line = self.text.line_bytes(line);
            if text_this_line.len() > 2 * chars_on_screen {
                let start_col = if line < row {
                    text_this_line.len() - chars_on_screen
                } else if line > row {
                    0
                } else {
                    col.saturating_sub(chars_on_screen)
                };
                let num = if line == row { 2 } else { 1 } * chars_on_screen;
                let end = (start_col + num).min(text_this_line.len());
                text_this_line = text_this_line[start_col..end].to_vec();
                if line == row {
                    col -= start_col;
                }
            }
            dt.add_bytes(Attribute::Normal, &text_this_line);
        }

        if start_line == 0 && end_line == self.text.num_lines() && !self.hint.is_empty() {
            dt.add(Attribute::Normal, &format!("\n{}", self.hint));
        }

        (row - start_line, col)
    }

    //
    // History
    //

    /// The current history position, with "unset" resolved to the log's
    /// end. `None` when the driver has no history at all.
    pub fn history_position(&mut self) -> Option<HistoryCursor> {
        let at = self.history_at;
        let history = self.driver.history()?;
        Some(at.unwrap_or_else(|| history.end()))
    }

    /// Move to a history position, stashing the current buffer as a draft
    /// and restoring any draft recorded for the destination. Returns false
    /// if the position is current, missing, or empty.
    pub fn set_history_position(&mut self, pos: HistoryCursor) -> bool {
        let Some(prev) = self.history_position() else {
            return false;
        };
        if pos == prev {
            return false;
        }
        self.edits.insert(prev, self.text.get_all());

        let Some(history) = self.driver.history() else {
            return false;
        };
        let draft = self.edits.get(&pos);
        let entry = match draft {
            Some(text) => text.clone(),
            None => history.get(pos),
        };
        if entry.is_empty() && pos != history.end() && draft.is_none() {
            return false;
        }

        self.history_at = Some(pos);
        let (begin, end) = (self.text.begin(), self.text.end());
        self.text.delete(&begin, &end);
        let begin = self.text.begin();
        self.text.insert(Insert::Left, &begin, &entry);
        true
    }

    /// Jump to end-of-history, abandoning the draft cache.
    pub fn set_history_position_to_end(&mut self) {
        self.history_at = None;
        self.edits.clear();
    }

    pub fn history_previous(&mut self) -> bool {
        let Some(pos) = self.history_position() else {
            return false;
        };
        let Some(history) = self.driver.history() else {
            return false;
        };
        if pos == history.begin() {
            return false;
        }
        let target = history.previous(pos);
        self.set_history_position(target)
    }

    pub fn history_next(&mut self) -> bool {
        let Some(pos) = self.history_position() else {
            return false;
        };
        let Some(history) = self.driver.history() else {
            return false;
        };
        if pos == history.end() {
            return false;
        }
        let target = history.next(pos);
        self.set_history_position(target)
    }

    //
    // Acceptance and execution
    //

    /// Accept the buffer: execute it if the driver deems it complete,
    /// otherwise insert a literal newline. Returns whether it executed.
    pub fn accept_line(&mut self, terminal: Option<&mut Terminal>) -> bool {
        let line = self.text.get_all();
        if self.driver.text_is_complete(&line) {
            self.do_execute(&line, terminal);
            let (begin, end) = (self.text.begin(), self.text.end());
            self.text.delete(&begin, &end);
            true
        } else {
            let cursor = self.cursor.clone();
            self.text.insert(Insert::Left, &cursor, "\n");
            false
        }
    }

    /// Commit the display, suspend the terminal and run `line` through the
    /// driver, recording it in history.
    pub fn do_execute(&mut self, line: &str, terminal: Option<&mut Terminal>) {
        match terminal {
            Some(terminal) => {
                // Make sure what we execute is what is on screen, and make
                // it permanent.
                self.hint.clear();
                self.render_to(terminal);
                terminal.commit(true);
                let _suspended = terminal.suspend();
                self.execute_with_history(line);
            }
            None => self.execute_with_history(line),
        }
    }

    fn execute_with_history(&mut self, line: &str) {
        let has_history = match self.driver.history() {
            Some(history) => {
                history.add(line);
                true
            }
            None => false,
        };
        self.driver.execute(line);
        if has_history {
            self.set_history_position_to_end();
        }
    }

    //
    // Tab completion
    //

    pub fn tab_complete(&mut self, mut terminal: Option<&mut Terminal>) {
        let line = self.text.get_all();
        let offset = self.text.get(&self.text.begin(), &self.cursor).len();
        let mut matches = Completions::new();
        self.driver.completions(&line, offset, &mut matches);

        // A unique completion just gets inserted.
        if matches.len() == 1 {
            let suffix = matches.iter().next().map(|m| m.1.clone()).unwrap_or_default();
            let cursor = self.cursor.clone();
            self.text.insert(Insert::Left, &cursor, &suffix);
            return;
        }
        if let Some(terminal) = terminal.as_deref_mut() {
            terminal.bell();
        }
        if matches.is_empty() {
            return;
        }

        if self.tab_latch {
            // Second consecutive tab: list the candidates.
            match terminal.as_deref_mut() {
                Some(terminal) => {
                    let hint = std::mem::take(&mut self.hint);
                    if !hint.is_empty() {
                        self.render_to(terminal);
                    }
                    terminal.commit(true);
                    print_in_columns(terminal, &matches);
                    self.hint = hint;
                }
                None => {
                    let flat: Vec<String> = matches
                        .iter()
                        .map(|(prefix, suffix)| format!("{prefix}{suffix}"))
                        .collect();
                    println!("{}", flat.join(" "));
                }
            }
        }
        self.tab_latch = true;

        // Insert the longest common prefix of the suffixes.
        let mut it = matches.iter();
        let mut common = it.next().map(|m| m.1.clone()).unwrap_or_default();
        for (_, name) in it {
            let shared = common
                .bytes()
                .zip(name.bytes())
                .take_while(|(a, b)| a == b)
                .count();
            common.truncate(shared);
        }
        let cursor = self.cursor.clone();
        self.text.insert(Insert::Left, &cursor, &common);
    }
}

impl Mode for EmacsMode {
    fn handler(&mut self, combo: &KeyCombination) -> Lookup {
        let command = match combo.single() {
            Some(key) if is_printable(key) => Some(INSERT_CHAR),
            _ => self.bindings.get(combo),
        };
        if command != Some(TAB_COMPLETE) {
            self.tab_latch = false;
        }
        match command {
            Some(command) => Lookup::Bound(command),
            None => Lookup::Unbound,
        }
    }

    fn render(&mut self, _below: &mut [Box<dyn Mode>], terminal: &mut Terminal) {
        self.render_to(terminal);
    }

    fn as_emacs(&mut self) -> Option<&mut EmacsMode> {
        Some(self)
    }
}

/// Print completions in as many columns as fit with two-space gutters,
/// committing them above the edit line.
fn print_in_columns(terminal: &mut Terminal, values: &Completions) {
    const GUTTER: usize = 2;
    // Leave the last column alone; writing there can wrap a line by itself.
    let term_cols = terminal.num_columns().saturating_sub(2);

    let mut num_columns = ((term_cols + GUTTER) / (1 + GUTTER)).clamp(1, values.len().max(1));
    while num_columns >= 1 {
        let mut widths = vec![0usize; num_columns];
        let mut total_width = (num_columns - 1) * GUTTER;

        let mut measured = 0;
        for (prefix, suffix) in values {
            if total_width > term_cols {
                break;
            }
            let width = prefix.len() + suffix.len();
            let slot = &mut widths[measured % num_columns];
            if width > *slot {
                total_width += width - *slot;
                *slot = width;
            }
            measured += 1;
        }

        if total_width <= term_cols || num_columns == 1 {
            let mut text = DecoratedText::new();
            let mut gap = 0;
            for (n, (prefix, suffix)) in values.iter().enumerate() {
                if n % num_columns != 0 {
                    text.add(Attribute::Normal, &" ".repeat(gap));
                } else if n != 0 {
                    text.add(Attribute::Normal, "\n");
                }
                text.add(Attribute::Normal, prefix);
                text.add(Attribute::Normal, suffix);
                gap = (GUTTER + widths[n % num_columns])
                    .saturating_sub(prefix.len() + suffix.len());
            }
            terminal.set_text(&text, 0, 0);
            terminal.commit(true);
            return;
        } else if measured < num_columns {
            // Ran dry on the first row already; jump down to what we
            // actually measured.
            num_columns = measured + 1;
        }
        num_columns -= 1;
    }
}

//
// Word motion
//

fn word_left(mut cursor: Cursor) -> Cursor {
    while matches!(cursor.left(), Some(b) if b.is_ascii_whitespace()) {
        cursor = cursor.moved(-1, 0);
    }
    while matches!(cursor.left(), Some(b) if !b.is_ascii_whitespace()) {
        cursor = cursor.moved(-1, 0);
    }
    cursor
}

fn word_right(mut cursor: Cursor) -> Cursor {
    while matches!(cursor.right(), Some(b) if !b.is_ascii_whitespace()) {
        cursor = cursor.moved(1, 0);
    }
    while matches!(cursor.right(), Some(b) if b.is_ascii_whitespace()) {
        cursor = cursor.moved(1, 0);
    }
    cursor
}

//
// Commands
//

fn insert_char(editor: &mut Editor, combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let add: String = combo
            .keys()
            .iter()
            .filter_map(|&key| u8::try_from(key).ok())
            .map(char::from)
            .collect();
        let cursor = cx.mode.cursor();
        cx.mode.text_mut().insert(Insert::Left, &cursor, &add);
    });
}

fn insert_newline(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let cursor = cx.mode.cursor();
        cx.mode.text_mut().insert(Insert::Left, &cursor, "\n");
    });
}

fn cursor_left(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.set_cursor(cx.mode.cursor().moved(-1, 0)));
}

fn cursor_right(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.set_cursor(cx.mode.cursor().moved(1, 0)));
}

fn cursor_up(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.set_cursor(cx.mode.cursor().moved(0, -1)));
}

fn cursor_down(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.set_cursor(cx.mode.cursor().moved(0, 1)));
}

fn cursor_word_left(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.set_cursor(word_left(cx.mode.cursor())));
}

fn cursor_word_right(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.set_cursor(word_right(cx.mode.cursor())));
}

fn cursor_up_or_history_previous(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let moved = cx.mode.cursor().moved(0, -1);
        if moved != cx.mode.cursor() {
            cx.mode.set_cursor(moved);
        } else {
            cx.mode.history_previous();
        }
    });
}

fn cursor_down_or_history_next(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let moved = cx.mode.cursor().moved(0, 1);
        if moved != cx.mode.cursor() {
            cx.mode.set_cursor(moved);
        } else {
            cx.mode.history_next();
        }
    });
}

/// Go to the start of the current line; from there, the start of the
/// previous one.
fn cursor_home(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let line = cx.mode.cursor().moved(-1, 0).line();
        cx.mode.set_cursor(cx.mode.text().begin_line(line as i64));
    });
}

fn cursor_end(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let line = cx.mode.cursor().moved(1, 0).line();
        cx.mode.set_cursor(cx.mode.text().end_line(line as i64));
    });
}

fn delete_left(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let (from, to) = (cx.mode.cursor().moved(-1, 0), cx.mode.cursor());
        cx.mode.text_mut().delete(&from, &to);
    });
}

fn delete_right(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| delete_right_in(cx.mode));
}

fn delete_right_in(mode: &mut EmacsMode) {
    let (from, to) = (mode.cursor(), mode.cursor().moved(1, 0));
    mode.text_mut().delete(&from, &to);
}

/// Delete to end of line, or join with the next line when already there.
fn delete_to_end(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let cursor = cx.mode.cursor();
        if cursor.line() == cursor.moved(1, 0).line() {
            let end = cx.mode.text().end_line(cursor.line() as i64);
            cx.mode.text_mut().delete(&cursor, &end);
        } else {
            let next = cx.mode.text().begin_line(cursor.line() as i64 + 1);
            cx.mode.text_mut().delete(&cursor, &next);
        }
    });
}

fn delete_line(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let mut line = cx.mode.cursor().line() as i64;
        if cx.mode.text().begin_line(line) == cx.mode.text().begin_line(line + 1) {
            line -= 1;
        }
        let (from, to) = (
            cx.mode.text().begin_line(line),
            cx.mode.text().begin_line(line + 1),
        );
        cx.mode.text_mut().delete(&from, &to);
    });
}

/// Ctrl-D: delete right, or end the mode when the buffer is empty.
fn delete_right_or_end_mode(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        if cx.mode.text().begin() == cx.mode.text().end() {
            *cx.end_mode = true;
        } else {
            delete_right_in(cx.mode);
        }
    });
}

fn delete_word_left(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let (from, to) = (word_left(cx.mode.cursor()), cx.mode.cursor());
        cx.mode.text_mut().delete(&from, &to);
    });
}

fn undo(_editor: &mut Editor, _combo: &KeyCombination) {
    // TODO: wire up an undo stack; the binding is reserved.
}

/// Ctrl-C: with an empty buffer, hand SIGINT to the foreground group; with
/// text, throw the line away.
fn cancel_or_sigint(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let Some(terminal) = cx.terminal else {
            return;
        };
        if cx.mode.text().begin() == cx.mode.text().end() {
            terminal.commit(false);
            let _suspended = terminal.suspend();
            signal_foreground(Signal::SIGINT);
        } else {
            terminal.commit(true);
            let (begin, end) = (cx.mode.text().begin(), cx.mode.text().end());
            cx.mode.text_mut().delete(&begin, &end);
            cx.mode.set_history_position_to_end();
        }
    });
}

fn sigquit(editor: &mut Editor, _combo: &KeyCombination) {
    if let Some(terminal) = editor.terminal_mut() {
        terminal.commit(true);
        let _suspended = terminal.suspend();
        signal_foreground(Signal::SIGQUIT);
    }
}

fn suspend(editor: &mut Editor, _combo: &KeyCombination) {
    if let Some(terminal) = editor.terminal_mut() {
        // The shell prints its own stopped-job line.
        terminal.commit(false);
        let _suspended = terminal.suspend();
        signal_foreground(Signal::SIGTSTP);
        // The text reappears on the next render.
    }
}

fn redisplay(editor: &mut Editor, _combo: &KeyCombination) {
    if let Some(terminal) = editor.terminal_mut() {
        terminal.redisplay();
    }
}

fn history_previous(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.history_previous());
}

fn history_next(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.history_next());
}

fn tab_complete(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.tab_complete(cx.terminal));
}

fn accept_line(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| cx.mode.accept_line(cx.terminal));
}

/// Ctrl-O: accept, then step to the entry after the one just run, for
/// replaying a stretch of history.
fn accept_line_and_history_next(editor: &mut Editor, _combo: &KeyCombination) {
    editor.with_emacs(|cx| {
        let pos = cx.mode.history_position();
        if cx.mode.accept_line(cx.terminal) {
            if let Some(pos) = pos {
                cx.mode.set_history_position(pos);
            }
            cx.mode.history_next();
        }
    });
}

pub(crate) const INSERT_CHAR: Command = Command::new("insert-char", insert_char);
const INSERT_NEWLINE: Command = Command::new("insert-newline", insert_newline);
const CURSOR_LEFT: Command = Command::new("cursor-left", cursor_left);
const CURSOR_RIGHT: Command = Command::new("cursor-right", cursor_right);
const CURSOR_UP: Command = Command::new("cursor-up", cursor_up);
const CURSOR_DOWN: Command = Command::new("cursor-down", cursor_down);
const CURSOR_WORD_LEFT: Command = Command::new("cursor-word-left", cursor_word_left);
const CURSOR_WORD_RIGHT: Command = Command::new("cursor-word-right", cursor_word_right);
const CURSOR_UP_OR_HISTORY_PREVIOUS: Command =
    Command::new("cursor-up-or-history-previous", cursor_up_or_history_previous);
const CURSOR_DOWN_OR_HISTORY_NEXT: Command =
    Command::new("cursor-down-or-history-next", cursor_down_or_history_next);
const CURSOR_HOME: Command = Command::new("cursor-home", cursor_home);
const CURSOR_END: Command = Command::new("cursor-end", cursor_end);
const DELETE_LEFT: Command = Command::new("delete-left", delete_left);
const DELETE_RIGHT: Command = Command::new("delete-right", delete_right);
const DELETE_TO_END: Command = Command::new("delete-end", delete_to_end);
const DELETE_LINE: Command = Command::new("delete-line", delete_line);
const DELETE_RIGHT_OR_END_MODE: Command =
    Command::new("delete-right-or-end-mode", delete_right_or_end_mode);
const DELETE_WORD_LEFT: Command = Command::new("delete-word-left", delete_word_left);
const UNDO: Command = Command::new("undo", undo);
const CANCEL_OR_SIGINT: Command = Command::new("cancel-or-sigint", cancel_or_sigint);
pub(crate) const SIGQUIT: Command = Command::new("sigquit", sigquit);
pub(crate) const SUSPEND: Command = Command::new("suspend", suspend);
pub(crate) const REDISPLAY: Command = Command::new("redisplay", redisplay);
const HISTORY_PREVIOUS: Command = Command::new("history-previous", history_previous);
const HISTORY_NEXT: Command = Command::new("history-next", history_next);
pub(crate) const TAB_COMPLETE: Command = Command::new("tab-complete", tab_complete);
const ACCEPT_LINE: Command = Command::new("accept-line", accept_line);
const ACCEPT_LINE_AND_HISTORY_NEXT: Command =
    Command::new("accept-line-and-history-next", accept_line_and_history_next);

/// The standard Emacs-mode binding table.
pub fn default_bindings() -> KeyBindings {
    let mut b = KeyBindings::new();
    b.bind(
        INSERT_NEWLINE,
        &[
            alt(keys::ENTER),
            ctrl(alt('M' as Key)),
            ctrl(alt('J' as Key)),
        ],
    );
    b.bind(CURSOR_LEFT, &[keys::LEFT, ctrl('B' as Key)]);
    b.bind(CURSOR_RIGHT, &[keys::RIGHT, ctrl('F' as Key)]);
    b.bind(CURSOR_UP, &[alt(keys::UP)]);
    b.bind(CURSOR_DOWN, &[alt(keys::DOWN)]);
    b.bind(
        CURSOR_WORD_LEFT,
        &[ctrl(keys::LEFT), alt(keys::LEFT), alt('b' as Key)],
    );
    b.bind(
        CURSOR_WORD_RIGHT,
        &[ctrl(keys::RIGHT), alt(keys::RIGHT), alt('f' as Key)],
    );
    b.bind(CURSOR_UP_OR_HISTORY_PREVIOUS, &[keys::UP]);
    b.bind(CURSOR_DOWN_OR_HISTORY_NEXT, &[keys::DOWN]);
    b.bind(CURSOR_HOME, &[ctrl('A' as Key), keys::HOME]);
    b.bind(CURSOR_END, &[ctrl('E' as Key), keys::END]);
    b.bind(DELETE_LEFT, &[keys::BACKSPACE, ctrl('H' as Key)]);
    b.bind(DELETE_RIGHT, &[keys::DELETE]);
    b.bind(DELETE_TO_END, &[ctrl('K' as Key)]);
    b.bind(DELETE_LINE, &[ctrl('U' as Key)]);
    b.bind(DELETE_RIGHT_OR_END_MODE, &[ctrl('D' as Key), keys::EOF]);
    b.bind(DELETE_WORD_LEFT, &[ctrl('W' as Key)]);
    b.bind(UNDO, &[ctrl('_' as Key)]);
    b.bind(CANCEL_OR_SIGINT, &[ctrl('C' as Key), keys::INTERRUPT]);
    b.bind(SIGQUIT, &[keys::QUIT]);
    b.bind(SUSPEND, &[ctrl('Z' as Key), keys::SUSPEND]);
    b.bind(REDISPLAY, &[ctrl('L' as Key)]);
    b.bind(HISTORY_PREVIOUS, &[ctrl('P' as Key), ctrl(keys::UP)]);
    b.bind(HISTORY_NEXT, &[ctrl('N' as Key), ctrl(keys::DOWN)]);
    b.bind(TAB_COMPLETE, &['\t' as Key]);
    b.bind(
        ACCEPT_LINE,
        &[keys::ENTER, ctrl('M' as Key), ctrl('J' as Key)],
    );
    b.bind(ACCEPT_LINE_AND_HISTORY_NEXT, &[ctrl('O' as Key)]);
    b.bind(crate::search::REVERSE_I_SEARCH, &[ctrl('R' as Key)]);
    b
}

/// Run `line` as if it had been typed and accepted, then put the buffer
/// back the way it was. This is the body of the command that
/// [`crate::editor::AsyncHandle::execute_line`] posts.
pub(crate) fn run_async_line(editor: &mut Editor, line: &str) {
    editor.with_emacs(|cx| {
        let mode = cx.mode;
        let saved_text = mode.text().get_all();
        let (saved_line, saved_col) = (mode.cursor().line(), mode.cursor().column());

        let (begin, end) = (mode.text().begin(), mode.text().end());
        mode.text_mut().delete(&begin, &end);
        let begin = mode.text().begin();
        mode.text_mut().insert(Insert::Left, &begin, line);

        mode.do_execute(line, cx.terminal);

        let (begin, end) = (mode.text().begin(), mode.text().end());
        mode.text_mut().delete(&begin, &end);
        let begin = mode.text().begin();
        mode.text_mut().insert(Insert::Left, &begin, &saved_text);
        let cursor = mode
            .text()
            .begin_line(saved_line as i64)
            .moved(saved_col as i32, 0);
        mode.set_cursor(cursor);
    });
}
