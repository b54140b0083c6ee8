//! Multi-line text buffer with live cursors
//!
//! A [`Text`] is an ordered sequence of lines (byte strings without
//! newlines; there is always at least one line, possibly empty). A
//! [`Cursor`] is a live inter-character position inside a specific buffer:
//! every mutation of the buffer rewrites the positions of all outstanding
//! cursors so they keep pointing at the same logical place.
//!
//! Columns are byte offsets. Lines are stored as raw bytes and converted
//! lossily to `String` only at the retrieval edges, so a cursor sitting in
//! the middle of a multi-byte sequence can never make an edit panic.
//!
//! Cursors are cheap shared handles. Each one holds an `Rc<Cell<Pos>>`; the
//! buffer keeps a registry of `Weak` references to every live position and
//! walks it after each edit, pruning entries whose handles have been
//! dropped. Cloning a cursor shares the position, so a clone observes the
//! same adjustments as the original.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Which side of an insertion a cursor sitting exactly at the insertion
/// point ends up on: `Left` moves it with the inserted text, `Right` leaves
/// it before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    line: usize,
    column: usize,
}

#[derive(Debug, Default)]
struct TextInner {
    lines: Vec<Vec<u8>>,
    cursors: Vec<Weak<Cell<Pos>>>,
}

impl TextInner {
    /// Visit every live cursor position, dropping dead registry entries on
    /// the way.
    fn for_each_cursor(&mut self, mut f: impl FnMut(&mut Pos)) {
        self.cursors.retain(|weak| match weak.upgrade() {
            Some(cell) => {
                let mut pos = cell.get();
                f(&mut pos);
                cell.set(pos);
                true
            }
            None => false,
        });
    }
}

/// Extract the bytes between two (unordered) positions, with a `b'\n'` at
/// each traversed line boundary.
fn range_bytes(lines: &[Vec<u8>], a: Pos, b: Pos) -> Vec<u8> {
    let (from, to) = if (b.line, b.column) < (a.line, a.column) {
        (b, a)
    } else {
        (a, b)
    };

    let mut result = Vec::new();
    for line in from.line..=to.line {
        let bytes = &lines[line];
        let start = if line == from.line { from.column.min(bytes.len()) } else { 0 };
        let end = if line == to.line { to.column.min(bytes.len()) } else { bytes.len() };
        result.extend_from_slice(&bytes[start..end]);
        if line != to.line {
            result.push(b'\n');
        }
    }
    result
}

/// A live position within a [`Text`], preserved across edits.
#[derive(Debug, Clone)]
pub struct Cursor {
    pos: Rc<Cell<Pos>>,
    text: Weak<RefCell<TextInner>>,
}

impl Cursor {
    /// A cursor attached to no buffer. Compares below every valid cursor.
    pub fn invalid() -> Self {
        Self {
            pos: Rc::new(Cell::new(Pos { line: 0, column: 0 })),
            text: Weak::new(),
        }
    }

    fn attach(inner: &Rc<RefCell<TextInner>>, line: usize, column: usize) -> Self {
        let pos = Rc::new(Cell::new(Pos { line, column }));
        inner.borrow_mut().cursors.push(Rc::downgrade(&pos));
        Self {
            pos,
            text: Rc::downgrade(inner),
        }
    }

    /// Is this cursor attached to a live buffer?
    pub fn is_valid(&self) -> bool {
        self.text.upgrade().is_some()
    }

    pub fn line(&self) -> usize {
        self.pos.get().line
    }

    pub fn column(&self) -> usize {
        self.pos.get().column
    }

    /// The byte to the left of the cursor, or `None` at the very start (and
    /// for invalid cursors). A line boundary reads as `b'\n'`.
    pub fn left(&self) -> Option<u8> {
        let inner = self.text.upgrade()?;
        let inner = inner.borrow();
        let prev = self.peek(&inner, -1, 0);
        range_bytes(&inner.lines, prev, self.pos.get())
            .first()
            .copied()
    }

    /// The byte to the right of the cursor, or `None` at the very end.
    pub fn right(&self) -> Option<u8> {
        let inner = self.text.upgrade()?;
        let inner = inner.borrow();
        let next = self.peek(&inner, 1, 0);
        range_bytes(&inner.lines, self.pos.get(), next)
            .first()
            .copied()
    }

    /// A new cursor displaced by `dy` lines (clamped, no wrap) and then `dx`
    /// columns, wrapping over the virtual newline at either end of a line.
    /// The final column is clamped to the destination line.
    pub fn moved(&self, dx: i32, dy: i32) -> Cursor {
        let Some(inner_rc) = self.text.upgrade() else {
            return Cursor::invalid();
        };
        let target = self.peek(&inner_rc.borrow(), dx, dy);
        Cursor::attach(&inner_rc, target.line, target.column)
    }

    /// Movement arithmetic without allocating a handle.
    fn peek(&self, inner: &TextInner, dx: i32, dy: i32) -> Pos {
        let num = inner.lines.len() as i64;
        let pos = self.pos.get();
        let mut line = (pos.line as i64 + dy as i64).clamp(0, num - 1);
        let mut column = pos.column as i64 + dx as i64;
        while dx != 0 && column < 0 && line > 0 {
            line -= 1;
            column += inner.lines[line as usize].len() as i64 + 1;
        }
        while dx != 0 && column > inner.lines[line as usize].len() as i64 && line < num - 1 {
            column -= inner.lines[line as usize].len() as i64 + 1;
            line += 1;
        }
        column = column.clamp(0, inner.lines[line as usize].len() as i64);
        Pos {
            line: line as usize,
            column: column as usize,
        }
    }

    fn order_key(&self) -> (bool, usize, usize) {
        let pos = self.pos.get();
        (self.is_valid(), pos.line, pos.column)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl Eq for Cursor {}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// A multi-line text buffer.
#[derive(Debug)]
pub struct Text {
    inner: Rc<RefCell<TextInner>>,
}

impl Default for Text {
    fn default() -> Self {
        Self::new()
    }
}

impl Text {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TextInner {
                lines: vec![Vec::new()],
                cursors: Vec::new(),
            })),
        }
    }

    fn owns(&self, cursor: &Cursor) -> bool {
        cursor
            .text
            .upgrade()
            .is_some_and(|rc| Rc::ptr_eq(&rc, &self.inner))
    }

    pub fn num_lines(&self) -> usize {
        self.inner.borrow().lines.len()
    }

    /// The whole buffer, lines joined with `'\n'`. Invalid UTF-8 is
    /// replaced.
    pub fn get_all(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow().lines.join(&b'\n')).into_owned()
    }

    /// One line as text, without its newline. Out-of-range lines read as
    /// empty.
    pub fn line(&self, line: usize) -> String {
        String::from_utf8_lossy(
            self.inner
                .borrow()
                .lines
                .get(line)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        )
        .into_owned()
    }

    /// One line as raw bytes.
    pub fn line_bytes(&self, line: usize) -> Vec<u8> {
        self.inner
            .borrow()
            .lines
            .get(line)
            .cloned()
            .unwrap_or_default()
    }

    /// Byte length of one line.
    pub fn line_len(&self, line: usize) -> usize {
        self.inner.borrow().lines.get(line).map_or(0, Vec::len)
    }

    /// The text between two cursors (in either order). Cursors from another
    /// buffer yield the empty string.
    pub fn get(&self, from: &Cursor, to: &Cursor) -> String {
        if !self.owns(from) || !self.owns(to) {
            return String::new();
        }
        let bytes = range_bytes(&self.inner.borrow().lines, from.pos.get(), to.pos.get());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Cursor at the start of `line`, clamped into range; past the last
    /// line it degrades to [`Text::end`].
    pub fn begin_line(&self, line: i64) -> Cursor {
        if line >= self.num_lines() as i64 {
            return self.end();
        }
        Cursor::attach(&self.inner, line.max(0) as usize, 0)
    }

    /// Cursor at the end of `line`, clamped into range; before the first
    /// line it degrades to [`Text::begin`].
    pub fn end_line(&self, line: i64) -> Cursor {
        if line < 0 {
            return self.begin();
        }
        let line = (line as usize).min(self.num_lines() - 1);
        let column = self.inner.borrow().lines[line].len();
        Cursor::attach(&self.inner, line, column)
    }

    /// Cursor at the very start of the buffer.
    pub fn begin(&self) -> Cursor {
        self.begin_line(0)
    }

    /// Cursor at the very end of the buffer.
    pub fn end(&self) -> Cursor {
        self.end_line(self.num_lines() as i64 - 1)
    }

    /// Insert `text` at `pos`, splitting lines at each `'\n'`. Cursors at or
    /// after the insertion point are adjusted per `rel`; see [`Insert`].
    pub fn insert(&mut self, rel: Insert, pos: &Cursor, text: &str) {
        if !self.owns(pos) {
            return;
        }
        let bytes = text.as_bytes();
        let mut inner = self.inner.borrow_mut();
        let Pos { line, column } = pos.pos.get();
        let column = column.min(inner.lines[line].len());

        let rest_of_line = inner.lines[line].split_off(column);

        let mut last = line;
        for (n, chunk) in bytes.split(|&b| b == b'\n').enumerate() {
            if n == 0 {
                inner.lines[line].extend_from_slice(chunk);
            } else {
                last += 1;
                inner.lines.insert(last, chunk.to_vec());
            }
        }
        inner.lines[last].extend_from_slice(&rest_of_line);
        let added_lines = last - line;

        // Column adjustment for cursors after the insertion point on the
        // same line: the tail after the final inserted newline replaces the
        // columns before them.
        let delta: i64 = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(nl) => (bytes.len() - nl - 1) as i64 - column as i64,
            None => bytes.len() as i64,
        };
        let threshold = column
            + match rel {
                Insert::Left => 0,
                Insert::Right => 1,
            };

        inner.for_each_cursor(|p| {
            if p.line == line && p.column >= threshold {
                p.line += added_lines;
                p.column = (p.column as i64 + delta).max(0) as usize;
            } else if p.line > line {
                p.line += added_lines;
            }
        });
    }

    /// Delete the range between two cursors (in either order). Cursors
    /// inside the range collapse to its start; cursors behind it shift up.
    pub fn delete(&mut self, from: &Cursor, to: &Cursor) {
        if !self.owns(from) || !self.owns(to) {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        let (mut a, mut b) = (from.pos.get(), to.pos.get());
        if (b.line, b.column) < (a.line, a.column) {
            std::mem::swap(&mut a, &mut b);
        }
        a.column = a.column.min(inner.lines[a.line].len());
        b.column = b.column.min(inner.lines[b.line].len());

        let suffix = inner.lines[b.line][b.column..].to_vec();
        inner.lines[a.line].truncate(a.column);
        inner.lines[a.line].extend_from_slice(&suffix);
        inner.lines.drain(a.line + 1..=b.line);

        let removed = b.line - a.line;
        inner.for_each_cursor(|p| {
            if p.line > a.line || (p.line == a.line && p.column > a.column) {
                if p.line < b.line || (p.line == b.line && p.column < b.column) {
                    // Inside the deleted range.
                    *p = a;
                } else if p.line == b.line {
                    // After the deletion on its end line.
                    p.line = a.line;
                    p.column = p.column + a.column - b.column;
                } else {
                    // On a later line.
                    p.line -= removed;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_with(content: &str) -> Text {
        let mut t = Text::new();
        let begin = t.begin();
        t.insert(Insert::Left, &begin, content);
        t
    }

    #[test]
    fn test_new_text_has_one_empty_line() {
        let t = Text::new();
        assert_eq!(t.num_lines(), 1);
        assert_eq!(t.get_all(), "");
        assert_eq!(t.begin(), t.end());
    }

    #[test]
    fn test_insert_then_get_round_trips() {
        for s in ["hello", "a\nb", "\n", "one\ntwo\nthree", ""] {
            let t = text_with(s);
            assert_eq!(t.get_all(), s);
            assert_eq!(t.num_lines(), s.matches('\n').count() + 1);
        }
    }

    #[test]
    fn test_cursor_wrap_forward() {
        let t = text_with("ab\ncd");
        let c = t.end_line(0);
        assert_eq!((c.line(), c.column()), (0, 2));
        let c = c.moved(1, 0);
        assert_eq!((c.line(), c.column()), (1, 0));
        let c = c.moved(1, 0);
        assert_eq!((c.line(), c.column()), (1, 1));
    }

    #[test]
    fn test_cursor_wrap_backward_across_empty_line() {
        let t = text_with("x\n\ny");
        let c = t.begin_line(2);
        let c = c.moved(-1, 0);
        assert_eq!((c.line(), c.column()), (1, 0));
        let c = c.moved(-1, 0);
        assert_eq!((c.line(), c.column()), (0, 1));
    }

    #[test]
    fn test_vertical_motion_clamps_without_wrap() {
        let t = text_with("long line\nab");
        let c = t.end_line(0).moved(0, 1);
        assert_eq!((c.line(), c.column()), (1, 2));
        // Off the bottom: stays put.
        let c = c.moved(0, 5);
        assert_eq!(c.line(), 1);
    }

    #[test]
    fn test_insert_updates_trailing_cursors() {
        let mut t = text_with("hello");
        let c1 = t.begin();
        let c2 = t.end_line(0);
        let at = t.begin().moved(2, 0);
        t.insert(Insert::Left, &at, "XY\nZ");
        assert_eq!(t.get_all(), "heXY\nZllo");
        assert_eq!((c1.line(), c1.column()), (0, 0));
        assert_eq!((c2.line(), c2.column()), (1, 4));
    }

    #[test]
    fn test_insert_left_vs_right_at_point() {
        let mut t = text_with("ab");
        let at = t.begin().moved(1, 0);
        t.insert(Insert::Left, &at, "X");
        // Left: the cursor at the insertion point moves with the text.
        assert_eq!((at.line(), at.column()), (0, 2));

        let mut t = text_with("ab");
        let at = t.begin().moved(1, 0);
        t.insert(Insert::Right, &at, "X");
        // Right: it stays before the inserted text.
        assert_eq!((at.line(), at.column()), (0, 1));
    }

    #[test]
    fn test_delete_collapses_inner_cursors() {
        let mut t = text_with("abcdef");
        let inside = t.begin().moved(3, 0);
        let after = t.begin().moved(5, 0);
        let from = t.begin().moved(1, 0);
        let to = t.begin().moved(4, 0);
        t.delete(&from, &to);
        assert_eq!(t.get_all(), "aef");
        assert_eq!((inside.line(), inside.column()), (0, 1));
        assert_eq!((after.line(), after.column()), (0, 2));
    }

    #[test]
    fn test_delete_across_lines() {
        let mut t = text_with("one\ntwo\nthree");
        let below = t.begin_line(2).moved(2, 0);
        let from = t.begin().moved(2, 0);
        let to = t.begin_line(1).moved(1, 0);
        t.delete(&from, &to);
        assert_eq!(t.get_all(), "onwo\nthree");
        assert_eq!((below.line(), below.column()), (1, 2));
    }

    #[test]
    fn test_delete_order_normalized() {
        let mut t = text_with("abcd");
        let from = t.begin().moved(3, 0);
        let to = t.begin().moved(1, 0);
        t.delete(&from, &to);
        assert_eq!(t.get_all(), "ad");
    }

    #[test]
    fn test_get_delete_insert_round_trip() {
        let mut t = text_with("alpha\nbeta\ngamma");
        let a = t.begin().moved(2, 0);
        let b = t.begin_line(2).moved(3, 0);
        let got = t.get(&a, &b);
        assert_eq!(got, "pha\nbeta\ngam");
        t.delete(&a, &b);
        t.insert(Insert::Left, &a, &got);
        assert_eq!(t.get_all(), "alpha\nbeta\ngamma");
    }

    #[test]
    fn test_left_and_right() {
        let t = text_with("ab\ncd");
        assert_eq!(t.begin().left(), None);
        assert_eq!(t.begin().right(), Some(b'a'));
        assert_eq!(t.end().right(), None);
        // A line boundary reads as a newline.
        assert_eq!(t.begin_line(1).left(), Some(b'\n'));
    }

    #[test]
    fn test_begin_end_clamping() {
        let t = text_with("one\ntwo");
        assert_eq!(t.begin_line(99), t.end());
        assert_eq!(t.begin_line(-3).line(), 0);
        assert_eq!(t.end_line(-1), t.begin());
        assert_eq!(t.end_line(99).column(), 3);
    }

    #[test]
    fn test_foreign_cursor_is_ignored() {
        let mut a = text_with("aaa");
        let b = text_with("bbb");
        let foreign = b.begin();
        a.insert(Insert::Left, &foreign, "zzz");
        assert_eq!(a.get_all(), "aaa");
        assert_eq!(a.get(&foreign, &foreign), "");
    }

    #[test]
    fn test_clone_shares_position() {
        let mut t = text_with("abc");
        let c = t.begin();
        let d = c.clone();
        let begin = t.begin();
        t.insert(Insert::Left, &begin, "xy");
        assert_eq!(c.column(), 2);
        assert_eq!(c.column(), d.column());
    }

    #[test]
    fn test_mid_character_edit_does_not_panic() {
        // Columns are bytes: a cursor can sit inside a multi-byte sequence
        // and deletion still proceeds bytewise.
        let mut t = text_with("caf\u{e9}s");
        let end = t.end();
        assert_eq!(end.column(), 6);
        let mid = end.moved(-2, 0);
        t.delete(&mid, &mid.moved(1, 0));
        assert_eq!(t.line_len(0), 5);
        // The mangled byte shows up as a replacement in string form.
        assert!(t.get_all().starts_with("caf"));
    }

    #[test]
    fn test_cursor_invariant_in_bounds() {
        let mut t = text_with("abc\ndefg");
        let cursors: Vec<Cursor> = (0..4).map(|n| t.begin().moved(n * 2, 0)).collect();
        let from = t.begin().moved(1, 0);
        let to = t.begin_line(1).moved(2, 0);
        t.delete(&from, &to);
        let begin = t.begin();
        t.insert(Insert::Left, &begin, "q\nr");
        for c in &cursors {
            assert!(c.line() < t.num_lines());
            assert!(c.column() <= t.line_len(c.line()));
        }
    }

    #[test]
    fn test_invalid_cursor() {
        let c = Cursor::invalid();
        assert!(!c.is_valid());
        assert_eq!(c.left(), None);
        assert!(!c.moved(1, 0).is_valid());
        assert!(c < text_with("x").begin());
    }
}
