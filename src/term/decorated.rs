//! Offscreen text with attributes
//!
//! [`DecoratedText`] is the unit of rendering: a list of lines of
//! attributed bytes, built additively and then laid out against the
//! terminal's dimensions. Layout is two passes: wrap lines that are too
//! wide (preferring to break at a space, marking continuations with a
//! trailing backslash), then clip to a window of rows that keeps the cursor
//! near the middle. The cursor position is carried through both passes.

/// Display attribute of a cell. The renderer only distinguishes normal
/// output from error output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Attribute {
    #[default]
    Normal,
    Error,
}

/// One attributed byte.
#[derive(Debug, Clone, Copy)]
pub struct DecoratedChar {
    pub attr: Attribute,
    pub ch: u8,
}

impl DecoratedChar {
    fn new(attr: Attribute, ch: u8) -> Self {
        Self { attr, ch }
    }
}

impl PartialEq for DecoratedChar {
    /// The screen diff compares glyphs only; an attribute-only change never
    /// forces a repaint.
    fn eq(&self, other: &Self) -> bool {
        self.ch == other.ch
    }
}

impl Eq for DecoratedChar {}

/// A section of text decorated with terminal attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedText {
    lines: Vec<Vec<DecoratedChar>>,
}

impl Default for DecoratedText {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoratedText {
    pub fn new() -> Self {
        Self {
            lines: vec![Vec::new()],
        }
    }

    /// Append text under one attribute; each `'\n'` starts a new line.
    pub fn add(&mut self, attr: Attribute, text: &str) {
        self.add_bytes(attr, text.as_bytes());
    }

    /// Byte-level variant of [`DecoratedText::add`].
    pub fn add_bytes(&mut self, attr: Attribute, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                let mut line = Vec::new();
                line.reserve(80);
                self.lines.push(line);
            } else {
                self.lines
                    .last_mut()
                    .expect("decorated text always has a line")
                    .push(DecoratedChar::new(attr, b));
            }
        }
    }

    pub(crate) fn lines(&self) -> &[Vec<DecoratedChar>] {
        &self.lines
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    /// Lay the text out for a `max_rows` x `max_cols` screen, moving the
    /// cursor with its surrounding text.
    pub fn prepare(
        &mut self,
        max_rows: usize,
        max_cols: usize,
        cursor_row: &mut usize,
        cursor_col: &mut usize,
    ) {
        let max_cols = max_cols.max(2);

        // Wrap over-long lines. The list grows as we walk it; the tail we
        // split off is revisited on the next iteration.
        let mut line = 0;
        while line < self.lines.len() {
            // A line of exactly max_cols still wraps: the cursor needs a
            // spare column, and if it sits past the end it lands on the
            // continuation line we create.
            if self.lines[line].len() >= max_cols {
                let mut new_width = max_cols - 1;

                // Prefer to break at a space, within reason.
                let mut pos = new_width - 1;
                while pos + 16 > new_width && pos > max_cols / 2 {
                    if self.lines[line][pos].ch == b' ' {
                        new_width = pos + 1;
                        break;
                    }
                    pos -= 1;
                }

                let tail = self.lines[line].split_off(new_width);
                self.lines.insert(line + 1, tail);

                // Pad to full width and mark the continuation.
                self.lines[line].resize(max_cols, DecoratedChar::new(Attribute::Normal, b' '));
                self.lines[line][max_cols - 1] = DecoratedChar::new(Attribute::Normal, b'\\');

                if *cursor_row == line && *cursor_col >= new_width {
                    *cursor_row += 1;
                    *cursor_col -= new_width;
                } else if *cursor_row > line {
                    *cursor_row += 1;
                }
            }
            line += 1;
        }

        // Clip to a cursor-centered window if there are too many rows.
        if self.lines.len() > max_rows {
            let spare = self.lines.len() - max_rows;
            let first = (*cursor_row as i64 - (max_rows / 2) as i64)
                .clamp(0, spare as i64) as usize;
            self.lines.truncate(first + max_rows);
            self.lines.drain(..first);
            *cursor_row -= first;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_string(dt: &DecoratedText, n: usize) -> String {
        dt.lines()[n].iter().map(|c| c.ch as char).collect()
    }

    #[test]
    fn test_add_splits_on_newline() {
        let mut dt = DecoratedText::new();
        dt.add(Attribute::Normal, "ab\ncd\n");
        assert_eq!(dt.lines().len(), 3);
        assert_eq!(line_string(&dt, 0), "ab");
        assert_eq!(line_string(&dt, 1), "cd");
        assert_eq!(line_string(&dt, 2), "");
    }

    #[test]
    fn test_attribute_does_not_affect_equality() {
        let a = DecoratedChar::new(Attribute::Normal, b'x');
        let b = DecoratedChar::new(Attribute::Error, b'x');
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrap_marks_continuation() {
        let mut dt = DecoratedText::new();
        dt.add(Attribute::Normal, &"x".repeat(25));
        let (mut row, mut col) = (0, 25);
        dt.prepare(24, 20, &mut row, &mut col);
        assert_eq!(dt.lines().len(), 2);
        assert_eq!(dt.lines()[0].len(), 20);
        assert_eq!(dt.lines()[0][19].ch, b'\\');
        // Cursor rode the tail onto the continuation line.
        assert_eq!((row, col), (1, 25 - 19));
    }

    #[test]
    fn test_wrap_prefers_space() {
        let mut dt = DecoratedText::new();
        // A space close enough to the margin to be chosen as the break.
        let text = format!("{} tail!", "a".repeat(14));
        dt.add(Attribute::Normal, &text);
        let (mut row, mut col) = (0, 0);
        dt.prepare(24, 20, &mut row, &mut col);
        assert_eq!(dt.lines().len(), 2);
        assert_eq!(line_string(&dt, 1), "tail!");
    }

    #[test]
    fn test_wrap_cascades_very_long_line() {
        let mut dt = DecoratedText::new();
        dt.add(Attribute::Normal, &"y".repeat(60));
        let (mut row, mut col) = (0, 0);
        dt.prepare(24, 20, &mut row, &mut col);
        assert_eq!(dt.lines().len(), 4);
        for n in 0..3 {
            assert_eq!(dt.lines()[n][19].ch, b'\\');
        }
    }

    #[test]
    fn test_clip_keeps_cursor_near_middle() {
        let mut dt = DecoratedText::new();
        let text: Vec<String> = (0..40).map(|n| n.to_string()).collect();
        dt.add(Attribute::Normal, &text.join("\n"));
        let (mut row, mut col) = (30, 0);
        dt.prepare(10, 80, &mut row, &mut col);
        assert_eq!(dt.lines().len(), 10);
        assert_eq!(row, 5);
        assert_eq!(line_string(&dt, 5), "30");
    }

    #[test]
    fn test_clip_clamps_at_bottom() {
        let mut dt = DecoratedText::new();
        let text: Vec<String> = (0..12).map(|n| n.to_string()).collect();
        dt.add(Attribute::Normal, &text.join("\n"));
        let (mut row, mut col) = (11, 0);
        dt.prepare(10, 80, &mut row, &mut col);
        assert_eq!(dt.lines().len(), 10);
        assert_eq!(row, 9);
        assert_eq!(line_string(&dt, 9), "11");
    }

    #[test]
    fn test_small_text_untouched() {
        let mut dt = DecoratedText::new();
        dt.add(Attribute::Normal, "short");
        let (mut row, mut col) = (0, 3);
        dt.prepare(24, 80, &mut row, &mut col);
        assert_eq!(dt.lines().len(), 1);
        assert_eq!((row, col), (0, 3));
    }
}
