//! The terminal: raw-mode lifecycle, key input, incremental redraw
//!
//! Construction captures the tty attributes, installs the raw variant and
//! enters keypad-transmit mode; dropping the terminal commits whatever is on
//! screen and restores the attributes. A suspend depth lets [`SuspendGuard`]
//! hand the tty back to the shell (or a signal handler's foreground process)
//! and reliably reacquire it.
//!
//! Input is pumped through [`crate::keymap::KeyMap`]: `wait_for_key` polls
//! stdin together with a wake pipe so that another thread can interrupt the
//! wait by posting a byte (see `Editor::async_handle`), and decoded keys
//! queue up until `get_key` pops them.
//!
//! Output keeps a snapshot of what is currently on screen and updates it
//! cell by cell, moving the cursor with the cheapest capability the
//! terminal offers: `hpa`, then the parametric motions, then the
//! single-cell ones, with backspace-wrap (`bw`) as a last resort for moving
//! up. If positioning fails entirely the current text is committed and
//! drawn once more from scratch.

use std::io::{self, Write};
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{close, pipe, read, tcgetpgrp, write as fd_write, Pid};

use crate::key::{keys, Key};
use crate::keymap::KeyMap;
use crate::term::caps::{expand1, Caps};
use crate::term::decorated::{DecoratedChar, DecoratedText};
use crate::term::raw::TtyModes;
use crate::term::TermError;

const STDIN: RawFd = 0;
const STDOUT: RawFd = 1;

/// An interactive terminal. At most one should exist at a time.
pub struct Terminal {
    caps: Caps,
    tty: TtyModes,
    /// Suspension depth; attributes are raw exactly when this is zero.
    suspended: i32,

    keymap: KeyMap,
    pending: std::collections::VecDeque<Key>,
    /// Wake pipe (read end, write end) for interrupting `wait_for_key`.
    interrupt_fd: (RawFd, RawFd),

    /// Snapshot of the text currently on screen.
    screen: DecoratedText,
    rows: usize,
    cols: usize,
    /// Tracked cursor position within the snapshot. A column of -1 means
    /// unknown, forcing a `cr` before the next relative motion.
    cursor_row: i32,
    cursor_col: i32,

    /// Guard against recursing more than once through the commit-and-retry
    /// path when cursor positioning fails.
    retrying: bool,
    bell_enabled: bool,

    out: io::Stdout,
}

impl Terminal {
    /// Open the terminal on stdin/stdout: resolve capabilities, capture and
    /// replace the tty attributes, set up the key decoder and wake pipe.
    pub fn new() -> Result<Self, TermError> {
        let caps = Caps::from_env()?;
        let tty = TtyModes::capture(STDIN)?;

        let chars = tty.control_chars();
        let mut primary: Vec<(Key, Vec<u8>)> = vec![
            (keys::EOF, vec![chars.eof]),
            (keys::SUSPEND, vec![chars.susp]),
            (keys::INTERRUPT, vec![chars.intr]),
            (keys::QUIT, vec![chars.quit]),
        ];
        primary.extend(caps.key_seqs.iter().cloned());
        let keymap = KeyMap::new(primary);

        let interrupt_fd = pipe()?;

        let mut term = Self {
            caps,
            tty,
            suspended: 1,
            keymap,
            pending: std::collections::VecDeque::new(),
            interrupt_fd,
            screen: DecoratedText::new(),
            rows: 24,
            cols: 80,
            cursor_row: 0,
            cursor_col: -1,
            retrying: false,
            bell_enabled: true,
            out: io::stdout(),
        };
        term.enable();
        term.update_size();
        tracing::debug!(rows = term.rows, cols = term.cols, "terminal opened");
        Ok(term)
    }

    pub fn set_bell_enabled(&mut self, enabled: bool) {
        self.bell_enabled = enabled;
    }

    /// Leave suspension: install raw attributes and keypad-transmit mode.
    fn enable(&mut self) {
        self.suspended -= 1;
        if self.suspended == 0 {
            self.flush();
            if let Err(e) = self.tty.set_raw() {
                tracing::debug!("failed to enter raw mode: {e}");
            }
            Self::put(&mut self.out, &self.caps.smkx);
        }
    }

    /// Enter suspension: restore the original attributes.
    fn disable(&mut self) {
        if self.suspended == 0 {
            Self::put(&mut self.out, &self.caps.rmkx);
            self.flush();
            if let Err(e) = self.tty.restore() {
                tracing::debug!("failed to restore tty attributes: {e}");
            }
        }
        self.suspended += 1;
    }

    /// Temporarily hand the tty back; the returned guard reacquires it on
    /// drop, on every exit path.
    pub fn suspend(&mut self) -> SuspendGuard<'_> {
        self.disable();
        SuspendGuard { terminal: self }
    }

    //
    // Input
    //

    /// Block until at least one key (or a wake byte) is available.
    pub fn wait_for_key(&mut self) -> Result<(), TermError> {
        self.pump(true)
    }

    /// Non-blocking check for buffered or immediately readable keys.
    pub fn have_key(&mut self) -> Result<bool, TermError> {
        self.pump(false)?;
        Ok(!self.pending.is_empty())
    }

    /// Pop one decoded key, if any.
    pub fn get_key(&mut self) -> Option<Key> {
        self.pending.pop_front()
    }

    /// The write end of the wake pipe. Writing one byte makes
    /// `wait_for_key` return with [`keys::ASYNC_INTERRUPTED`].
    pub fn interrupt_fd(&self) -> RawFd {
        self.interrupt_fd.1
    }

    fn pump(&mut self, block: bool) -> Result<(), TermError> {
        while self.pending.is_empty() {
            // SAFETY: both fds stay open for the lifetime of self.
            let stdin_fd = unsafe { BorrowedFd::borrow_raw(STDIN) };
            let wake_fd = unsafe { BorrowedFd::borrow_raw(self.interrupt_fd.0) };
            let mut fds = [
                PollFd::new(&stdin_fd, PollFlags::POLLIN),
                PollFd::new(&wake_fd, PollFlags::POLLIN),
            ];
            loop {
                match poll(&mut fds, if block { -1 } else { 0 }) {
                    Ok(_) => break,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            let ready = |fd: &PollFd| {
                fd.revents()
                    .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
            };
            let stdin_ready = ready(&fds[0]);
            let wake_ready = ready(&fds[1]);

            if wake_ready {
                let mut byte = [0u8; 1];
                let _ = read(self.interrupt_fd.0, &mut byte);
                self.pending.push_back(keys::ASYNC_INTERRUPTED);
                break;
            }
            if !stdin_ready && !block {
                break;
            }

            // Anything queued for the screen should be visible before we
            // sit in read().
            self.flush();

            let mut byte = [0u8; 1];
            let n = loop {
                match read(STDIN, &mut byte) {
                    Ok(n) => break n,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
            };
            if n == 0 {
                // Terminal hung up; treat it as end-of-input.
                self.pending.push_back(keys::EOF);
                break;
            }

            tracing::trace!(byte = byte[0], "input byte");
            let decoded = self.keymap.feed(byte[0]);
            if self.keymap.take_bell() {
                self.bell();
            }
            self.pending.extend(decoded);
        }
        Ok(())
    }

    //
    // Output
    //

    /// Emit a string capability if present.
    fn put(out: &mut io::Stdout, cap: &Option<Vec<u8>>) -> bool {
        match cap {
            Some(seq) => {
                let _ = out.write_all(seq);
                true
            }
            None => false,
        }
    }

    /// Emit a one-parameter capability if present and expandable.
    fn put1(out: &mut io::Stdout, cap: &Option<Vec<u8>>, n: i32) -> bool {
        match cap.as_deref().and_then(|seq| expand1(seq, n)) {
            Some(bytes) => {
                let _ = out.write_all(&bytes);
                true
            }
            None => false,
        }
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    /// Emit the warning bell.
    pub fn bell(&mut self) {
        if self.bell_enabled {
            Self::put(&mut self.out, &self.caps.bel);
        }
    }

    fn update_size(&mut self) {
        // SAFETY: plain read-only ioctl on stdout with a zeroed winsize.
        let mut ws = nix::libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let rc = unsafe { nix::libc::ioctl(STDOUT, nix::libc::TIOCGWINSZ, &mut ws) };
        if rc == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
            self.cols = ws.ws_col as usize;
            self.rows = ws.ws_row as usize;
        } else {
            self.cols = self.caps.columns.unwrap_or(80) as usize;
            self.rows = self.caps.lines.unwrap_or(24) as usize;
        }
    }

    /// Current height in rows.
    pub fn num_rows(&mut self) -> usize {
        self.update_size();
        self.rows
    }

    /// Current width in columns.
    pub fn num_columns(&mut self) -> usize {
        self.update_size();
        self.cols
    }

    /// Move the cursor `by` columns left using the cheapest capability.
    fn cursor_left(&mut self, by: i32) -> bool {
        if by < 0 {
            return self.cursor_right(-by);
        }
        if by == 0 {
        } else if self.cursor_col == by && Self::put(&mut self.out, &self.caps.cr) {
        } else if Self::put1(&mut self.out, &self.caps.hpa, self.cursor_col - by) {
        } else if Self::put1(&mut self.out, &self.caps.cub, by) {
        } else if self.caps.cub1.is_some() {
            for _ in 0..by {
                Self::put(&mut self.out, &self.caps.cub1);
            }
        } else {
            return false;
        }
        self.cursor_col -= by;
        true
    }

    fn cursor_right(&mut self, by: i32) -> bool {
        if by < 0 {
            return self.cursor_left(-by);
        }
        if by == 0 {
        } else if Self::put1(&mut self.out, &self.caps.hpa, self.cursor_col + by) {
        } else if Self::put1(&mut self.out, &self.caps.cuf, by) {
        } else if self.caps.cuf1.is_some() {
            for _ in 0..by {
                Self::put(&mut self.out, &self.caps.cuf1);
            }
        } else {
            return false;
        }
        self.cursor_col += by;
        true
    }

    fn cursor_up(&mut self, by: i32) -> bool {
        if by < 0 {
            return self.cursor_down(-by);
        }
        if by == 0 {
        } else if Self::put1(&mut self.out, &self.caps.cuu, by) {
        } else if self.caps.cuu1.is_some() {
            for _ in 0..by {
                Self::put(&mut self.out, &self.caps.cuu1);
            }
        } else if self.caps.bw && self.caps.cub1.is_some() {
            // Backspace wraps, so columns x cub1 climbs one line.
            for _ in 0..by * self.cols as i32 {
                Self::put(&mut self.out, &self.caps.cub1);
            }
        } else {
            return false;
        }
        self.cursor_row -= by;
        true
    }

    fn cursor_down(&mut self, by: i32) -> bool {
        if by < 0 {
            return self.cursor_up(-by);
        }
        if by == 0 {
        } else if Self::put1(&mut self.out, &self.caps.cud, by) {
        } else if self.caps.cud1.is_some() {
            for _ in 0..by {
                Self::put(&mut self.out, &self.caps.cud1);
            }
        } else {
            return false;
        }
        self.cursor_row += by;
        true
    }

    /// The tracked cursor column, forcing it known with a `cr` first if
    /// necessary.
    fn known_cursor_col(&mut self) -> i32 {
        if self.cursor_col == -1 {
            // If this fails we merely risk a misplaced update; printing a
            // newline instead would guarantee one.
            Self::put(&mut self.out, &self.caps.cr);
            self.cursor_col = 0;
        }
        self.cursor_col
    }

    fn cursor_to(&mut self, row: i32, col: i32) -> bool {
        if row > self.cursor_row && col == 0 {
            // Use newlines so the screen scrolls if we run off the bottom.
            while row != self.cursor_row {
                self.write_char(b'\n');
            }
            true
        } else {
            let dx = self.known_cursor_col() - col;
            let dy = self.cursor_row - row;
            self.cursor_left(dx) && self.cursor_up(dy)
        }
    }

    fn write_char(&mut self, ch: u8) {
        if ch == b'\n' {
            if !Self::put(&mut self.out, &self.caps.nel) {
                let _ = self.out.write_all(b"\n");
            }
            self.cursor_row += 1;
            self.cursor_col = 0;
        } else {
            let _ = self.out.write_all(&[ch]);
            self.cursor_col += 1;
            if self.cursor_col == self.cols as i32 {
                if self.caps.xenl {
                    // Newline is swallowed at the margin otherwise.
                    let _ = self.out.write_all(b"\n");
                }
                self.cursor_row += 1;
                self.cursor_col = 0;
            }
        }
    }

    /// Make `text` the currently-displayed terminal text, with the cursor
    /// left at (`cursor_row`, `cursor_col`) within it. The text is wrapped
    /// and clipped to the current terminal size, then the screen is updated
    /// cell by cell against the previous snapshot.
    pub fn set_text(&mut self, text: &DecoratedText, cursor_row: usize, cursor_col: usize) {
        // Cheap enough to do every time; catching up with SIGWINCH-less
        // size changes for free.
        self.update_size();

        let mut prepared = text.clone();
        let (mut row, mut col) = (cursor_row, cursor_col);
        prepared.prepare(self.rows, self.cols, &mut row, &mut col);
        self.set_prepared(&prepared, row, col);
    }

    fn set_prepared(&mut self, new: &DecoratedText, target_row: usize, target_col: usize) {
        Self::put(&mut self.out, &self.caps.civis);

        // An overstrike terminal cannot amend a cell in place; commit what
        // is there and draw the new text on fresh lines.
        if self.caps.os && !self.screen.is_blank() && *new != self.screen {
            self.commit(true);
        }

        let blank: Vec<DecoratedChar> = Vec::new();
        let old_len = self.screen.lines().len();
        let new_len = new.lines().len();

        for line in 0..old_len.max(new_len) {
            let to_len = new.lines().get(line).map_or(0, |l| l.len());

            if line >= old_len && self.cursor_row != line as i32 {
                // First visit to this line: newline down to it so the
                // screen scrolls if needed.
                if self.cursor_down(line as i32 - self.cursor_row - 1) {
                    self.write_char(b'\n');
                }
            }

            let from_len = self.screen.lines().get(line).map_or(0, |l| l.len());
            for col in 0..from_len.max(to_len) {
                let differs = col >= from_len
                    || col >= to_len
                    || self.screen.lines()[line][col] != new.lines()[line][col];
                if !differs {
                    continue;
                }

                // Get to (or left of) the cell on the right line.
                if !self.cursor_to(line as i32, col as i32)
                    && (line as i32 != self.cursor_row || self.cursor_col > col as i32)
                    && !self.cursor_to(line as i32, 0)
                {
                    // Positioning failed outright. Commit what we have and
                    // draw once from scratch; the guard stops a second
                    // recursion.
                    if !self.retrying {
                        self.retrying = true;
                        self.commit(true);
                        self.set_prepared(new, target_row, target_col);
                        self.retrying = false;
                    }
                    Self::put(&mut self.out, &self.caps.cnorm);
                    self.flush();
                    return;
                }

                // Retype up to and including the target cell. Normally one
                // character; a whole line prefix if we fell back to column
                // zero.
                let to_line = new.lines().get(line).unwrap_or(&blank);
                while self.cursor_row == line as i32 && self.cursor_col <= col as i32 {
                    let at = self.cursor_col as usize;
                    let ch = to_line.get(at).map_or(b' ', |c| c.ch);
                    self.write_char(ch);
                }
            }
        }

        self.cursor_to(target_row as i32, target_col as i32);
        self.screen = new.clone();

        Self::put(&mut self.out, &self.caps.cnorm);
        self.flush();
    }

    /// Finalize the current text so later updates will not touch it. With
    /// `add_newline` the cursor moves to a fresh line; without it, the
    /// cursor stays on the last line (for handing the tty to something that
    /// will emit its own newline, like a stopped-job message).
    pub fn commit(&mut self, add_newline: bool) {
        let line = self.screen.lines().len() - 1;
        let column = self.screen.lines()[line].len();
        if column >= self.cols {
            // Cannot go to that column; the continuation line is blank, so
            // land there instead.
            self.cursor_to(line as i32 + add_newline as i32, 0);
        } else {
            self.cursor_to(line as i32, column as i32);
            if add_newline {
                self.write_char(b'\n');
            }
        }

        self.cursor_row = 0;
        if add_newline && self.cursor_col != 0 {
            // Positioning must have failed somewhere; degrade gracefully.
            self.write_char(b'\n');
        }

        self.flush();
        self.cursor_col = -1;
        self.screen = DecoratedText::new();
    }

    /// Blank the display, forgetting the snapshot.
    pub fn hide(&mut self) {
        let blank = DecoratedText::new();
        self.set_prepared(&blank, 0, 0);
        self.cursor_col = -1;
    }

    /// Clear and redraw the current text, for when the screen is suspected
    /// corrupt.
    pub fn redisplay(&mut self) {
        let text = std::mem::replace(&mut self.screen, DecoratedText::new());
        let (row, col) = (self.cursor_row, self.cursor_col);

        if Self::put(&mut self.out, &self.caps.clear) {
            self.cursor_row = 0;
            self.cursor_col = 0;
        } else {
            if !self.cursor_to(0, 0) {
                self.cursor_to(row + 1, 0);
                self.cursor_row = 0;
            }
            self.cursor_col = -1;
        }

        self.set_prepared(&text, row.max(0) as usize, col.max(0) as usize);
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.commit(true);
        self.disable();
        let _ = close(self.interrupt_fd.0);
        let _ = close(self.interrupt_fd.1);
        tracing::debug!("terminal closed");
    }
}

/// Scoped suspension of the terminal; restores raw mode when dropped.
pub struct SuspendGuard<'a> {
    terminal: &'a mut Terminal,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.terminal.enable();
    }
}

/// Send a signal to the foreground process group of the controlling
/// terminal. Used for the interrupt/quit/suspend commands, always after the
/// terminal itself has been suspended. Failure is ignored; the editor state
/// is already consistent.
pub fn signal_foreground(signal: Signal) {
    match tcgetpgrp(STDIN) {
        Ok(pgrp) => {
            let _ = kill(Pid::from_raw(-pgrp.as_raw()), signal);
        }
        Err(e) => tracing::debug!("tcgetpgrp failed: {e}"),
    }
}

/// Wake a terminal's `wait_for_key` from another thread by its pipe fd.
pub(crate) fn wake(fd: RawFd) {
    loop {
        match fd_write(fd, b"\0") {
            Err(Errno::EINTR) => continue,
            _ => break,
        }
    }
}
