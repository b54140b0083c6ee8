//! tty line-discipline handling
//!
//! Captures the attributes the terminal had when we started, derives the
//! raw-mode variant used while editing, and extracts the control characters
//! the key decoder must recognize. Restoring the original attributes is the
//! owner's job (see `Terminal`'s suspend depth and `Drop`).

use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;

use nix::sys::termios::{
    tcgetattr, tcsetattr, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};

use crate::term::TermError;

/// The line-discipline control characters the decoder maps onto logical
/// keys.
#[derive(Debug, Clone, Copy)]
pub struct ControlChars {
    /// End-of-file, usually Ctrl-D.
    pub eof: u8,
    /// Suspend, usually Ctrl-Z.
    pub susp: u8,
    /// Interrupt, usually Ctrl-C.
    pub intr: u8,
    /// Quit, usually Ctrl-\.
    pub quit: u8,
}

/// A saved pair of tty attribute sets: the ones we found, and the raw copy
/// we edit under.
#[derive(Debug, Clone)]
pub struct TtyModes {
    saved: Termios,
    raw: Termios,
    fd: RawFd,
}

impl TtyModes {
    /// Capture the current attributes of `fd` and derive the raw copy:
    /// no echo, no canonical buffering, no signal generation, no input
    /// stripping or parity checking, and byte-at-a-time reads.
    pub fn capture(fd: RawFd) -> Result<Self, TermError> {
        let saved = tcgetattr(unsafe { BorrowedFd::borrow_raw(fd) })?;
        let mut raw = saved.clone();
        raw.local_flags
            .remove(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG);
        raw.input_flags
            .remove(InputFlags::ISTRIP | InputFlags::INPCK);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        Ok(Self { saved, raw, fd })
    }

    /// The control characters from the saved attributes.
    pub fn control_chars(&self) -> ControlChars {
        let cc = &self.saved.control_chars;
        ControlChars {
            eof: cc[SpecialCharacterIndices::VEOF as usize],
            susp: cc[SpecialCharacterIndices::VSUSP as usize],
            intr: cc[SpecialCharacterIndices::VINTR as usize],
            quit: cc[SpecialCharacterIndices::VQUIT as usize],
        }
    }

    /// Install the raw attributes.
    pub fn set_raw(&self) -> Result<(), TermError> {
        tcsetattr(unsafe { BorrowedFd::borrow_raw(self.fd) }, SetArg::TCSADRAIN, &self.raw)?;
        Ok(())
    }

    /// Restore the attributes captured at startup.
    pub fn restore(&self) -> Result<(), TermError> {
        tcsetattr(unsafe { BorrowedFd::borrow_raw(self.fd) }, SetArg::TCSADRAIN, &self.saved)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::isatty;

    #[test]
    fn test_capture_on_tty() {
        // Only meaningful when the test runner has a controlling terminal.
        if !isatty(0).unwrap_or(false) {
            return;
        }
        let modes = TtyModes::capture(0).expect("capture tty attributes");
        let cc = modes.control_chars();
        // The usual defaults; at minimum they are control characters.
        assert!(cc.eof < 0x20);
        assert!(cc.intr < 0x20);
    }

    #[test]
    fn test_capture_on_non_tty_fails() {
        let file = tempfile::tempfile().unwrap();
        use std::os::unix::io::AsRawFd;
        assert!(TtyModes::capture(file.as_raw_fd()).is_err());
    }
}
