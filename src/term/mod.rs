//! Terminal I/O
//!
//! Everything that touches the tty lives here:
//!
//! - `caps`: terminfo capability resolution
//! - `raw`: line-discipline attribute handling
//! - `decorated`: the offscreen attributed-text buffer and its layout
//! - `terminal`: raw-mode lifecycle, the key pump and the diff renderer

pub mod caps;
pub mod decorated;
pub mod raw;
pub mod terminal;

pub use decorated::{Attribute, DecoratedText};
pub use terminal::{signal_foreground, SuspendGuard, Terminal};

/// Errors from opening or driving the terminal.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    #[error("terminfo error: {0}")]
    Terminfo(#[from] terminfo::Error),
    #[error("tty error: {0}")]
    Tty(#[from] nix::errno::Errno),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
