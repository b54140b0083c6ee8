//! keyline: an interactive line editor for shells and REPLs
//!
//! keyline reads input from a Unix terminal one keystroke at a time, keeps
//! a multi-line buffer with live cursors, renders it incrementally using
//! terminfo capabilities, and dispatches keys to commands through a stack
//! of editing modes.
//!
//! # Architecture
//!
//! - `key` / `keymap`: the logical key space and the incremental decoder
//!   from terminal bytes to keys
//! - `term`: raw-mode lifecycle, capability resolution, the offscreen
//!   attributed-text buffer and the screen-diffing renderer
//! - `text`: the multi-line buffer whose cursors survive edits
//! - `bindings` / `mode` / `editor`: commands, binding tables, the mode
//!   stack and the main loop with its async command queue
//! - `emacs` / `search`: the Emacs-style editing surface and its
//!   reverse-incremental-search child mode
//! - `history` / `config`: the history abstraction with a ring
//!   implementation, and the serde-backed configuration
//!
//! # Example
//!
//! ```no_run
//! use keyline::{Driver, Editor, EmacsMode, History, RingHistory};
//!
//! struct Shell {
//!     history: RingHistory,
//! }
//!
//! impl Driver for Shell {
//!     fn execute(&mut self, line: &str) {
//!         println!("you said: {line}");
//!     }
//!
//!     fn history(&mut self) -> Option<&mut dyn History> {
//!         Some(&mut self.history)
//!     }
//! }
//!
//! let mut editor = Editor::new();
//! let shell = Shell { history: RingHistory::new(500) };
//! editor.push_mode(Box::new(EmacsMode::new(shell)));
//! editor.run(false).expect("terminal unavailable");
//! ```

pub mod bindings;
pub mod config;
pub mod editor;
pub mod emacs;
pub mod history;
pub mod key;
pub mod keymap;
pub mod mode;
pub mod search;
pub mod term;
pub mod text;

pub use bindings::{Command, KeyBindings};
pub use config::{Config, ConfigError};
pub use editor::{AsyncHandle, Editor};
pub use emacs::{Completion, Completions, Driver, EmacsMode};
pub use history::{History, HistoryCursor, RingHistory};
pub use key::{alt, ctrl, is_printable, keys, Key, KeyCombination};
pub use keymap::KeyMap;
pub use mode::{Lookup, Mode};
pub use search::SearchMode;
pub use term::{Attribute, DecoratedText, SuspendGuard, TermError, Terminal};
pub use text::{Cursor, Insert, Text};
