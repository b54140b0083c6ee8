//! Editing modes
//!
//! A mode is a scope of key bindings plus the state behind them. Modes form
//! a stack owned by the [`crate::editor::Editor`]; the top mode sees every
//! key first. An inner mode can decline a key with [`Lookup::Fallthrough`],
//! which ends it and forwards the key to the mode underneath.
//!
//! Commands that need a specific mode find it through the typed accessors
//! (`as_emacs`, `as_search`) rather than downcasting, walking the stack from
//! the top and silently doing nothing when no such mode is present.

use crate::bindings::Command;
use crate::emacs::EmacsMode;
use crate::key::KeyCombination;
use crate::search::SearchMode;
use crate::term::Terminal;

/// The result of asking a mode for a key's handler.
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    /// Run this command.
    Bound(Command),
    /// Nothing bound; the editor rings the bell.
    Unbound,
    /// End this mode, re-render the one below it, and offer it the key.
    Fallthrough,
}

/// A node in the editor's mode stack.
pub trait Mode {
    /// Resolve a key combination to a command.
    fn handler(&mut self, keys: &KeyCombination) -> Lookup;

    /// Draw this mode's view of the world. `below` holds the rest of the
    /// stack, deepest first, for modes that decorate another mode's output.
    fn render(&mut self, below: &mut [Box<dyn Mode>], terminal: &mut Terminal);

    /// Called when the editor has gone idle, before rendering.
    fn idle(&mut self) {}

    fn as_emacs(&mut self) -> Option<&mut EmacsMode> {
        None
    }

    fn as_search(&mut self) -> Option<&mut SearchMode> {
        None
    }
}
