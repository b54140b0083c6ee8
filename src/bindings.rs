//! Commands and key-binding tables
//!
//! A [`Command`] is a named function over the editor; binding tables map a
//! single logical key to the command currently bound to it. Commands are
//! plain `fn` items so tables can copy them around freely; a mode builds its
//! table once at construction and there is no global registry.

use std::collections::HashMap;

use crate::editor::Editor;
use crate::key::{Key, KeyCombination};

/// A named editor command.
#[derive(Clone, Copy)]
pub struct Command {
    name: &'static str,
    run: fn(&mut Editor, &KeyCombination),
}

impl Command {
    pub const fn new(name: &'static str, run: fn(&mut Editor, &KeyCombination)) -> Self {
        Self { name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, editor: &mut Editor, keys: &KeyCombination) {
        (self.run)(editor, keys);
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Command").field(&self.name).finish()
    }
}

impl PartialEq for Command {
    /// Commands are identified by name; tables never hold two distinct
    /// commands under one name.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Command {}

/// A map from single keys to commands. Last write wins.
#[derive(Debug, Default)]
pub struct KeyBindings {
    bindings: HashMap<Key, Command>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a combination. Returns false unless the combination has exactly
    /// one key; binding the empty combination is a successful no-op.
    pub fn add(&mut self, keys: impl Into<KeyCombination>, command: Command) -> bool {
        let keys = keys.into();
        if keys.is_empty() {
            return true;
        }
        match keys.single() {
            Some(key) => {
                self.bindings.insert(key, command);
                true
            }
            None => false,
        }
    }

    /// Bind the same command under several keys.
    pub fn bind(&mut self, command: Command, keys: &[Key]) {
        for &key in keys {
            self.add(key, command);
        }
    }

    /// Look up the command bound to a combination, if any.
    pub fn get(&self, keys: &KeyCombination) -> Option<Command> {
        self.bindings.get(&keys.single()?).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ctrl, keys};

    fn noop(_: &mut Editor, _: &KeyCombination) {}
    fn noop2(_: &mut Editor, _: &KeyCombination) {}

    const A: Command = Command::new("a", noop);
    const B: Command = Command::new("b", noop2);

    #[test]
    fn test_single_key_binding() {
        let mut b = KeyBindings::new();
        assert!(b.add(ctrl('A' as Key), A));
        assert_eq!(b.get(&KeyCombination::from(ctrl('A' as Key))), Some(A));
        assert_eq!(b.get(&KeyCombination::from(ctrl('B' as Key))), None);
    }

    #[test]
    fn test_empty_combination_is_noop() {
        let mut b = KeyBindings::new();
        assert!(b.add(KeyCombination::none(), A));
        assert_eq!(b.get(&KeyCombination::none()), None);
    }

    #[test]
    fn test_multi_key_combination_rejected() {
        let mut b = KeyBindings::new();
        let combo = KeyCombination::from(&[keys::UP, keys::DOWN][..]);
        assert!(!b.add(combo.clone(), A));
        assert_eq!(b.get(&combo), None);
    }

    #[test]
    fn test_last_write_wins() {
        let mut b = KeyBindings::new();
        b.add(keys::ENTER, A);
        b.add(keys::ENTER, B);
        assert_eq!(b.get(&KeyCombination::from(keys::ENTER)), Some(B));
    }
}
