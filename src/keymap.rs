//! Incremental key decoder
//!
//! Maps the terminal's input byte stream onto logical [`Key`]s. Escape
//! sequences are resolved through a byte trie built from three sources, in
//! priority order: the terminal's own control characters (EOF, suspend,
//! interrupt, quit), the key sequences discovered through terminfo, and a
//! hard-coded table of CSI/SS3 variants that terminfo databases routinely
//! omit. The first binding of a sequence wins.
//!
//! Decoding is incremental: each byte advances the current trie position.
//! A byte with no outgoing edge flushes the first buffered byte as a literal
//! key and replays the rest, so malformed sequences degrade to their
//! constituent characters instead of being dropped.
//!
//! Escape is not encoded in the trie as a modifier. A decoded `ESC` key
//! instead arms a meta flag that ORs [`keys::ALT`] into the next decoded
//! key, which yields Alt+X from `ESC X` without doubling the trie.

use std::collections::BTreeMap;

use crate::key::{keys, Key};

/// Key sequences most terminal emulators send but termcap/terminfo give no
/// way to describe. Added after the real mappings so that on conflict the
/// database wins.
const FALLBACK_SEQS: &[(Key, &[u8])] = &[
    // Standard arrow keys, keypad-transmit mode and application mode.
    (keys::UP, b"\x1b[A"),
    (keys::UP, b"\x1bOA"),
    (keys::DOWN, b"\x1b[B"),
    (keys::DOWN, b"\x1bOB"),
    (keys::RIGHT, b"\x1b[C"),
    (keys::RIGHT, b"\x1bOC"),
    (keys::LEFT, b"\x1b[D"),
    (keys::LEFT, b"\x1bOD"),
    // Usually in terminfo, but not always.
    (keys::INSERT, b"\x1b[2~"),
    (keys::DELETE, b"\x1b[3~"),
    (keys::HOME, b"\x1b[1~"),
    (keys::END, b"\x1b[4~"),
    (keys::HOME, b"\x1b[H"),
    (keys::END, b"\x1b[F"),
    (keys::HOME, b"\x1bOH"),
    (keys::END, b"\x1bOF"),
    (keys::PAGE_UP, b"\x1b[5~"),
    (keys::PAGE_DOWN, b"\x1b[6~"),
    // Modifier variants: the parameter is a bitfield plus one
    // (Shift = 1, Alt = 2, Ctrl = 4).
    (keys::ALT + keys::UP, b"\x1b[1;3A"),
    (keys::CTRL + keys::UP, b"\x1b[1;5A"),
    (keys::CTRL + keys::ALT + keys::UP, b"\x1b[1;7A"),
    (keys::ALT + keys::DOWN, b"\x1b[1;3B"),
    (keys::CTRL + keys::DOWN, b"\x1b[1;5B"),
    (keys::CTRL + keys::ALT + keys::DOWN, b"\x1b[1;7B"),
    (keys::ALT + keys::RIGHT, b"\x1b[1;3C"),
    (keys::CTRL + keys::RIGHT, b"\x1b[1;5C"),
    (keys::CTRL + keys::ALT + keys::RIGHT, b"\x1b[1;7C"),
    (keys::ALT + keys::LEFT, b"\x1b[1;3D"),
    (keys::CTRL + keys::LEFT, b"\x1b[1;5D"),
    (keys::CTRL + keys::ALT + keys::LEFT, b"\x1b[1;7D"),
    (keys::ALT + keys::INSERT, b"\x1b[2;3~"),
    (keys::CTRL + keys::INSERT, b"\x1b[2;5~"),
    (keys::CTRL + keys::ALT + keys::INSERT, b"\x1b[2;7~"),
    (keys::ALT + keys::DELETE, b"\x1b[3;3~"),
    (keys::CTRL + keys::DELETE, b"\x1b[3;5~"),
    (keys::CTRL + keys::ALT + keys::DELETE, b"\x1b[3;7~"),
    (keys::ALT + keys::HOME, b"\x1b[1;3H"),
    (keys::CTRL + keys::HOME, b"\x1b[1;5H"),
    (keys::CTRL + keys::ALT + keys::HOME, b"\x1b[1;7H"),
    (keys::ALT + keys::END, b"\x1b[1;3F"),
    (keys::CTRL + keys::END, b"\x1b[1;5F"),
    (keys::CTRL + keys::ALT + keys::END, b"\x1b[1;7F"),
    (keys::ALT + keys::PAGE_UP, b"\x1b[5;3~"),
    (keys::CTRL + keys::PAGE_UP, b"\x1b[5;5~"),
    (keys::CTRL + keys::ALT + keys::PAGE_UP, b"\x1b[5;7~"),
    (keys::ALT + keys::PAGE_DOWN, b"\x1b[6;3~"),
    (keys::CTRL + keys::PAGE_DOWN, b"\x1b[6;5~"),
    (keys::CTRL + keys::ALT + keys::PAGE_DOWN, b"\x1b[6;7~"),
    // Alt + F<n> on some emulators.
    (keys::IGNORED, b"\x1b[12;3~"),
    (keys::IGNORED, b"\x1b[13;3~"),
    (keys::IGNORED, b"\x1b[14;3~"),
    (keys::IGNORED, b"\x1b[15;3~"),
    (keys::IGNORED, b"\x1b[16;3~"),
    (keys::IGNORED, b"\x1b[17;3~"),
    (keys::IGNORED, b"\x1b[18;3~"),
    (keys::IGNORED, b"\x1b[19;3~"),
    (keys::IGNORED, b"\x1b[20;3~"),
    (keys::IGNORED, b"\x1b[21;3~"),
    (keys::IGNORED, b"\x1b[22;3~"),
    (keys::IGNORED, b"\x1b[23;3~"),
    // Application-keypad digits and operators, PuTTY and VT100 style.
    ('*' as Key, b"\x1bOj"),
    ('+' as Key, b"\x1bOk"),
    ('+' as Key, b"\x1bOl"),
    ('-' as Key, b"\x1bOm"),
    ('.' as Key, b"\x1bOn"),
    ('/' as Key, b"\x1bOo"),
    ('0' as Key, b"\x1bOp"),
    ('1' as Key, b"\x1bOq"),
    ('2' as Key, b"\x1bOr"),
    ('3' as Key, b"\x1bOs"),
    ('4' as Key, b"\x1bOt"),
    ('5' as Key, b"\x1bOu"),
    ('6' as Key, b"\x1bOv"),
    ('7' as Key, b"\x1bOw"),
    ('8' as Key, b"\x1bOx"),
    ('9' as Key, b"\x1bOy"),
    // NumLock can masquerade as F1-F4.
    (keys::IGNORED, b"\x1bOP"),
    ('/' as Key, b"\x1bOQ"),
    ('*' as Key, b"\x1bOR"),
    ('-' as Key, b"\x1bOS"),
    (keys::ENTER, b"\x1bOM"),
];

/// A trie node. `key == 0` means no key is mapped at this node.
#[derive(Debug, Default)]
struct Node {
    key: Key,
    next: BTreeMap<u8, usize>,
}

/// Incremental byte-to-key decoder.
#[derive(Debug)]
pub struct KeyMap {
    nodes: Vec<Node>,
    /// Current trie position; `None` means at the root.
    curr: Option<usize>,
    /// Bytes consumed since the root, for replay on mismatch.
    buffer: Vec<u8>,
    /// A decoded Escape arms this; the next decoded key gets Alt folded in.
    meta: bool,
    /// Set when a sequence resolved to an unmapped terminal node; the caller
    /// owns the actual bell.
    bell: bool,
}

const ROOT: usize = 0;

impl KeyMap {
    /// Build the decoder. `primary` holds the terminal-derived mappings
    /// (control characters first, then terminfo key sequences); the
    /// hard-coded fallback table is appended last and never overrides them.
    pub fn new<I>(primary: I) -> Self
    where
        I: IntoIterator<Item = (Key, Vec<u8>)>,
    {
        let mut map = Self {
            nodes: vec![Node::default()],
            curr: None,
            buffer: Vec::new(),
            meta: false,
            bell: false,
        };
        for (key, seq) in primary {
            map.add(&seq, key);
        }
        for &(key, seq) in FALLBACK_SEQS {
            map.add(seq, key);
        }
        map
    }

    /// Add one sequence. The first mapping of a sequence wins.
    fn add(&mut self, seq: &[u8], key: Key) {
        if seq.is_empty() {
            return;
        }
        let mut at = ROOT;
        for &b in seq {
            at = match self.nodes[at].next.get(&b) {
                Some(&n) => n,
                None => {
                    let n = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[at].next.insert(b, n);
                    n
                }
            };
        }
        if self.nodes[at].key == 0 {
            self.nodes[at].key = key;
        }
    }

    /// Feed one input byte; returns the keys it completed, with the
    /// Escape-to-Alt fold already applied.
    pub fn feed(&mut self, byte: u8) -> Vec<Key> {
        let mut out = Vec::new();
        for key in self.scan(byte) {
            if self.meta {
                self.meta = false;
                out.push(key + keys::ALT);
            } else if key == keys::ESCAPE {
                self.meta = true;
            } else {
                out.push(key);
            }
        }
        out
    }

    /// Trie resolution for one byte, before the meta fold.
    fn scan(&mut self, byte: u8) -> Vec<Key> {
        let at = self.curr.unwrap_or(ROOT);
        self.buffer.push(byte);

        match self.nodes[at].next.get(&byte) {
            None => {
                // The sequence can't resolve. Emit the first buffered byte
                // as a literal key and replay the rest. An unbound single
                // byte is the degenerate case of the same path.
                let replay = std::mem::take(&mut self.buffer);
                self.curr = None;
                let mut out = vec![Key::from(replay[0])];
                for &b in &replay[1..] {
                    out.extend(self.scan(b));
                }
                out
            }
            Some(&n) if self.nodes[n].next.is_empty() => {
                // Sequence resolved.
                let mapped = self.nodes[n].key;
                self.curr = None;
                self.buffer.clear();
                if mapped != 0 {
                    vec![mapped]
                } else {
                    self.bell = true;
                    Vec::new()
                }
            }
            Some(&n) => {
                // Not yet resolved; wait for more bytes.
                self.curr = Some(n);
                Vec::new()
            }
        }
    }

    /// Take the pending bell request, if any.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::alt;

    fn decoder() -> KeyMap {
        KeyMap::new([
            (keys::EOF, vec![0x04]),
            (keys::SUSPEND, vec![0x1a]),
            (keys::INTERRUPT, vec![0x03]),
            (keys::QUIT, vec![0x1c]),
            (keys::UP, b"\x1b[A".to_vec()),
            (keys::ENTER, b"\r".to_vec()),
        ])
    }

    fn feed_all(map: &mut KeyMap, bytes: &[u8]) -> Vec<Key> {
        bytes.iter().flat_map(|&b| map.feed(b)).collect()
    }

    #[test]
    fn test_plain_bytes() {
        let mut map = decoder();
        assert_eq!(feed_all(&mut map, b"hi"), vec!['h' as Key, 'i' as Key]);
    }

    #[test]
    fn test_control_chars() {
        let mut map = decoder();
        assert_eq!(map.feed(0x04), vec![keys::EOF]);
        assert_eq!(map.feed(0x03), vec![keys::INTERRUPT]);
    }

    #[test]
    fn test_arrow_sequence() {
        let mut map = decoder();
        assert_eq!(feed_all(&mut map, b"\x1b[A"), vec![keys::UP]);
    }

    #[test]
    fn test_fallback_sequence() {
        // Application-mode arrows come from the built-in table.
        let mut map = decoder();
        assert_eq!(feed_all(&mut map, b"\x1bOB"), vec![keys::DOWN]);
        assert_eq!(feed_all(&mut map, b"\x1b[1;5D"), vec![keys::CTRL + keys::LEFT]);
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        // Bind \x1b[A to something that disagrees with the fallback table.
        let mut map = KeyMap::new([(keys::HOME, b"\x1b[A".to_vec())]);
        assert_eq!(feed_all(&mut map, b"\x1b[A"), vec![keys::HOME]);
    }

    #[test]
    fn test_escape_then_key_is_alt() {
        let mut map = decoder();
        assert_eq!(map.feed(0x1b), Vec::<Key>::new());
        assert_eq!(map.feed(b'f'), vec![alt('f' as Key)]);
        assert_eq!(alt('f' as Key), 0xe6);
    }

    #[test]
    fn test_unresolvable_sequence_replays() {
        // ESC [ z is not bound: ESC arms meta, '[' becomes Alt+'[', 'z'
        // comes through as itself.
        let mut map = decoder();
        let out = feed_all(&mut map, b"\x1b[z");
        assert_eq!(out, vec![alt('[' as Key), 'z' as Key]);
    }

    #[test]
    fn test_replay_is_deterministic() {
        // Feeding the same byte string twice produces the same keys twice:
        // no decoder state leaks across a completed sequence.
        let stream = b"\x1b[Aab\x1b[1;3A\r";
        let mut map = decoder();
        let first = feed_all(&mut map, stream);
        let second = feed_all(&mut map, stream);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_zero_mapped_node_rings_bell() {
        let mut map = KeyMap::new([(0, b"\x1b[Q".to_vec())]);
        let out = feed_all(&mut map, b"\x1b[Q");
        assert_eq!(out, Vec::<Key>::new());
        assert!(map.take_bell());
        assert!(!map.take_bell());
    }

    #[test]
    fn test_ignored_key_decodes() {
        let mut map = decoder();
        assert_eq!(feed_all(&mut map, b"\x1bOP"), vec![keys::IGNORED]);
    }
}
