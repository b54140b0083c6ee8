//! terminfo capability resolution
//!
//! All capabilities the renderer and key decoder consume are resolved once,
//! by name, into a plain struct. String capabilities that the database does
//! not provide stay `None` and the consumer falls back to the next-cheapest
//! mechanism (see the cursor-motion ladder in `terminal.rs`).

use terminfo::{Database, Value};

use crate::key::{keys, Key};
use crate::term::TermError;

/// terminfo capability names for the special keys we decode.
const SPECIAL_KEYS: &[(Key, &str)] = &[
    (keys::ENTER, "kent"),
    (keys::UP, "kcuu1"),
    (keys::DOWN, "kcud1"),
    (keys::LEFT, "kcub1"),
    (keys::RIGHT, "kcuf1"),
    (keys::BACKSPACE, "kbs"),
    (keys::PAGE_UP, "kpp"),
    (keys::PAGE_DOWN, "knp"),
    (keys::HOME, "khome"),
    (keys::END, "kend"),
    (keys::INSERT, "kich1"),
    (keys::DELETE, "kdch1"),
];

/// Capability names for keys we decode only to discard, rather than letting
/// their sequences spill into the line as text: every function key and a
/// long tail of rarely-seen editing keys.
const IGNORED_KEYS: &[&str] = &[
    "ka1", "ka3", "kb2", "kbeg", "kcbt", "kc1", "kc3", "kcan", "ktbc", "kclr", "kclo", "kcmd",
    "kcpy", "kcrt", "kctab", "kdl1", "krmir", "kel", "ked", "kext", "kf0", "kf1", "kf2", "kf3",
    "kf4", "kf5", "kf6", "kf7", "kf8", "kf9", "kf10", "kf11", "kf12", "kf13", "kf14", "kf15",
    "kf16", "kf17", "kf18", "kf19", "kf20", "kf21", "kf22", "kf23", "kf24", "kf25", "kf26",
    "kf27", "kf28", "kf29", "kf30", "kf31", "kf32", "kf33", "kf34", "kf35", "kf36", "kf37",
    "kf38", "kf39", "kf40", "kf41", "kf42", "kf43", "kf44", "kf45", "kf46", "kf47", "kf48",
    "kf49", "kf50", "kf51", "kf52", "kf53", "kf54", "kf55", "kf56", "kf57", "kf58", "kf59",
    "kf60", "kf61", "kf62", "kf63", "kfnd", "khlp", "kil1", "kll", "kmrk", "kmsg", "kmous",
    "kmov", "knxt", "kopn", "kopt", "kprv", "kprt", "krdo", "kref", "krfr", "krpl", "krst",
    "kres", "ksav", "kBEG", "kCAN", "kCMD", "kCPY", "kCRT", "kDC", "kDL", "kslt", "kEND",
    "kEOL", "kEXT", "kind", "kFND", "kHLP", "kHOM", "kIC", "kLFT", "kMSG", "kMOV", "kNXT",
    "kOPT", "kPRV", "kPRT", "kri", "kRDO", "kRPL", "kRIT", "kRES", "kSAV", "kSPD", "khts",
    "kUND", "kspd", "kund",
];

/// The capabilities the terminal consumes, resolved once at startup.
#[derive(Debug, Default)]
pub struct Caps {
    pub bel: Option<Vec<u8>>,
    pub smkx: Option<Vec<u8>>,
    pub rmkx: Option<Vec<u8>>,
    pub civis: Option<Vec<u8>>,
    pub cnorm: Option<Vec<u8>>,
    pub cr: Option<Vec<u8>>,
    pub nel: Option<Vec<u8>>,
    pub clear: Option<Vec<u8>>,
    /// Absolute column positioning; takes the target column.
    pub hpa: Option<Vec<u8>>,
    /// Parametric multi-cell motions; take the cell count.
    pub cub: Option<Vec<u8>>,
    pub cuf: Option<Vec<u8>>,
    pub cuu: Option<Vec<u8>>,
    pub cud: Option<Vec<u8>>,
    /// Single-cell motions.
    pub cub1: Option<Vec<u8>>,
    pub cuf1: Option<Vec<u8>>,
    pub cuu1: Option<Vec<u8>>,
    pub cud1: Option<Vec<u8>>,
    /// Backspace at column 0 wraps to the end of the previous line.
    pub bw: bool,
    /// Newline is ignored after a line wraps at the right margin.
    pub xenl: bool,
    /// Overstrike terminal: cells cannot be amended in place.
    pub os: bool,
    /// Size fallbacks for when the winsize ioctl is unavailable.
    pub lines: Option<u16>,
    pub columns: Option<u16>,
    /// Key sequences discovered from the database, in priority order.
    pub key_seqs: Vec<(Key, Vec<u8>)>,
}

fn raw_string(db: &Database, name: &str) -> Option<Vec<u8>> {
    match db.raw(name) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn raw_flag(db: &Database, name: &str) -> bool {
    matches!(db.raw(name), Some(Value::True))
}

fn raw_number(db: &Database, name: &str) -> Option<u16> {
    match db.raw(name) {
        Some(&Value::Number(n)) if n > 0 => Some(n as u16),
        _ => None,
    }
}

impl Caps {
    /// Resolve everything from the database named by `$TERM`.
    pub fn from_env() -> Result<Self, TermError> {
        Ok(Self::from_database(&Database::from_env()?))
    }

    pub fn from_database(db: &Database) -> Self {
        let mut key_seqs = Vec::new();
        for &(key, name) in SPECIAL_KEYS {
            if let Some(seq) = raw_string(db, name) {
                key_seqs.push((key, seq));
            }
        }
        for &name in IGNORED_KEYS {
            if let Some(seq) = raw_string(db, name) {
                key_seqs.push((keys::IGNORED, seq));
            }
        }

        Self {
            bel: raw_string(db, "bel"),
            smkx: raw_string(db, "smkx"),
            rmkx: raw_string(db, "rmkx"),
            civis: raw_string(db, "civis"),
            cnorm: raw_string(db, "cnorm"),
            cr: raw_string(db, "cr"),
            nel: raw_string(db, "nel"),
            clear: raw_string(db, "clear"),
            hpa: raw_string(db, "hpa"),
            cub: raw_string(db, "cub"),
            cuf: raw_string(db, "cuf"),
            cuu: raw_string(db, "cuu"),
            cud: raw_string(db, "cud"),
            cub1: raw_string(db, "cub1"),
            cuf1: raw_string(db, "cuf1"),
            cuu1: raw_string(db, "cuu1"),
            cud1: raw_string(db, "cud1"),
            bw: raw_flag(db, "bw"),
            xenl: raw_flag(db, "xenl"),
            os: raw_flag(db, "os"),
            lines: raw_number(db, "lines"),
            columns: raw_number(db, "cols"),
            key_seqs,
        }
    }
}

/// Expand a parameterized capability with a single numeric argument.
pub fn expand1(seq: &[u8], n: i32) -> Option<Vec<u8>> {
    terminfo::expand!(seq; n).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_single_parameter() {
        // A literal `%p1%d` program, independent of any database.
        let out = expand1(b"\x1b[%p1%dD", 7).unwrap();
        assert_eq!(out, b"\x1b[7D");
    }

    #[test]
    fn test_expand_increment_parameter() {
        // hpa-style programs often use %i (one-based parameters).
        let out = expand1(b"\x1b[%i%p1%dG", 4).unwrap();
        assert_eq!(out, b"\x1b[5G");
    }

    #[test]
    fn test_from_database_xterm() {
        // Only meaningful where a terminfo database is installed.
        let Ok(db) = Database::from_name("xterm") else {
            return;
        };
        let caps = Caps::from_database(&db);
        assert!(caps.cr.is_some());
        assert!(caps.key_seqs.iter().any(|(k, _)| *k == keys::UP));
        // Function keys resolve to the ignored pseudo-key.
        assert!(caps.key_seqs.iter().any(|(k, _)| *k == keys::IGNORED));
    }
}
