//! Case-insensitive identifier symbols.
//!
//! Guest-language identifiers compare case-insensitively (Pascal rules), so
//! every name used as a lookup key (variables, fields, properties, methods,
//! type names) is carried as a [`Symbol`]: the folded form drives equality
//! and hashing, the written form survives for diagnostics.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An interned, case-folded identifier. Cheap to clone (two `Rc`s).
#[derive(Clone)]
pub struct Symbol {
    /// Lowercased form; the only part that participates in Eq/Hash.
    key: Rc<str>,
    /// The identifier as written, for diagnostics.
    display: Rc<str>,
}

impl Symbol {
    pub fn new(name: &str) -> Symbol {
        let display: Rc<str> = Rc::from(name);
        let key: Rc<str> = if name.chars().any(|c| c.is_uppercase()) {
            Rc::from(name.to_lowercase().as_str())
        } else {
            display.clone()
        };
        Symbol { key, display }
    }

    /// The folded lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The identifier as originally written.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn matches(&self, name: &str) -> bool {
        self.key.chars().eq(name.chars().flat_map(char::to_lowercase))
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool {
        self.key == other.key
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Borrow<str> for Symbol {
    /// Borrows the folded key so maps keyed by `Symbol` can be probed with a
    /// pre-folded `&str`.
    fn borrow(&self) -> &str {
        &self.key
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Symbol {
        Symbol::new(name)
    }
}

impl From<Rc<str>> for Symbol {
    fn from(name: Rc<str>) -> Symbol {
        Symbol::new(&name)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Fold a name the way [`Symbol`] does, for probing symbol-keyed maps
/// without allocating a `Symbol`.
pub fn fold(name: &str) -> String {
    name.to_lowercase()
}
