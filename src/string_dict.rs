//! Interning for identifier names and string literals.
//!
//! The lexer hands every identifier and string literal through one
//! `StringDict`, so equal names in a compiled program share one `Rc<str>`.
//! Binding lookups hash the same allocation over and over, which keeps the
//! environment tables small.

use rustc_hash::FxHashMap;

use crate::value::{CheapClone, JsString};

/// A set of shared `JsString`s keyed by content.
pub struct StringDict {
    strings: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// A dictionary seeded with the names the compiler and VM refer to by
    /// themselves (`arguments`, `prototype`, ...).
    pub fn with_common_strings() -> Self {
        let mut dict = Self::new();
        for s in COMMON_STRINGS {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Return the shared instance for `s`, creating it on first use.
    pub fn get_or_insert(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let js_str = JsString::from(s);
        self.strings.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

const COMMON_STRINGS: &[&str] = &[
    "arguments",
    "eval",
    "length",
    "prototype",
    "constructor",
    "name",
    "message",
    "value",
    "writable",
    "enumerable",
    "configurable",
    "get",
    "set",
    "toString",
    "valueOf",
    "undefined",
    "use strict",
];
