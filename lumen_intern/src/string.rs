//! Interned string values.

use std::ops::Deref;
use std::sync::Arc;

/// Shared reference to an interned string.
///
/// Interning guarantees that equal contents resolve to the same
/// allocation, so identity comparison (`Arc::ptr_eq`) is equivalent to
/// content comparison between two interned references.
pub type StrRef = Arc<InternedStr>;

/// An immutable interned string.
#[derive(Debug, PartialEq, Eq)]
pub struct InternedStr {
    contents: Box<str>,
}

impl InternedStr {
    pub(crate) fn new(contents: &str) -> StrRef {
        Arc::new(InternedStr {
            contents: contents.into(),
        })
    }

    /// The string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.contents
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

impl Deref for InternedStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.contents
    }
}

impl std::fmt::Display for InternedStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.contents)
    }
}
