/*!
 * Fixed-Capacity Text
 * Names and paths with a hard byte capacity, backed by smartstring
 */

use serde::{Deserialize, Deserializer, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;

/// Text truncated to at most `CAP - 1` bytes
///
/// The capacity counts a terminator slot so limits line up with the C
/// surface this layer replaces. Truncation never splits a UTF-8 character.
/// Names up to 23 bytes are stored inline without allocation.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct FixedText<const CAP: usize> {
    inner: SmartString,
}

impl<const CAP: usize> FixedText<CAP> {
    /// Maximum number of bytes retained
    pub const MAX_LEN: usize = CAP.saturating_sub(1);

    /// Copy `text`, truncating it to fit
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(Self::MAX_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            inner: SmartString::from(&text[..end]),
        }
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<const CAP: usize> From<&str> for FixedText<CAP> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const CAP: usize> AsRef<str> for FixedText<CAP> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const CAP: usize> PartialEq<str> for FixedText<CAP> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const CAP: usize> PartialEq<&str> for FixedText<CAP> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const CAP: usize> fmt::Display for FixedText<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const CAP: usize> fmt::Debug for FixedText<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<'de, const CAP: usize> Deserialize<'de> for FixedText<CAP> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}
