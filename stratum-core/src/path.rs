use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed dotted key. This is the only key form stored in a `Config`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_segments(raw.split('.').map(ToOwned::to_owned))
            .map_err(|_| Error::InvalidPath(format!("'{raw}' is not a valid key")))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(Error::InvalidPath("key cannot be empty".to_owned()));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(Error::InvalidPath(format!(
                    "empty segment in '{}'",
                    segments.join(".")
                )));
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(Error::InvalidPath(format!(
                    "segment '{segment}' contains whitespace"
                )));
            }
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, other: &KeyPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// A single segment taken verbatim from a config document. Document keys
    /// may contain dots or whitespace and are never split.
    pub(crate) fn verbatim(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    pub(crate) fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub(crate) fn split_at(&self, mid: usize) -> (Self, &[String]) {
        (Self(self.0[..mid].to_vec()), &self.0[mid..])
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Underscore-joined single-segment form. Only used as a lookup shim for
    /// keys that were stored under their historical flattened name.
    pub fn flattened(&self) -> Self {
        Self(vec![self.0.join("_")])
    }
}

impl FromStr for KeyPath {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}
