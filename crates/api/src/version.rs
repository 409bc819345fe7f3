//! Comparable artifact versions.
//!
//! A version is a run of dot separated numbers optionally followed by a
//! qualifier (`1.0`, `4.1.100.Final`, `2.0-SNAPSHOT`). Ordering is numeric per
//! component, never lexical, and a release sorts after any qualified build of
//! the same numbers.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    numbers: Vec<u64>,
    qualifier: Option<String>,
}

impl Version {
    pub fn parse(text: &str) -> ApiResult<Self> {
        let raw = text.trim();
        if raw.is_empty() || raw.contains(char::is_whitespace) || raw.contains('/') {
            return Err(ApiError::InvalidVersion(text.to_string()));
        }

        let mut numbers = Vec::new();
        let mut rest = raw;
        loop {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                break;
            }
            let value = rest[..digits]
                .parse::<u64>()
                .map_err(|_| ApiError::InvalidVersion(text.to_string()))?;
            numbers.push(value);
            rest = &rest[digits..];

            // Only continue when a dot is followed by another number.
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        let qualifier = rest.trim_start_matches(['.', '-', '_']);
        let qualifier = (!qualifier.is_empty()).then(|| qualifier.to_string());

        Ok(Self {
            raw: raw.to_string(),
            numbers,
            qualifier,
        })
    }

    /// Numeric components as written.
    pub fn numbers(&self) -> &[u64] {
        &self.numbers
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn significant_numbers(&self) -> &[u64] {
        let len = self
            .numbers
            .iter()
            .rposition(|n| *n != 0)
            .map_or(0, |i| i + 1);
        &self.numbers[..len]
    }

    fn folded_qualifier(&self) -> Option<String> {
        self.qualifier.as_ref().map(|q| q.to_ascii_lowercase())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.numbers.len().max(other.numbers.len());
        for i in 0..width {
            let a = self.numbers.get(i).copied().unwrap_or(0);
            let b = other.numbers.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        match (self.folded_qualifier(), other.folded_qualifier()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_numbers().hash(state);
        self.folded_qualifier().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ApiError;

    fn try_from(value: String) -> ApiResult<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2") > v("1.99.99"));
        assert!(v("4.1.100.Final") > v("4.1.99.Final"));
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0"));

        let set: HashSet<Version> = [v("1"), v("1.0"), v("1.0.0")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_release_after_qualifier() {
        assert!(v("1.0") > v("1.0-SNAPSHOT"));
        assert!(v("1.0-beta") > v("1.0-alpha"));
        assert_eq!(v("4.1.100.Final").qualifier(), Some("Final"));
        assert_eq!(v("2.0-SNAPSHOT").numbers(), &[2, 0]);
    }

    #[test]
    fn test_display_keeps_original_text() {
        assert_eq!(v("1.0.0").to_string(), "1.0.0");
        assert_eq!(v("RELEASE").qualifier(), Some("RELEASE"));
    }

    #[test]
    fn test_rejects_blank_and_paths() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("  ").is_err());
        assert!(Version::parse("1.0/2").is_err());
    }
}
