//! API versions used as routing namespaces.
//!
//! # Wire format
//!
//! Versions are written as `v<major>[.<minor>[.<patch>]]`. Formatting trims
//! least-significant zero components until the first positive one is seen, so
//! `{1,2,0}` formats as `"v1.2"` but `{1,0,7}` keeps its inner zero as
//! `"v1.0.7"`. A version with no positive component formats as the empty
//! string, which is also the key of the unversioned namespace.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A `(major, minor, patch)` triple identifying an API namespace.
///
/// Carries no ordering: versions are only compared for equality and used as
/// map keys through their canonical string form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^v([0-9]+)(?:\.([0-9]+)(?:\.([0-9]+))?)?$").expect("version pattern is valid")
    })
}

impl Version {
    /// Creates a version from its three components.
    #[must_use]
    pub const fn new(major: i64, minor: i64, patch: i64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses `v<major>[.<minor>[.<patch>]]`.
    ///
    /// Malformed input never fails: it yields the zero version, i.e. the
    /// unversioned namespace. Missing components stay zero.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let Some(caps) = version_pattern().captures(text) else {
            if !text.is_empty() {
                tracing::debug!(input = text, "malformed version treated as unversioned");
            }
            return Self::default();
        };

        let mut parts = [0i64; 3];
        for (slot, group) in parts.iter_mut().zip(caps.iter().skip(1)) {
            if let Some(m) = group {
                match m.as_str().parse::<i64>() {
                    Ok(n) => *slot = n,
                    Err(_) => {
                        tracing::debug!(input = text, "version component out of range");
                        return Self::default();
                    }
                }
            }
        }

        Self::new(parts[0], parts[1], parts[2])
    }

    /// Returns true when this version formats to the empty namespace key.
    #[must_use]
    pub fn is_unversioned(&self) -> bool {
        self.major <= 0 && self.minor <= 0 && self.patch <= 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Scan least-significant first; once a positive component is found
        // every more-significant component is kept, zero or not.
        let mut kept = Vec::with_capacity(3);
        let mut found = false;
        for n in [self.patch, self.minor, self.major] {
            if n > 0 || found {
                found = true;
                kept.push(n);
            }
        }

        if kept.is_empty() {
            return Ok(());
        }

        f.write_str("v")?;
        for (i, n) in kept.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}
