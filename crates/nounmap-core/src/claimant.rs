//! Provenance tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of the analyzer that produced a piece of evidence.
///
/// The engine compares claimants for equality and orders them for stable
/// output; it never interprets the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claimant(String);

impl Claimant {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Claimant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Claimant {
    fn from(name: &str) -> Self {
        Claimant::new(name)
    }
}
