//! Lexical similarity predicates.
//!
//! The engine never decides on its own whether two strings denote the same
//! concept; it asks a [`LexicalSimilarity`] supplied through configuration.
//! [`JaroWinklerSimilarity`] is the default: case-insensitive Jaro-Winkler
//! over trimmed strings, computed with `strsim`.

use std::fmt;

/// Characters that separate the parts of a compound reference
pub const SEPARATORS: [char; 5] = ['-', '_', '.', ':', '/'];

pub trait LexicalSimilarity: Send + Sync + fmt::Debug {
    /// Similar at the predicate's own threshold
    fn are_similar(&self, a: &str, b: &str) -> bool;

    /// Similar at an explicit threshold
    fn are_similar_with_threshold(&self, a: &str, b: &str, threshold: f64) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaroWinklerSimilarity {
    threshold: f64,
}

impl JaroWinklerSimilarity {
    pub const DEFAULT_THRESHOLD: f64 = 0.9;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Raw score in [0, 1]
    pub fn score(a: &str, b: &str) -> f64 {
        strsim::jaro_winkler(&a.trim().to_lowercase(), &b.trim().to_lowercase())
    }
}

impl Default for JaroWinklerSimilarity {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl LexicalSimilarity for JaroWinklerSimilarity {
    fn are_similar(&self, a: &str, b: &str) -> bool {
        self.are_similar_with_threshold(a, b, self.threshold)
    }

    fn are_similar_with_threshold(&self, a: &str, b: &str, threshold: f64) -> bool {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return false;
        }
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        Self::score(a, b) >= threshold
    }
}

/// Split a reference at separators and whitespace, dropping empty parts
pub fn split_at_separators(reference: &str) -> Vec<&str> {
    reference
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_is_similar_and_unrelated_word_is_not() {
        let similarity = JaroWinklerSimilarity::default();
        assert!(similarity.are_similar("Logger", "Loggers"));
        assert!(similarity.are_similar("logger", "LOGGER"));
        assert!(!similarity.are_similar("Logger", "Handler"));
    }

    #[test]
    fn explicit_threshold_overrides_default() {
        let similarity = JaroWinklerSimilarity::default();
        assert!(!similarity.are_similar("Logger", "Log"));
        assert!(similarity.are_similar_with_threshold("Logger", "Log", 0.5));
    }

    #[test]
    fn blank_strings_are_never_similar() {
        let similarity = JaroWinklerSimilarity::new(0.0);
        assert!(!similarity.are_similar("", "Logger"));
        assert!(!similarity.are_similar("  ", "  "));
    }

    #[test]
    fn splits_compound_references() {
        assert_eq!(
            split_at_separators("event-bus_core.Logger x"),
            vec!["event", "bus", "core", "Logger", "x"]
        );
        assert!(split_at_separators("--").is_empty());
    }
}
