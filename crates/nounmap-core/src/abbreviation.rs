//! Abbreviations seen in the text.
//!
//! An abbreviation such as "DB" is recorded against every word or phrase an
//! analyzer found it standing for. One abbreviation string has one entry per
//! text state; later sightings only add meanings.

use crate::text::{PhraseId, WordId};
use std::fmt;

/// An abbreviation and the text elements it stands for, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbreviation<T> {
    abbreviation: String,
    meanings: Vec<T>,
}

pub type WordAbbreviation = Abbreviation<WordId>;
pub type PhraseAbbreviation = Abbreviation<PhraseId>;

impl<T: Copy + PartialEq> Abbreviation<T> {
    pub(crate) fn new(abbreviation: impl Into<String>) -> Self {
        Self {
            abbreviation: abbreviation.into(),
            meanings: Vec::new(),
        }
    }

    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }

    pub fn meanings(&self) -> &[T] {
        &self.meanings
    }

    pub fn stands_for(&self, meaning: T) -> bool {
        self.meanings.contains(&meaning)
    }

    /// Returns whether `meaning` was new
    pub(crate) fn add(&mut self, meaning: T) -> bool {
        if self.stands_for(meaning) {
            return false;
        }
        self.meanings.push(meaning);
        true
    }
}

impl<T: fmt::Display> fmt::Display for Abbreviation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meanings: Vec<String> = self.meanings.iter().map(ToString::to_string).collect();
        write!(f, "{} [{}]", self.abbreviation, meanings.join(", "))
    }
}
