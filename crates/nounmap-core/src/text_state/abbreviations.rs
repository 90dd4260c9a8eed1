//! Abbreviations recorded against words and phrases.

use super::TextState;
use crate::abbreviation::{Abbreviation, PhraseAbbreviation, WordAbbreviation};
use crate::error::{Handle, MentionError, Operation, Result};
use crate::text::{PhraseId, WordId};
use std::collections::BTreeMap;
use tracing::debug;

impl TextState {
    /// Record that `abbreviation` stands for `word`.
    ///
    /// The first sighting of an abbreviation creates its entry; later ones add
    /// the word to it.
    pub fn add_or_extend_word_abbreviation(
        &mut self,
        abbreviation: &str,
        word: WordId,
    ) -> Result<&WordAbbreviation> {
        let operation = Operation::AddOrExtendWordAbbreviation;
        self.strategy(operation)?;
        let abbreviation = checked(operation, abbreviation)?;
        if self.text.word(word).is_none() {
            return Err(MentionError::not_in_state(operation, Handle::Word(word)));
        }
        Ok(record(&mut self.word_abbreviations, abbreviation, word))
    }

    /// Record that `abbreviation` stands for `phrase`
    pub fn add_or_extend_phrase_abbreviation(
        &mut self,
        abbreviation: &str,
        phrase: PhraseId,
    ) -> Result<&PhraseAbbreviation> {
        let operation = Operation::AddOrExtendPhraseAbbreviation;
        self.strategy(operation)?;
        let abbreviation = checked(operation, abbreviation)?;
        if self.text.phrase(phrase).is_none() {
            return Err(MentionError::not_in_state(operation, Handle::Phrase(phrase)));
        }
        Ok(record(&mut self.phrase_abbreviations, abbreviation, phrase))
    }

    /// Word abbreviations sorted by abbreviation
    pub fn word_abbreviations(&self) -> impl Iterator<Item = &WordAbbreviation> + '_ {
        self.word_abbreviations.values()
    }

    pub fn word_abbreviation(&self, abbreviation: &str) -> Option<&WordAbbreviation> {
        self.word_abbreviations.get(abbreviation)
    }

    /// Abbreviations standing for `word`
    pub fn word_abbreviations_of(&self, word: WordId) -> Vec<&WordAbbreviation> {
        self.word_abbreviations
            .values()
            .filter(|a| a.stands_for(word))
            .collect()
    }

    /// Phrase abbreviations sorted by abbreviation
    pub fn phrase_abbreviations(&self) -> impl Iterator<Item = &PhraseAbbreviation> + '_ {
        self.phrase_abbreviations.values()
    }

    pub fn phrase_abbreviation(&self, abbreviation: &str) -> Option<&PhraseAbbreviation> {
        self.phrase_abbreviations.get(abbreviation)
    }

    pub fn phrase_abbreviations_of(&self, phrase: PhraseId) -> Vec<&PhraseAbbreviation> {
        self.phrase_abbreviations
            .values()
            .filter(|a| a.stands_for(phrase))
            .collect()
    }
}

fn checked(operation: Operation, abbreviation: &str) -> Result<&str> {
    let trimmed = abbreviation.trim();
    if trimmed.is_empty() {
        return Err(MentionError::invalid(operation, "empty abbreviation"));
    }
    Ok(trimmed)
}

fn record<'a, T>(
    entries: &'a mut BTreeMap<String, Abbreviation<T>>,
    abbreviation: &str,
    meaning: T,
) -> &'a Abbreviation<T>
where
    T: Copy + PartialEq + std::fmt::Display,
{
    let entry = entries
        .entry(abbreviation.to_string())
        .or_insert_with(|| Abbreviation::new(abbreviation));
    if entry.add(meaning) {
        debug!(abbreviation, meaning = %meaning, "abbreviation recorded");
    }
    entry
}
