//! Phrase mappings: phrase-level backing of noun mappings.
//!
//! A [`PhraseMapping`] is a non-empty set of phrases. Every live noun mapping
//! is backed by exactly one phrase mapping containing all of the mention's
//! phrases, so later stages can reason per phrase without recomputing
//! word-set intersections.

use crate::error::{Handle, MentionError, Operation, Result};
use crate::listener::{ChangeListeners, ReplacementListener};
use crate::noun_mapping::NounMapping;
use crate::text::{PhraseId, PhraseType, Text, WordId};
use crate::text_state::TextState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Weak;

/// Stable handle of a phrase mapping inside one text state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseMappingId(pub u64);

impl fmt::Display for PhraseMappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pm{}", self.0)
    }
}

pub struct PhraseMapping {
    id: PhraseMappingId,
    phrases: BTreeMap<PhraseId, PhraseType>,
    listeners: ChangeListeners<PhraseMappingId>,
}

impl PhraseMapping {
    pub(crate) fn new(
        operation: Operation,
        id: PhraseMappingId,
        text: &Text,
        phrases: impl IntoIterator<Item = PhraseId>,
    ) -> Result<Self> {
        let mut resolved = BTreeMap::new();
        for phrase_id in phrases {
            let phrase = text
                .phrase(phrase_id)
                .ok_or_else(|| MentionError::not_in_state(operation, Handle::Phrase(phrase_id)))?;
            resolved.insert(phrase_id, phrase.phrase_type());
        }
        if resolved.is_empty() {
            return Err(MentionError::invalid(
                operation,
                "a phrase mapping needs at least one phrase",
            ));
        }
        Ok(Self {
            id,
            phrases: resolved,
            listeners: ChangeListeners::default(),
        })
    }

    pub fn id(&self) -> PhraseMappingId {
        self.id
    }

    pub fn phrases(&self) -> impl Iterator<Item = PhraseId> + '_ {
        self.phrases.keys().copied()
    }

    pub fn phrase_set(&self) -> BTreeSet<PhraseId> {
        self.phrases.keys().copied().collect()
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    /// Type of the first phrase
    pub fn phrase_type(&self) -> PhraseType {
        self.phrases
            .values()
            .next()
            .copied()
            .unwrap_or(PhraseType::Other)
    }

    pub fn contains_phrase(&self, phrase: PhraseId) -> bool {
        self.phrases.contains_key(&phrase)
    }

    /// True when every given phrase is part of this mapping
    pub fn covers(&self, phrases: &BTreeSet<PhraseId>) -> bool {
        phrases.iter().all(|p| self.phrases.contains_key(p))
    }

    /// Union of the words of all phrases
    pub fn words(&self, text: &Text) -> BTreeSet<WordId> {
        self.phrases
            .keys()
            .filter_map(|p| text.phrase(*p))
            .flat_map(|p| p.words().iter().copied())
            .collect()
    }

    /// Word counts grouped by word text
    pub fn phrase_vector(&self, text: &Text) -> BTreeMap<String, usize> {
        let mut vector = BTreeMap::new();
        for word in self.words(text).into_iter().filter_map(|w| text.word(w)) {
            *vector.entry(word.text().to_string()).or_insert(0) += 1;
        }
        vector
    }

    /// Live noun mappings whose word set equals this mapping's words
    pub fn noun_mappings_in<'s>(&self, state: &'s TextState) -> Vec<&'s NounMapping> {
        let words = self.words(state.text());
        state
            .noun_mappings()
            .filter(|nm| *nm.words() == words)
            .collect()
    }

    /// Remove one phrase; the last phrase can never be removed
    pub(crate) fn remove_phrase(&mut self, phrase: PhraseId) -> Result<()> {
        if !self.phrases.contains_key(&phrase) {
            return Err(MentionError::not_in_state(
                Operation::RemovePhrase,
                Handle::Phrase(phrase),
            ));
        }
        if self.phrases.len() == 1 {
            return Err(MentionError::invariant(
                Operation::RemovePhrase,
                self.id.to_string(),
                format!("removing {phrase} would leave the phrase mapping empty"),
            ));
        }
        self.phrases.remove(&phrase);
        Ok(())
    }

    pub fn register_change_listener(
        &mut self,
        listener: Weak<dyn ReplacementListener<PhraseMappingId>>,
    ) {
        self.listeners.register(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.live_count()
    }

    pub(crate) fn notify_replaced(
        &mut self,
        replacement: PhraseMappingId,
    ) -> ChangeListeners<PhraseMappingId> {
        self.listeners.notify_replaced(self.id, replacement)
    }

    pub(crate) fn adopt_listeners(&mut self, listeners: ChangeListeners<PhraseMappingId>) {
        self.listeners.absorb(listeners);
    }
}

impl fmt::Debug for PhraseMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhraseMapping")
            .field("id", &self.id)
            .field("phrases", &self.phrases)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl fmt::Display for PhraseMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrases: Vec<String> = self.phrases.keys().map(ToString::to_string).collect();
        write!(
            f,
            "PhraseMapping [{} type={}, phrases={}]",
            self.id,
            self.phrase_type(),
            phrases.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> Text {
        let mut builder = Text::builder();
        builder.phrase(PhraseType::Np, &["the", "Logger"]).unwrap();
        builder.phrase(PhraseType::Vp, &["logs"]).unwrap();
        builder.phrase(PhraseType::Np, &["the", "Handler"]).unwrap();
        builder.build()
    }

    fn mapping(phrases: &[u32]) -> PhraseMapping {
        PhraseMapping::new(
            Operation::CreatePhraseMapping,
            PhraseMappingId(1),
            &text(),
            phrases.iter().map(|p| PhraseId(*p)),
        )
        .unwrap()
    }

    #[test]
    fn phrase_type_is_the_first_phrase_type() {
        assert_eq!(mapping(&[1, 0]).phrase_type(), PhraseType::Np);
        assert_eq!(mapping(&[1]).phrase_type(), PhraseType::Vp);
    }

    #[test]
    fn empty_or_unknown_phrases_are_rejected() {
        let err = PhraseMapping::new(
            Operation::CreatePhraseMapping,
            PhraseMappingId(1),
            &text(),
            [],
        )
        .unwrap_err();
        assert!(matches!(err, MentionError::InvalidArgument { .. }));

        let err = PhraseMapping::new(
            Operation::CreatePhraseMapping,
            PhraseMappingId(1),
            &text(),
            [PhraseId(7)],
        )
        .unwrap_err();
        assert!(matches!(err, MentionError::NotInState { .. }));
    }

    #[test]
    fn last_phrase_cannot_be_removed() {
        let mut pm = mapping(&[0, 2]);
        pm.remove_phrase(PhraseId(2)).unwrap();
        let err = pm.remove_phrase(PhraseId(0)).unwrap_err();
        assert!(matches!(err, MentionError::InvariantViolation { .. }));
        assert_eq!(pm.phrase_set(), BTreeSet::from([PhraseId(0)]));
        assert!(matches!(
            pm.remove_phrase(PhraseId(1)),
            Err(MentionError::NotInState { .. })
        ));
    }

    #[test]
    fn phrase_vector_counts_words_by_text() {
        let text = text();
        let pm = mapping(&[0, 2]);
        let vector = pm.phrase_vector(&text);
        assert_eq!(vector.get("the"), Some(&2));
        assert_eq!(vector.get("Logger"), Some(&1));
        assert_eq!(vector.get("logs"), None);
        assert_eq!(pm.words(&text).len(), 4);
    }
}
