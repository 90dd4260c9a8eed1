//! Read-only queries. Mentions are always returned in creation order.

use super::TextState;
use crate::config::{MergeStrategyKind, TextStateConfig};
use crate::confidence::MappingKind;
use crate::error::{MentionError, Operation, Result};
use crate::noun_mapping::{MentionId, NounMapping};
use crate::phrase_mapping::{PhraseMapping, PhraseMappingId};
use crate::similarity::LexicalSimilarity;
use crate::text::{Text, WordId};
use std::collections::BTreeSet;
use tracing::warn;

impl TextState {
    pub fn text(&self) -> &Text {
        &self.text
    }

    pub fn config(&self) -> &TextStateConfig {
        &self.config
    }

    pub fn similarity(&self) -> &dyn LexicalSimilarity {
        self.similarity.as_ref()
    }

    /// Kind of the bound strategy, if any
    pub fn strategy_kind(&self) -> Option<MergeStrategyKind> {
        self.strategy.as_ref().map(|s| s.kind())
    }

    /// Number of live mentions
    pub fn len(&self) -> usize {
        self.noun_mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.noun_mappings.is_empty()
    }

    // ========================================================================
    // Noun mappings
    // ========================================================================

    /// Live mentions in creation order
    pub fn noun_mappings(&self) -> impl Iterator<Item = &NounMapping> + '_ {
        self.order
            .iter()
            .filter_map(|(_, id)| self.noun_mappings.get(id))
    }

    /// Live mention by handle; retired handles yield `None`
    pub fn noun_mapping(&self, id: MentionId) -> Option<&NounMapping> {
        self.noun_mappings.get(&id)
    }

    pub fn contains(&self, id: MentionId) -> bool {
        self.noun_mappings.contains_key(&id)
    }

    /// Follow a possibly retired handle to its live successor
    pub fn resolve(&self, id: MentionId) -> Option<MentionId> {
        let mut current = id;
        // Redirect chains are acyclic: every hop points at a newer or live handle.
        for _ in 0..=self.mention_redirects.len() {
            if self.noun_mappings.contains_key(&current) {
                return Some(current);
            }
            current = *self.mention_redirects.get(&current)?;
        }
        None
    }

    /// Mentions containing `word`
    pub fn noun_mappings_by_word(&self, word: WordId) -> Vec<&NounMapping> {
        let Some(owners) = self.word_index.get(&word) else {
            return Vec::new();
        };
        let mut found: Vec<&NounMapping> = owners
            .iter()
            .filter_map(|id| self.noun_mappings.get(id))
            .collect();
        found.sort_by_key(|nm| (nm.creation_time(), nm.id()));
        found
    }

    /// The single mention containing `word`; several owners are an error
    pub fn noun_mapping_by_word(&self, word: WordId) -> Result<Option<&NounMapping>> {
        let owners = self.noun_mappings_by_word(word);
        match owners.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            _ => Err(MentionError::DuplicateWordOwnership {
                operation: Operation::Query,
                word_id: word,
                word: self
                    .text
                    .word(word)
                    .map(|w| w.text().to_string())
                    .unwrap_or_default(),
                references: owners.iter().map(|nm| nm.reference().to_string()).collect(),
            }),
        }
    }

    pub fn noun_mappings_of_kind(&self, kind: MappingKind) -> Vec<&NounMapping> {
        self.noun_mappings().filter(|nm| nm.kind() == kind).collect()
    }

    pub fn noun_mappings_by_word_and_kind(
        &self,
        word: WordId,
        kind: MappingKind,
    ) -> Vec<&NounMapping> {
        self.noun_mappings_by_word(word)
            .into_iter()
            .filter(|nm| nm.kind() == kind)
            .collect()
    }

    pub fn is_word_contained_by_mapping_kind(&self, word: WordId, kind: MappingKind) -> bool {
        !self.noun_mappings_by_word_and_kind(word, kind).is_empty()
    }

    /// Mentions whose reference is similar to `reference`
    pub fn noun_mappings_with_similar_reference(&self, reference: &str) -> Vec<&NounMapping> {
        self.noun_mappings()
            .filter(|nm| self.similarity.are_similar(reference, nm.reference()))
            .collect()
    }

    /// Mentions containing `word` with any confidence for `kind`
    pub fn mappings_that_could_be_of_kind(
        &self,
        word: WordId,
        kind: MappingKind,
    ) -> Vec<&NounMapping> {
        self.noun_mappings_by_word(word)
            .into_iter()
            .filter(|nm| nm.probability_for_kind(kind) > 0.0)
            .collect()
    }

    /// Mentions containing `word` that are genuinely ambiguous between `kinds`.
    ///
    /// Every requested kind must have positive confidence and all pairwise
    /// differences must stay below the configured ambiguity tolerance. A
    /// single kind degrades to [`noun_mappings_of_kind`](Self::noun_mappings_of_kind).
    pub fn mappings_that_could_be_multiple_kinds(
        &self,
        word: WordId,
        kinds: &[MappingKind],
    ) -> Result<Vec<&NounMapping>> {
        match kinds {
            [] => Err(MentionError::invalid(
                Operation::Query,
                "at least one mapping kind is required",
            )),
            [single] => Ok(self.noun_mappings_of_kind(*single)),
            _ => {
                let tolerance = self.config.kind_ambiguity_tolerance;
                Ok(self
                    .noun_mappings_by_word(word)
                    .into_iter()
                    .filter(|nm| {
                        let probabilities: Vec<f64> =
                            kinds.iter().map(|k| nm.probability_for_kind(*k)).collect();
                        probabilities.iter().all(|p| *p > 0.0)
                            && probabilities.iter().all(|p1| {
                                probabilities.iter().all(|p2| (p1 - p2).abs() < tolerance)
                            })
                    })
                    .collect())
            }
        }
    }

    /// Distinct references of mentions of `kind`, sorted
    pub fn references_of_kind(&self, kind: MappingKind) -> Vec<String> {
        self.noun_mappings_of_kind(kind)
            .into_iter()
            .map(|nm| nm.reference().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ========================================================================
    // Phrase mappings
    // ========================================================================

    pub fn phrase_mappings(&self) -> impl Iterator<Item = &PhraseMapping> + '_ {
        self.phrase_mappings.values()
    }

    pub fn phrase_mapping(&self, id: PhraseMappingId) -> Option<&PhraseMapping> {
        self.phrase_mappings.get(&id)
    }

    pub fn resolve_phrase_mapping(&self, id: PhraseMappingId) -> Option<PhraseMappingId> {
        let mut current = id;
        for _ in 0..=self.phrase_mapping_redirects.len() {
            if self.phrase_mappings.contains_key(&current) {
                return Some(current);
            }
            current = *self.phrase_mapping_redirects.get(&current)?;
        }
        None
    }

    /// Phrase mapping backing a live mention
    pub fn phrase_mapping_of(&self, id: MentionId) -> Option<&PhraseMapping> {
        self.backing
            .get(&id)
            .and_then(|pm| self.phrase_mappings.get(pm))
    }

    /// Every phrase mapping containing all phrases of a mention
    pub fn phrase_mappings_by_noun_mapping(&self, id: MentionId) -> Vec<&PhraseMapping> {
        let Some(mention) = self.noun_mappings.get(&id) else {
            return Vec::new();
        };
        self.phrase_mappings
            .values()
            .filter(|pm| pm.covers(mention.phrases()))
            .collect()
    }

    /// Mentions backed by a phrase mapping
    pub fn noun_mappings_by_phrase_mapping(&self, id: PhraseMappingId) -> Vec<&NounMapping> {
        self.noun_mappings()
            .filter(|nm| self.backing.get(&nm.id()) == Some(&id))
            .collect()
    }

    /// Other mentions backed by the same phrase mapping as `id`
    pub fn noun_mappings_in_same_phrase_mapping(&self, id: MentionId) -> Vec<&NounMapping> {
        let Some(pm) = self.backing.get(&id) else {
            return Vec::new();
        };
        self.noun_mappings_by_phrase_mapping(*pm)
            .into_iter()
            .filter(|nm| nm.id() != id)
            .collect()
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Check every structural invariant and report the first violation
    pub fn validate(&self) -> Result<()> {
        let operation = Operation::Query;
        let violation = |reference: &str, reason: String| {
            warn!(reference = %reference, reason = %reason, "text state invariant violated");
            Err(MentionError::invariant(operation, reference, reason))
        };

        if self.order.len() != self.noun_mappings.len() {
            return violation("<text state>", "creation order out of sync".to_string());
        }

        for mention in self.noun_mappings.values() {
            if mention.words().is_empty() {
                return violation(mention.reference(), "mention has no words".to_string());
            }
            if mention.reference().trim().is_empty() {
                return violation("<empty>", format!("{} has an empty reference", mention.id()));
            }
            if !mention.distribution().has_provenance() {
                return violation(mention.reference(), "mention has no claimant".to_string());
            }
            if !self.order.contains(&(mention.creation_time(), mention.id())) {
                return violation(mention.reference(), "mention missing from order".to_string());
            }
            for word in mention.words() {
                let indexed = self
                    .word_index
                    .get(word)
                    .is_some_and(|owners| owners.contains(&mention.id()));
                if !indexed {
                    return violation(mention.reference(), format!("{word} not indexed"));
                }
            }
            match self.phrase_mapping_of(mention.id()) {
                Some(pm) if pm.covers(mention.phrases()) => {}
                Some(pm) => {
                    return violation(
                        mention.reference(),
                        format!("{} does not cover the mention's phrases", pm.id()),
                    )
                }
                None => return violation(mention.reference(), "no phrase mapping".to_string()),
            }
        }

        if self.strategy_kind() == Some(MergeStrategyKind::Strict) {
            for word in self.word_index.keys() {
                self.noun_mapping_by_word(*word)?;
            }
        }

        for pm in self.phrase_mappings.values() {
            if pm.phrase_count() == 0 {
                return violation(&pm.id().to_string(), "phrase mapping is empty".to_string());
            }
        }
        Ok(())
    }

    /// Handles of live mentions in creation order
    pub fn noun_mapping_ids(&self) -> Vec<MentionId> {
        self.order.iter().map(|(_, id)| *id).collect()
    }
}
