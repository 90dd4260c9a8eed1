use super::{ObservationPlan, TextStateStrategy};
use crate::config::MergeStrategyKind;
use crate::error::Result;
use crate::noun_mapping::{MentionKey, NounMapping};
use crate::similarity::{split_at_separators, LexicalSimilarity};
use crate::text::{Text, Word, WordId};
use crate::text_state::TextState;
use std::collections::BTreeSet;
use tracing::trace;

/// Merges an observation into the first existing mention that is lexically
/// similar to it, so synonyms, plurals and near-duplicates found at different
/// points of the document collapse into one mention.
///
/// Each observation scans every live mention in creation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyStrategy;

impl FuzzyStrategy {
    /// Similarity of a one-word candidate to an existing mention.
    ///
    /// Single-word mentions compare the first separator-delimited part of both
    /// references, then the words themselves (text and lemma). Longer
    /// mentions compare whole references.
    pub fn is_similar(
        similarity: &dyn LexicalSimilarity,
        text: &Text,
        candidate: &Word,
        existing: &NounMapping,
    ) -> bool {
        let candidate_parts = split_at_separators(candidate.text());
        let existing_parts = split_at_separators(existing.reference());
        let (Some(candidate_first), Some(existing_first)) =
            (candidate_parts.first(), existing_parts.first())
        else {
            return false;
        };

        match existing.reference_words() {
            [single] => {
                if similarity.are_similar(candidate_first, existing_first) {
                    return true;
                }
                text.word(*single).is_some_and(|other| {
                    similarity.are_similar(candidate.text(), other.text())
                        || similarity.are_similar(candidate.lemma(), other.lemma())
                })
            }
            _ => similarity.are_similar(candidate.text(), existing.reference()),
        }
    }
}

impl TextStateStrategy for FuzzyStrategy {
    fn kind(&self) -> MergeStrategyKind {
        MergeStrategyKind::Fuzzy
    }

    fn plan_observation(
        &self,
        state: &TextState,
        word: &Word,
        _surface_forms: &[String],
    ) -> Result<ObservationPlan> {
        let similarity = state.similarity();
        for existing in state.noun_mappings() {
            if !Self::is_similar(similarity, state.text(), word, existing) {
                continue;
            }
            trace!(
                word = %word.text(),
                mention = %existing.id(),
                reference = %existing.reference(),
                "similar mention found"
            );
            // A mention already holding the word would be rebuilt unchanged.
            return Ok(if existing.contains_word(word.id()) {
                ObservationPlan::Extend(existing.id())
            } else {
                ObservationPlan::MergeInto(existing.id())
            });
        }
        trace!(word = %word.text(), scanned = state.len(), "no similar mention");
        Ok(ObservationPlan::Create)
    }

    /// The existing mention gains the candidate's reference words
    fn observation_words(
        &self,
        existing: &NounMapping,
        candidate: &NounMapping,
    ) -> BTreeSet<WordId> {
        let mut words = existing.words().clone();
        words.extend(candidate.reference_words().iter().copied());
        words
    }

    fn merged_reference_words(&self, first: &NounMapping, _second: &NounMapping) -> Vec<WordId> {
        first.reference_words().to_vec()
    }

    fn allows_shared_words(&self) -> bool {
        true
    }

    fn is_duplicate(&self, existing: MentionKey<'_>, candidate: MentionKey<'_>) -> bool {
        let existing_refs: BTreeSet<_> = existing.reference_words.iter().collect();
        let candidate_refs: BTreeSet<_> = candidate.reference_words.iter().collect();
        existing_refs == candidate_refs && existing.words == candidate.words
    }
}
