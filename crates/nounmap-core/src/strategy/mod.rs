//! Fusion policies.
//!
//! A strategy never mutates the text state. It answers two kinds of question:
//!
//! ```text
//!   observation (word, kind, claimant, p)
//!        │
//!        ▼
//!   plan_observation ──► Extend(m) | Create | MergeInto(m)
//!
//!   merge (first, second)
//!        │
//!        ▼
//!   merged_words / observation_words / merged_reference_words / merged_reference
//! ```
//!
//! and the text state executes the plan with the one shared merge algorithm.
//! The two policies differ only in those answers plus whether two live
//! mentions may share a word.

mod fuzzy;
mod strict;

pub use fuzzy::FuzzyStrategy;
pub use strict::StrictStrategy;

use crate::config::MergeStrategyKind;
use crate::error::Result;
use crate::noun_mapping::{MentionId, MentionKey, NounMapping};
use crate::text::{Text, Word, WordId};
use crate::text_state::TextState;
use std::collections::BTreeSet;
use std::fmt;

/// What to do with a single-word observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationPlan {
    /// Record the vote on an existing mention
    Extend(MentionId),
    /// Insert a new one-word mention
    Create,
    /// Merge a one-word candidate into an existing mention
    MergeInto(MentionId),
}

pub trait TextStateStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> MergeStrategyKind;

    /// Decide how an observation of `word` is absorbed. Empty
    /// `surface_forms` mean the observation named none.
    fn plan_observation(
        &self,
        state: &TextState,
        word: &Word,
        surface_forms: &[String],
    ) -> Result<ObservationPlan>;

    /// Word set of the mention produced by an explicit merge of `second`
    /// into `first`. No word of either side is lost.
    fn merged_words(&self, first: &NounMapping, second: &NounMapping) -> BTreeSet<WordId> {
        first.words().union(second.words()).copied().collect()
    }

    /// Word set when a one-word observation `candidate` is absorbed by
    /// `existing`
    fn observation_words(
        &self,
        existing: &NounMapping,
        candidate: &NounMapping,
    ) -> BTreeSet<WordId> {
        self.merged_words(existing, candidate)
    }

    /// Reference words when the merge request names none
    fn merged_reference_words(&self, first: &NounMapping, second: &NounMapping) -> Vec<WordId>;

    /// Reference string when the merge request names none
    fn merged_reference(
        &self,
        text: &Text,
        first: &NounMapping,
        second: &NounMapping,
        reference_words: &[WordId],
    ) -> String {
        if first.reference().to_lowercase() == second.reference().to_lowercase() {
            first.reference().to_string()
        } else {
            text.join_words(reference_words)
        }
    }

    /// Whether two live mentions may contain the same word
    fn allows_shared_words(&self) -> bool;

    /// Whether `candidate` would duplicate `existing`
    fn is_duplicate(&self, existing: MentionKey<'_>, candidate: MentionKey<'_>) -> bool;
}

/// Strategy for a configured kind
pub fn strategy_for(kind: MergeStrategyKind) -> Box<dyn TextStateStrategy> {
    match kind {
        MergeStrategyKind::Fuzzy => Box::new(FuzzyStrategy),
        MergeStrategyKind::Strict => Box::new(StrictStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_for_matches_kind() {
        assert_eq!(strategy_for(MergeStrategyKind::Fuzzy).kind(), MergeStrategyKind::Fuzzy);
        assert_eq!(strategy_for(MergeStrategyKind::Strict).kind(), MergeStrategyKind::Strict);
        assert!(strategy_for(MergeStrategyKind::Fuzzy).allows_shared_words());
        assert!(!strategy_for(MergeStrategyKind::Strict).allows_shared_words());
    }
}
