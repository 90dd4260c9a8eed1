use super::{ObservationPlan, TextStateStrategy};
use crate::config::MergeStrategyKind;
use crate::error::{MentionError, Operation, Result};
use crate::noun_mapping::{MentionKey, NounMapping};
use crate::text::{Word, WordId};
use crate::text_state::TextState;
use std::collections::BTreeSet;
use tracing::{trace, warn};

/// Merges only on exact word identity.
///
/// A word belongs to at most one live mention. An observation of a word that
/// is already owned extends the owner in place when it names no surface forms
/// or exactly the owner's, and is rejected otherwise. An observation of an
/// unowned word creates a new one-word mention.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictStrategy;

impl TextStateStrategy for StrictStrategy {
    fn kind(&self) -> MergeStrategyKind {
        MergeStrategyKind::Strict
    }

    fn plan_observation(
        &self,
        state: &TextState,
        word: &Word,
        surface_forms: &[String],
    ) -> Result<ObservationPlan> {
        let owners = state.noun_mappings_by_word(word.id());
        match owners.as_slice() {
            [] => Ok(ObservationPlan::Create),
            [owner] if surface_forms.is_empty() || surface_forms == owner.surface_forms() => {
                trace!(word = %word.text(), mention = %owner.id(), "word already owned");
                Ok(ObservationPlan::Extend(owner.id()))
            }
            [owner] => {
                // Different surface forms would need a second mention over the word.
                warn!(
                    word = %word.text(),
                    mention = %owner.id(),
                    owned = ?owner.surface_forms(),
                    observed = ?surface_forms,
                    "surface forms differ from the owner's"
                );
                Err(MentionError::DuplicateWordOwnership {
                    operation: Operation::AddOrExtendNounMapping,
                    word_id: word.id(),
                    word: word.text().to_string(),
                    references: vec![owner.reference().to_string(), surface_forms.join(" ")],
                })
            }
            _ => {
                let references: Vec<String> =
                    owners.iter().map(|nm| nm.reference().to_string()).collect();
                warn!(
                    word = %word.text(),
                    owners = ?references,
                    "word claimed by several mentions"
                );
                Err(MentionError::DuplicateWordOwnership {
                    operation: Operation::AddOrExtendNounMapping,
                    word_id: word.id(),
                    word: word.text().to_string(),
                    references,
                })
            }
        }
    }

    /// Reference words of both sides in document order
    fn merged_reference_words(&self, first: &NounMapping, second: &NounMapping) -> Vec<WordId> {
        let words: BTreeSet<WordId> = first
            .reference_words()
            .iter()
            .chain(second.reference_words())
            .copied()
            .collect();
        words.into_iter().collect()
    }

    fn allows_shared_words(&self) -> bool {
        false
    }

    fn is_duplicate(&self, existing: MentionKey<'_>, candidate: MentionKey<'_>) -> bool {
        existing.reference == candidate.reference && existing.phrases == candidate.phrases
    }
}
