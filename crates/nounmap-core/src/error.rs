//! Error taxonomy for the mention-fusion engine.
//!
//! Every error is a programmer or data error: nothing here is transient and
//! nothing is retried. Each variant names the operation that was requested and,
//! where one exists, the reference of the offending mention so a failed pipeline
//! run can be diagnosed from the message alone.

use crate::config::MergeStrategyKind;
use crate::noun_mapping::MentionId;
use crate::phrase_mapping::PhraseMappingId;
use crate::text::{PhraseId, WordId};
use std::fmt;

pub type Result<T, E = MentionError> = std::result::Result<T, E>;

/// Operation requested when an error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    BuildText,
    AddObservation,
    CreateMention,
    AddOrExtendNounMapping,
    AddNounMapping,
    AddKindWithProbability,
    MergeNounMappings,
    MergeNounMappingGroup,
    RemoveNounMapping,
    SetReference,
    SetCompound,
    AddOrExtendWordAbbreviation,
    AddOrExtendPhraseAbbreviation,
    CreatePhraseMapping,
    MergePhraseMappings,
    RemovePhrase,
    RegisterListener,
    BindStrategy,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::BuildText => "build_text",
            Operation::AddObservation => "add_observation",
            Operation::CreateMention => "create_mention",
            Operation::AddOrExtendNounMapping => "add_or_extend_noun_mapping",
            Operation::AddNounMapping => "add_noun_mapping",
            Operation::AddKindWithProbability => "add_kind_with_probability",
            Operation::MergeNounMappings => "merge_noun_mappings",
            Operation::MergeNounMappingGroup => "merge_noun_mapping_group",
            Operation::RemoveNounMapping => "remove_noun_mapping",
            Operation::SetReference => "set_reference",
            Operation::SetCompound => "set_compound",
            Operation::AddOrExtendWordAbbreviation => "add_or_extend_word_abbreviation",
            Operation::AddOrExtendPhraseAbbreviation => "add_or_extend_phrase_abbreviation",
            Operation::CreatePhraseMapping => "create_phrase_mapping",
            Operation::MergePhraseMappings => "merge_phrase_mappings",
            Operation::RemovePhrase => "remove_phrase",
            Operation::RegisterListener => "register_listener",
            Operation::BindStrategy => "bind_strategy",
            Operation::Query => "query",
        };
        f.write_str(name)
    }
}

/// Handle to something a text state may or may not own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Mention(MentionId),
    PhraseMapping(PhraseMappingId),
    Phrase(PhraseId),
    Word(WordId),
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Mention(id) => write!(f, "noun mapping {id}"),
            Handle::PhraseMapping(id) => write!(f, "phrase mapping {id}"),
            Handle::Phrase(id) => write!(f, "phrase {id}"),
            Handle::Word(id) => write!(f, "word {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MentionError {
    #[error("{operation}: invalid argument: {reason}")]
    InvalidArgument { operation: Operation, reason: String },

    #[error("{operation}: mention `{reference}` carries no claimant")]
    EmptyProvenance {
        operation: Operation,
        reference: String,
    },

    #[error("{operation}: {target} is not owned by this text state")]
    NotInState { operation: Operation, target: Handle },

    #[error("{operation}: word `{word}` ({word_id}) is claimed by {} mentions: {references:?}", references.len())]
    DuplicateWordOwnership {
        operation: Operation,
        word_id: WordId,
        word: String,
        references: Vec<String>,
    },

    #[error("{operation}: invariant violated for `{reference}`: {reason}")]
    InvariantViolation {
        operation: Operation,
        reference: String,
        reason: String,
    },

    #[error("text state already bound to the {bound} strategy")]
    AlreadyBound { bound: MergeStrategyKind },

    #[error("{operation}: no text state strategy bound")]
    Unbound { operation: Operation },
}

impl MentionError {
    pub(crate) fn invalid(operation: Operation, reason: impl Into<String>) -> Self {
        MentionError::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_in_state(operation: Operation, target: Handle) -> Self {
        MentionError::NotInState { operation, target }
    }

    pub(crate) fn invariant(
        operation: Operation,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        MentionError::InvariantViolation {
            operation,
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Operation during which the error was raised, if recorded
    pub fn operation(&self) -> Option<Operation> {
        match self {
            MentionError::InvalidArgument { operation, .. }
            | MentionError::EmptyProvenance { operation, .. }
            | MentionError::NotInState { operation, .. }
            | MentionError::DuplicateWordOwnership { operation, .. }
            | MentionError::InvariantViolation { operation, .. }
            | MentionError::Unbound { operation } => Some(*operation),
            MentionError::AlreadyBound { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation_and_reference() {
        let err = MentionError::invariant(Operation::RemovePhrase, "Logger", "last phrase");
        assert_eq!(
            err.to_string(),
            "remove_phrase: invariant violated for `Logger`: last phrase"
        );
        assert_eq!(err.operation(), Some(Operation::RemovePhrase));
    }

    #[test]
    fn duplicate_ownership_counts_owners() {
        let err = MentionError::DuplicateWordOwnership {
            operation: Operation::AddOrExtendNounMapping,
            word_id: WordId(3),
            word: "Logger".to_string(),
            references: vec!["Logger".to_string(), "the Logger".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("claimed by 2 mentions"));
        assert!(message.contains("w3"));
    }

    #[test]
    fn not_in_state_names_the_handle() {
        let err = MentionError::not_in_state(
            Operation::MergeNounMappings,
            Handle::Mention(MentionId(7)),
        );
        assert_eq!(
            err.to_string(),
            "merge_noun_mappings: noun mapping m7 is not owned by this text state"
        );
    }
}
