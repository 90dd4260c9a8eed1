//! nounmap: mention fusion for natural-language architecture documentation
//!
//! Several independent analyzers ("claimants") keep proposing, for the same
//! word, a semantic role (NAME or TYPE) with a probability. This crate fuses
//! those overlapping and sometimes contradictory proposals into a stable,
//! queryable set of concept mentions.
//!
//! Key pieces:
//! 1. **Confidence**: per-kind aggregation of claimant votes
//! 2. **NounMapping**: a candidate mention (words, kind distribution, reference)
//! 3. **PhraseMapping**: the phrase group backing each mention
//! 4. **TextStateStrategy**: fuzzy (similarity-driven) or strict (word identity) fusion
//! 5. **TextState**: the aggregate root that owns everything and enforces invariants
//!
//! ## Handles
//!
//! Mentions live in an arena inside the [`TextState`] and are addressed by
//! [`MentionId`]. A merge retires handles; [`TextState::resolve`] forwards a
//! retired handle to its live successor, and a registered
//! [`ReplacementListener`] (for instance a [`TrackedHandle`]) is told as it
//! happens.
//!
//! ## Module Organization
//!
//! - `text`: read-only words and phrases of a document
//! - `confidence`: aggregation functions, `Confidence`, `KindDistribution`
//! - `noun_mapping` / `phrase_mapping`: the mapping entities
//! - `abbreviation`: abbreviations recorded against words and phrases
//! - `strategy`: fusion policies
//! - `text_state`: the aggregate root, its mutations and queries
//! - `replay`: JSON replay of recorded observations

pub mod abbreviation;
pub mod claimant;
pub mod confidence;
pub mod config;
pub mod error;
pub mod listener;
pub mod noun_mapping;
pub mod phrase_mapping;
pub mod replay;
pub mod similarity;
pub mod strategy;
pub mod text;
pub mod text_state;

pub use abbreviation::{Abbreviation, PhraseAbbreviation, WordAbbreviation};
pub use claimant::Claimant;
pub use confidence::{Aggregation, Confidence, KindDistribution, MappingKind, Observation};
pub use config::{ConfigError, MergeStrategyKind, TextStateConfig};
pub use error::{Handle, MentionError, Operation, Result};
pub use listener::{downgrade, ReplacementListener, TrackedHandle};
pub use noun_mapping::{MentionId, MentionKey, NewNounMapping, NounMapping};
pub use phrase_mapping::{PhraseMapping, PhraseMappingId};
pub use replay::{report, replay, MentionReport, ObservationRecord, TextSpec};
pub use similarity::{JaroWinklerSimilarity, LexicalSimilarity};
pub use strategy::{strategy_for, FuzzyStrategy, ObservationPlan, StrictStrategy, TextStateStrategy};
pub use text::{Phrase, PhraseId, PhraseType, Text, TextBuilder, Word, WordId};
pub use text_state::TextState;
