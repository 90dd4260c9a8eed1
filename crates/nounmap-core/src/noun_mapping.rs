//! Noun mappings: candidate concept mentions.
//!
//! A [`NounMapping`] groups the words believed to denote one concept, together
//! with the per-kind confidence distribution the claimants voted for, the
//! canonical reference string and the surface forms seen so far.
//!
//! Mentions are owned by a [`TextState`](crate::TextState) and addressed from
//! outside by their [`MentionId`]. Two mappings compare equal when their
//! references are equal, whatever words they hold.

use crate::claimant::Claimant;
use crate::confidence::{check_probability, KindDistribution, MappingKind};
use crate::error::{MentionError, Operation, Result};
use crate::listener::{ChangeListeners, ReplacementListener};
use crate::text::{PhraseId, Text, WordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Weak;

/// Stable handle of a noun mapping inside one text state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MentionId(pub u64);

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Everything needed to create a noun mapping
#[derive(Debug, Clone, PartialEq)]
pub struct NewNounMapping {
    pub words: BTreeSet<WordId>,
    pub distribution: KindDistribution,
    /// Words whose texts form the reference; the mapping's words when empty
    pub reference_words: Vec<WordId>,
    pub surface_forms: Vec<String>,
    /// Explicit reference; joined reference-word texts when `None`
    pub reference: Option<String>,
    /// Whether an analyzer recognised the words as one compound noun
    pub compound: bool,
}

impl NewNounMapping {
    /// Mention over `words` whose reference is built from the same words
    pub fn new(words: impl IntoIterator<Item = WordId>, distribution: KindDistribution) -> Self {
        let words: BTreeSet<WordId> = words.into_iter().collect();
        Self {
            reference_words: words.iter().copied().collect(),
            words,
            distribution,
            surface_forms: Vec::new(),
            reference: None,
            compound: false,
        }
    }

    pub fn reference_words(mut self, reference_words: Vec<WordId>) -> Self {
        self.reference_words = reference_words;
        self
    }

    pub fn surface_forms(mut self, surface_forms: Vec<String>) -> Self {
        self.surface_forms = surface_forms;
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn compound(mut self, compound: bool) -> Self {
        self.compound = compound;
        self
    }
}

/// Fields that decide whether two mappings are the same entry of a text state
#[derive(Debug, Clone, Copy)]
pub struct MentionKey<'a> {
    pub words: &'a BTreeSet<WordId>,
    pub phrases: &'a BTreeSet<PhraseId>,
    pub reference_words: &'a [WordId],
    pub reference: &'a str,
}

pub struct NounMapping {
    id: MentionId,
    words: BTreeSet<WordId>,
    phrases: BTreeSet<PhraseId>,
    distribution: KindDistribution,
    reference_words: Vec<WordId>,
    surface_forms: Vec<String>,
    reference: String,
    compound: bool,
    creation_time: u64,
    listeners: ChangeListeners<MentionId>,
}

impl NounMapping {
    pub(crate) fn new(
        operation: Operation,
        id: MentionId,
        creation_time: u64,
        text: &Text,
        parts: NewNounMapping,
    ) -> Result<Self> {
        let NewNounMapping {
            words,
            distribution,
            reference_words,
            surface_forms,
            reference,
            compound,
        } = parts;

        if words.is_empty() {
            return Err(MentionError::invalid(operation, "a mention needs at least one word"));
        }
        if let Some(unknown) = words
            .iter()
            .chain(reference_words.iter())
            .find(|w| text.word(**w).is_none())
        {
            return Err(MentionError::invalid(
                operation,
                format!("word {unknown} is not part of the text"),
            ));
        }

        let reference_words = if reference_words.is_empty() {
            words.iter().copied().collect()
        } else {
            reference_words
        };
        let reference = match reference {
            Some(explicit) if !explicit.trim().is_empty() => explicit,
            _ => text.join_words(&reference_words),
        };
        if reference.trim().is_empty() {
            return Err(MentionError::invalid(operation, "empty reference"));
        }
        if !distribution.has_provenance() {
            return Err(MentionError::EmptyProvenance {
                operation,
                reference,
            });
        }

        let mut surface_forms = dedup_preserving_order(surface_forms);
        if surface_forms.is_empty() {
            surface_forms.push(reference.clone());
        }
        let phrases = words
            .iter()
            .filter_map(|w| text.word(*w))
            .map(|w| w.phrase())
            .collect();

        Ok(Self {
            id,
            words,
            phrases,
            distribution,
            reference_words,
            surface_forms,
            reference,
            compound,
            creation_time,
            listeners: ChangeListeners::default(),
        })
    }

    pub fn id(&self) -> MentionId {
        self.id
    }

    /// Words of the mention, in document order
    pub fn words(&self) -> &BTreeSet<WordId> {
        &self.words
    }

    pub fn contains_word(&self, word: WordId) -> bool {
        self.words.contains(&word)
    }

    /// Phrases containing the mention's words
    pub fn phrases(&self) -> &BTreeSet<PhraseId> {
        &self.phrases
    }

    pub fn reference_words(&self) -> &[WordId] {
        &self.reference_words
    }

    pub fn surface_forms(&self) -> &[String] {
        &self.surface_forms
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_compound(&self) -> bool {
        self.compound
    }

    /// Logical creation tick; merged mentions keep the earliest
    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn distribution(&self) -> &KindDistribution {
        &self.distribution
    }

    pub fn kind(&self) -> MappingKind {
        self.distribution.kind()
    }

    pub fn probability(&self) -> f64 {
        self.distribution.probability(self.kind())
    }

    pub fn probability_for_kind(&self, kind: MappingKind) -> f64 {
        self.distribution.probability(kind)
    }

    pub fn claimants(&self) -> BTreeSet<Claimant> {
        self.distribution.claimants()
    }

    /// Distinct one-based sentence numbers of the words, sorted
    pub fn sentence_numbers(&self, text: &Text) -> Vec<usize> {
        let mut numbers: Vec<usize> = self
            .words
            .iter()
            .filter_map(|w| text.word(*w))
            .map(|w| w.sentence_no() + 1)
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    pub fn key(&self) -> MentionKey<'_> {
        MentionKey {
            words: &self.words,
            phrases: &self.phrases,
            reference_words: &self.reference_words,
            reference: &self.reference,
        }
    }

    /// Record one claimant's vote for `kind`; words and reference are unchanged
    pub fn add_kind_with_probability(
        &mut self,
        kind: MappingKind,
        claimant: Claimant,
        probability: f64,
    ) -> Result<()> {
        check_probability(Operation::AddKindWithProbability, probability)?;
        self.distribution.add(kind, claimant, probability)
    }

    pub fn register_change_listener(&mut self, listener: Weak<dyn ReplacementListener<MentionId>>) {
        self.listeners.register(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.live_count()
    }

    /// Tell every listener this mention was replaced; their registrations are
    /// returned so the caller can move them onto the replacement.
    pub(crate) fn notify_replaced(&mut self, replacement: MentionId) -> ChangeListeners<MentionId> {
        self.listeners.notify_replaced(self.id, replacement)
    }

    pub(crate) fn adopt_listeners(&mut self, listeners: ChangeListeners<MentionId>) {
        self.listeners.absorb(listeners);
    }

    /// Append unseen surface forms; returns whether any was new
    pub(crate) fn extend_surface_forms(&mut self, forms: &[String]) -> bool {
        let before = self.surface_forms.len();
        for form in forms {
            if !self.surface_forms.contains(form) {
                self.surface_forms.push(form.clone());
            }
        }
        self.surface_forms.len() != before
    }

    pub(crate) fn set_reference(&mut self, reference_words: Vec<WordId>, reference: String) {
        self.reference_words = reference_words;
        self.reference = reference;
    }

    pub(crate) fn set_compound(&mut self, compound: bool) {
        self.compound = compound;
    }
}

pub(crate) fn dedup_preserving_order(forms: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    forms
        .into_iter()
        .filter(|form| seen.insert(form.clone()))
        .collect()
}

impl PartialEq for NounMapping {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for NounMapping {}

impl Hash for NounMapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl fmt::Debug for NounMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NounMapping")
            .field("id", &self.id)
            .field("reference", &self.reference)
            .field("words", &self.words)
            .field("distribution", &self.distribution)
            .field("surface_forms", &self.surface_forms)
            .field("compound", &self.compound)
            .field("creation_time", &self.creation_time)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl fmt::Display for NounMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions: Vec<String> = self.words.iter().map(|w| w.0.to_string()).collect();
        write!(
            f,
            "NounMapping [distribution={}:{:.3},{}:{:.3}, reference={}, surface forms={}, positions={}, probability={:.3}, compound={}]",
            MappingKind::Name,
            self.probability_for_kind(MappingKind::Name),
            MappingKind::Type,
            self.probability_for_kind(MappingKind::Type),
            self.reference,
            self.surface_forms.join(", "),
            positions.join(", "),
            self.probability(),
            self.compound,
        )
    }
}
