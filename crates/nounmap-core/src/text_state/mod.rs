//! The aggregate root: every mention and phrase mapping of one document.
//!
//! ```text
//!   TextState
//!   ├── noun_mappings     MentionId ──► NounMapping        (arena)
//!   ├── order             (creation_time, MentionId)        (iteration order)
//!   ├── word_index        WordId ──► {MentionId}
//!   ├── phrase_mappings   PhraseMappingId ──► PhraseMapping (arena)
//!   ├── backing           MentionId ──► PhraseMappingId
//!   ├── redirects         retired handle ──► replacement
//!   └── abbreviations     "DB" ──► [WordId] / [PhraseId]
//! ```
//!
//! Mentions and phrase mappings are owned by value and addressed by handle.
//! A handle retired by a merge or removal keeps forwarding to its live
//! successor through [`TextState::resolve`], and registered listeners are
//! told about the replacement as it happens.
//!
//! Every mutation validates all of its inputs and plans every allocation
//! before the first write, so a failed call leaves the state untouched.
//! Mutation takes `&mut self`; concurrent callers serialize behind one lock.

mod abbreviations;
mod mutation;
mod queries;

use crate::abbreviation::{PhraseAbbreviation, WordAbbreviation};
use crate::claimant::Claimant;
use crate::config::TextStateConfig;
use crate::error::{Handle, MentionError, Operation, Result};
use crate::noun_mapping::{MentionId, NewNounMapping, NounMapping};
use crate::phrase_mapping::{PhraseMapping, PhraseMappingId};
use crate::similarity::{JaroWinklerSimilarity, LexicalSimilarity};
use crate::strategy::{strategy_for, TextStateStrategy};
use crate::text::{PhraseId, Text, WordId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct TextState {
    text: Arc<Text>,
    config: TextStateConfig,
    similarity: Arc<dyn LexicalSimilarity>,
    strategy: Option<Box<dyn TextStateStrategy>>,

    noun_mappings: BTreeMap<MentionId, NounMapping>,
    order: BTreeSet<(u64, MentionId)>,
    word_index: HashMap<WordId, BTreeSet<MentionId>>,

    phrase_mappings: BTreeMap<PhraseMappingId, PhraseMapping>,
    backing: BTreeMap<MentionId, PhraseMappingId>,

    mention_redirects: HashMap<MentionId, MentionId>,
    phrase_mapping_redirects: HashMap<PhraseMappingId, PhraseMappingId>,

    word_abbreviations: BTreeMap<String, WordAbbreviation>,
    phrase_abbreviations: BTreeMap<String, PhraseAbbreviation>,

    next_mention: u64,
    next_phrase_mapping: u64,
    clock: u64,
}

/// Phrase mapping chosen for a mention about to be inserted
enum Backing {
    Existing(PhraseMappingId),
    New(PhraseMapping),
}

/// Why two mentions are being merged
#[derive(Clone, Copy)]
enum MergeOrigin<'a> {
    /// A one-word observation absorbed by a similar mention
    Observation,
    /// An explicit request on behalf of a claimant
    Request(&'a Claimant),
}

impl TextState {
    /// State bound to the configured strategy, using Jaro-Winkler similarity
    /// at the configured threshold.
    pub fn new(text: Arc<Text>, config: TextStateConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| MentionError::invalid(Operation::BindStrategy, err.to_string()))?;
        let similarity = Arc::new(JaroWinklerSimilarity::new(config.similarity_threshold));
        let strategy = strategy_for(config.merge_strategy);
        let mut state = Self::unbound(text, config, similarity);
        state.bind_strategy(strategy)?;
        Ok(state)
    }

    /// State with no strategy yet; bind one with [`bind_strategy`](Self::bind_strategy)
    pub fn unbound(
        text: Arc<Text>,
        config: TextStateConfig,
        similarity: Arc<dyn LexicalSimilarity>,
    ) -> Self {
        Self {
            text,
            config,
            similarity,
            strategy: None,
            noun_mappings: BTreeMap::new(),
            order: BTreeSet::new(),
            word_index: HashMap::new(),
            phrase_mappings: BTreeMap::new(),
            backing: BTreeMap::new(),
            mention_redirects: HashMap::new(),
            phrase_mapping_redirects: HashMap::new(),
            word_abbreviations: BTreeMap::new(),
            phrase_abbreviations: BTreeMap::new(),
            next_mention: 1,
            next_phrase_mapping: 1,
            clock: 0,
        }
    }

    /// Bind the fusion policy; a state is bound at most once
    pub fn bind_strategy(&mut self, strategy: Box<dyn TextStateStrategy>) -> Result<()> {
        if let Some(bound) = &self.strategy {
            return Err(MentionError::AlreadyBound {
                bound: bound.kind(),
            });
        }
        debug!(strategy = %strategy.kind(), "text state strategy bound");
        self.strategy = Some(strategy);
        Ok(())
    }

    pub(crate) fn strategy(&self, operation: Operation) -> Result<&dyn TextStateStrategy> {
        self.strategy
            .as_deref()
            .ok_or(MentionError::Unbound { operation })
    }

    pub(crate) fn live(&self, operation: Operation, id: MentionId) -> Result<&NounMapping> {
        self.noun_mappings
            .get(&id)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::Mention(id)))
    }

    pub(crate) fn live_phrase_mapping(
        &self,
        operation: Operation,
        id: PhraseMappingId,
    ) -> Result<&PhraseMapping> {
        self.phrase_mappings
            .get(&id)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::PhraseMapping(id)))
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    fn next_tick(&self) -> u64 {
        self.clock + 1
    }

    /// Build a mention under the next free handle without inserting it
    fn build_mention(
        &self,
        operation: Operation,
        creation_time: u64,
        parts: NewNounMapping,
    ) -> Result<NounMapping> {
        NounMapping::new(
            operation,
            MentionId(self.next_mention),
            creation_time,
            &self.text,
            parts,
        )
    }

    /// Reject a candidate that would break word ownership or duplicate a live
    /// mention. Mentions in `replacing` are about to be retired and ignored.
    fn check_insertable(
        &self,
        operation: Operation,
        candidate: &NounMapping,
        replacing: &[MentionId],
    ) -> Result<()> {
        let strategy = self.strategy(operation)?;

        if !strategy.allows_shared_words() {
            for word in candidate.words() {
                let owners: Vec<&NounMapping> = self
                    .word_index
                    .get(word)
                    .into_iter()
                    .flatten()
                    .filter(|id| !replacing.contains(*id))
                    .filter_map(|id| self.noun_mappings.get(id))
                    .collect();
                if owners.is_empty() {
                    continue;
                }
                let mut references: Vec<String> =
                    owners.iter().map(|nm| nm.reference().to_string()).collect();
                references.push(candidate.reference().to_string());
                let word_text = self
                    .text
                    .word(*word)
                    .map(|w| w.text().to_string())
                    .unwrap_or_default();
                warn!(
                    operation = %operation,
                    word = %word_text,
                    owners = ?references,
                    "insert would share a word between mentions"
                );
                return Err(MentionError::DuplicateWordOwnership {
                    operation,
                    word_id: *word,
                    word: word_text,
                    references,
                });
            }
        }

        let duplicate = self
            .noun_mappings
            .values()
            .filter(|nm| !replacing.contains(&nm.id()))
            .find(|nm| strategy.is_duplicate(nm.key(), candidate.key()));
        if let Some(existing) = duplicate {
            return Err(MentionError::invariant(
                operation,
                candidate.reference(),
                format!("duplicates live mention {}", existing.id()),
            ));
        }
        Ok(())
    }

    /// First live phrase mapping covering `phrases`, or a new one
    fn plan_backing(&self, operation: Operation, phrases: &BTreeSet<PhraseId>) -> Result<Backing> {
        if let Some(existing) = self.phrase_mappings.values().find(|pm| pm.covers(phrases)) {
            return Ok(Backing::Existing(existing.id()));
        }
        let created = PhraseMapping::new(
            operation,
            PhraseMappingId(self.next_phrase_mapping),
            &self.text,
            phrases.iter().copied(),
        )?;
        Ok(Backing::New(created))
    }

    /// Infallible second half of an insert
    fn commit_insert(&mut self, mention: NounMapping, backing: Backing) -> MentionId {
        let id = mention.id();
        self.next_mention = self.next_mention.max(id.0 + 1);
        self.clock = self.clock.max(mention.creation_time());

        let phrase_mapping = match backing {
            Backing::Existing(pm) => pm,
            Backing::New(pm) => {
                let pm_id = pm.id();
                self.next_phrase_mapping = self.next_phrase_mapping.max(pm_id.0 + 1);
                debug!(phrase_mapping = %pm_id, phrases = pm.phrase_count(), "phrase mapping created");
                self.phrase_mappings.insert(pm_id, pm);
                pm_id
            }
        };

        for word in mention.words() {
            self.word_index.entry(*word).or_default().insert(id);
        }
        self.order.insert((mention.creation_time(), id));
        self.backing.insert(id, phrase_mapping);
        self.noun_mappings.insert(id, mention);
        id
    }

    /// Validate and insert a freshly built mention
    fn insert(&mut self, operation: Operation, mention: NounMapping) -> Result<MentionId> {
        self.check_insertable(operation, &mention, &[])?;
        let backing = self.plan_backing(operation, mention.phrases())?;
        Ok(self.commit_insert(mention, backing))
    }

    // ========================================================================
    // Retirement
    // ========================================================================

    /// Drop a mention, hand its listeners to `replacement` and forward its
    /// handle. Returns the phrase mapping that backed it.
    fn retire_noun_mapping(
        &mut self,
        id: MentionId,
        replacement: MentionId,
    ) -> Option<PhraseMappingId> {
        let mut retired = self.noun_mappings.remove(&id)?;
        self.order.remove(&(retired.creation_time(), id));
        for word in retired.words() {
            if let Some(owners) = self.word_index.get_mut(word) {
                owners.remove(&id);
                if owners.is_empty() {
                    self.word_index.remove(word);
                }
            }
        }

        let listeners = retired.notify_replaced(replacement);
        if let Some(target) = self.noun_mappings.get_mut(&replacement) {
            target.adopt_listeners(listeners);
        }
        self.mention_redirects.insert(id, replacement);
        debug!(
            retired = %id,
            replacement = %replacement,
            reference = %retired.reference(),
            "noun mapping retired"
        );
        self.backing.remove(&id)
    }

    fn retire_phrase_mapping(&mut self, id: PhraseMappingId, replacement: PhraseMappingId) {
        let Some(mut retired) = self.phrase_mappings.remove(&id) else {
            return;
        };
        let listeners = retired.notify_replaced(replacement);
        if let Some(target) = self.phrase_mappings.get_mut(&replacement) {
            target.adopt_listeners(listeners);
        }
        self.phrase_mapping_redirects.insert(id, replacement);
        debug!(retired = %id, replacement = %replacement, "phrase mapping retired");
    }

    /// Retire a phrase mapping that no longer backs any live mention
    fn release_phrase_mapping(&mut self, id: PhraseMappingId, replacement: PhraseMappingId) {
        if id == replacement || self.backing.values().any(|pm| *pm == id) {
            return;
        }
        self.retire_phrase_mapping(id, replacement);
    }

    // ========================================================================
    // Shared merge algorithm
    // ========================================================================

    /// Parts of the mention produced by merging `second` into `first`.
    ///
    /// An explicit merge request records the requesting claimant's vote for
    /// the first mention's kind unless that claimant already voted for it.
    fn merge_parts(
        &self,
        operation: Operation,
        first: &NounMapping,
        second: &NounMapping,
        origin: MergeOrigin<'_>,
        reference_words: Option<Vec<WordId>>,
    ) -> Result<NewNounMapping> {
        let strategy = self.strategy(operation)?;
        let words = match origin {
            MergeOrigin::Observation => strategy.observation_words(first, second),
            MergeOrigin::Request(_) => strategy.merged_words(first, second),
        };

        let mut distribution = first.distribution().merge(second.distribution());
        if let MergeOrigin::Request(claimant) = origin {
            let kind = first.kind();
            if distribution.get(kind).probability_of(claimant).is_none() {
                distribution.add(kind, claimant.clone(), first.probability_for_kind(kind))?;
            }
        }

        let mut surface_forms = first.surface_forms().to_vec();
        surface_forms.extend(second.surface_forms().iter().cloned());

        let (reference_words, reference) = match reference_words {
            Some(explicit) if !explicit.is_empty() => {
                let reference = self.text.join_words(&explicit);
                (explicit, reference)
            }
            _ => {
                let reference_words = strategy.merged_reference_words(first, second);
                let reference =
                    strategy.merged_reference(&self.text, first, second, &reference_words);
                (reference_words, reference)
            }
        };

        Ok(NewNounMapping {
            words,
            distribution,
            reference_words,
            surface_forms,
            reference: Some(reference),
            compound: first.is_compound() || second.is_compound(),
        })
    }

    /// Insert `merged` and retire `replaced` in its favour.
    ///
    /// The merged mention is inserted before anything is retired so listeners
    /// are always handed a live replacement. Phrase mappings of the retired
    /// mentions that back nothing afterwards are retired in favour of the
    /// merged mention's phrase mapping.
    fn commit_merge(
        &mut self,
        operation: Operation,
        replaced: &[MentionId],
        merged: NounMapping,
    ) -> Result<MentionId> {
        self.check_insertable(operation, &merged, replaced)?;
        let backing = self.plan_backing(operation, merged.phrases())?;

        let previous_backing: Vec<PhraseMappingId> = replaced
            .iter()
            .filter_map(|id| self.backing.get(id).copied())
            .collect();
        let merged_id = self.commit_insert(merged, backing);
        for id in replaced {
            self.retire_noun_mapping(*id, merged_id);
        }
        if let Some(merged_backing) = self.backing.get(&merged_id).copied() {
            for pm in previous_backing {
                self.release_phrase_mapping(pm, merged_backing);
            }
        }

        if let Some(merged) = self.noun_mappings.get(&merged_id) {
            debug!(
                operation = %operation,
                merged = %merged_id,
                replaced = ?replaced,
                reference = %merged.reference(),
                words = merged.words().len(),
                "noun mappings merged"
            );
        }
        Ok(merged_id)
    }
}
