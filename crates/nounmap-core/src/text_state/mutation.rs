//! Mutating operations. All of them route through the bound strategy.

use super::{MergeOrigin, TextState};
use crate::claimant::Claimant;
use crate::confidence::{check_probability, KindDistribution, MappingKind};
use crate::error::{Handle, MentionError, Operation, Result};
use crate::listener::{downgrade, ReplacementListener, TrackedHandle};
use crate::noun_mapping::{MentionId, MentionKey, NewNounMapping, NounMapping};
use crate::phrase_mapping::{PhraseMapping, PhraseMappingId};
use crate::strategy::ObservationPlan;
use crate::text::{PhraseId, WordId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

impl TextState {
    // ========================================================================
    // Observations
    // ========================================================================

    /// Absorb one claimant's vote that `word` is of `kind`.
    ///
    /// Returns the mention now holding the evidence: an extended existing
    /// mention, a new one-word mention, or the result of a merge. Empty
    /// `surface_forms` stand for the word's own text on a new mention and
    /// leave an extended mention's forms alone.
    pub fn add_or_extend_noun_mapping(
        &mut self,
        word: WordId,
        kind: MappingKind,
        claimant: &Claimant,
        probability: f64,
        surface_forms: &[String],
    ) -> Result<MentionId> {
        let operation = Operation::AddOrExtendNounMapping;
        check_probability(operation, probability)?;
        let text = Arc::clone(&self.text);
        let observed = text
            .word(word)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::Word(word)))?;
        let plan = self
            .strategy(operation)?
            .plan_observation(self, observed, surface_forms)?;

        let supplied = surface_forms;
        let surface_forms = if supplied.is_empty() {
            vec![observed.text().to_string()]
        } else {
            supplied.to_vec()
        };

        match plan {
            ObservationPlan::Extend(id) => {
                self.extend(operation, id, kind, claimant, probability, supplied)?;
                Ok(id)
            }
            ObservationPlan::Create => {
                let candidate = self.observation_candidate(
                    operation,
                    word,
                    kind,
                    claimant,
                    probability,
                    surface_forms,
                )?;
                let id = self.insert(operation, candidate)?;
                debug!(
                    mention = %id,
                    word = %observed.text(),
                    kind = %kind,
                    claimant = %claimant,
                    probability,
                    "noun mapping created"
                );
                Ok(id)
            }
            ObservationPlan::MergeInto(target) => {
                let candidate = self.observation_candidate(
                    operation,
                    word,
                    kind,
                    claimant,
                    probability,
                    surface_forms,
                )?;
                let existing = self.live(operation, target)?;
                let creation_time = existing.creation_time().min(candidate.creation_time());
                let parts = self.merge_parts(
                    operation,
                    existing,
                    &candidate,
                    MergeOrigin::Observation,
                    None,
                )?;
                let merged = self.build_mention(operation, creation_time, parts)?;
                self.commit_merge(operation, &[target], merged)
            }
        }
    }

    /// Disposable one-word mention carrying a single vote
    fn observation_candidate(
        &self,
        operation: Operation,
        word: WordId,
        kind: MappingKind,
        claimant: &Claimant,
        probability: f64,
        surface_forms: Vec<String>,
    ) -> Result<NounMapping> {
        let distribution = KindDistribution::with_vote(
            self.config.confidence_aggregation,
            kind,
            claimant.clone(),
            probability,
        )?;
        let parts = NewNounMapping::new([word], distribution).surface_forms(surface_forms);
        self.build_mention(operation, self.next_tick(), parts)
    }

    fn extend(
        &mut self,
        operation: Operation,
        id: MentionId,
        kind: MappingKind,
        claimant: &Claimant,
        probability: f64,
        surface_forms: &[String],
    ) -> Result<()> {
        let mention = self
            .noun_mappings
            .get_mut(&id)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::Mention(id)))?;
        mention.add_kind_with_probability(kind, claimant.clone(), probability)?;
        let new_forms = mention.extend_surface_forms(surface_forms);
        debug!(
            mention = %id,
            reference = %mention.reference(),
            kind = %kind,
            claimant = %claimant,
            probability,
            new_forms,
            "noun mapping extended"
        );
        Ok(())
    }

    /// Insert a mention built by a higher-level analyzer
    pub fn add_noun_mapping(&mut self, mention: NewNounMapping) -> Result<MentionId> {
        let operation = Operation::AddNounMapping;
        self.strategy(operation)?;
        let mention = self.build_mention(operation, self.next_tick(), mention)?;
        let reference = mention.reference().to_string();
        let id = self.insert(operation, mention)?;
        debug!(mention = %id, reference = %reference, "noun mapping added");
        Ok(id)
    }

    /// Record a vote on a live mention; words and reference are unchanged
    pub fn add_kind_with_probability(
        &mut self,
        id: MentionId,
        kind: MappingKind,
        claimant: &Claimant,
        probability: f64,
    ) -> Result<()> {
        let operation = Operation::AddKindWithProbability;
        let mention = self
            .noun_mappings
            .get_mut(&id)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::Mention(id)))?;
        mention.add_kind_with_probability(kind, claimant.clone(), probability)?;
        debug!(mention = %id, kind = %kind, claimant = %claimant, probability, "vote recorded");
        Ok(())
    }

    // ========================================================================
    // Merges and removal
    // ========================================================================

    /// Merge `b` into `a`.
    ///
    /// Both are retired in favour of a new mention that every listener of
    /// either is moved to. `reference_words` overrides the strategy's
    /// reference computation.
    pub fn merge_noun_mappings(
        &mut self,
        a: MentionId,
        b: MentionId,
        claimant: &Claimant,
        reference_words: Option<Vec<WordId>>,
    ) -> Result<MentionId> {
        let operation = Operation::MergeNounMappings;
        if a == b {
            return Err(MentionError::invalid(
                operation,
                format!("cannot merge {a} with itself"),
            ));
        }
        let first = self.live(operation, a)?;
        let second = self.live(operation, b)?;
        let creation_time = first.creation_time().min(second.creation_time());
        let parts = self.merge_parts(
            operation,
            first,
            second,
            MergeOrigin::Request(claimant),
            reference_words,
        )?;
        let merged = self.build_mention(operation, creation_time, parts)?;
        self.commit_merge(operation, &[a, b], merged)
    }

    /// Fold `others` into `target` in one step.
    ///
    /// Handles already merged away are followed to their live successor, and
    /// handles that end up naming the same mention are merged once.
    pub fn merge_noun_mapping_group(
        &mut self,
        target: MentionId,
        others: &[MentionId],
        claimant: &Claimant,
    ) -> Result<MentionId> {
        let operation = Operation::MergeNounMappingGroup;
        let resolve = |state: &TextState, id: MentionId| {
            state
                .resolve(id)
                .ok_or_else(|| MentionError::not_in_state(operation, Handle::Mention(id)))
        };

        let target = resolve(self, target)?;
        let mut members = vec![target];
        for other in others {
            let live = resolve(self, *other)?;
            if !members.contains(&live) {
                members.push(live);
            }
        }
        if members.len() == 1 {
            return Ok(target);
        }

        let mut folded: Option<NounMapping> = None;
        for next in &members[1..] {
            let second = self.live(operation, *next)?;
            let first = match &folded {
                Some(partial) => partial,
                None => self.live(operation, target)?,
            };
            let creation_time = first.creation_time().min(second.creation_time());
            let origin = MergeOrigin::Request(claimant);
            let parts = self.merge_parts(operation, first, second, origin, None)?;
            folded = Some(self.build_mention(operation, creation_time, parts)?);
        }
        let merged = folded.ok_or_else(|| MentionError::invalid(operation, "empty merge group"))?;
        self.commit_merge(operation, &members, merged)
    }

    /// Delete `mapping`, handing its listeners to `replacement`.
    ///
    /// Phrases only `mapping` used are detached from its phrase mapping; a
    /// phrase mapping left backing nothing is retired in favour of the
    /// replacement's.
    pub fn remove_noun_mapping(&mut self, mapping: MentionId, replacement: MentionId) -> Result<()> {
        let operation = Operation::RemoveNounMapping;
        if mapping == replacement {
            return Err(MentionError::invalid(
                operation,
                format!("{mapping} cannot replace itself"),
            ));
        }
        let phrases = self.live(operation, mapping)?.phrases().clone();
        self.live(operation, replacement)?;

        if let Some(phrase_mapping) = self.retire_noun_mapping(mapping, replacement) {
            self.detach_exclusive_phrases(phrase_mapping, &phrases, replacement);
        }
        Ok(())
    }

    fn detach_exclusive_phrases(
        &mut self,
        phrase_mapping: PhraseMappingId,
        removed_phrases: &BTreeSet<PhraseId>,
        replacement: MentionId,
    ) {
        let still_used: BTreeSet<PhraseId> = self
            .backing
            .iter()
            .filter(|(_, pm)| **pm == phrase_mapping)
            .filter_map(|(id, _)| self.noun_mappings.get(id))
            .flat_map(|nm| nm.phrases().iter().copied())
            .collect();

        if still_used.is_empty() {
            if let Some(target) = self.backing.get(&replacement).copied() {
                self.release_phrase_mapping(phrase_mapping, target);
            }
            return;
        }

        let Some(pm) = self.phrase_mappings.get_mut(&phrase_mapping) else {
            return;
        };
        let exclusive: Vec<PhraseId> = removed_phrases
            .difference(&still_used)
            .filter(|p| pm.contains_phrase(**p))
            .copied()
            .collect();
        for phrase in exclusive {
            if let Err(err) = pm.remove_phrase(phrase) {
                warn!(phrase_mapping = %phrase_mapping, error = %err, "phrase not detached");
            }
        }
    }

    /// Replace a mention's reference words and reference string.
    ///
    /// The reference is the joined reference-word texts when `reference` is
    /// `None`.
    pub fn set_reference(
        &mut self,
        id: MentionId,
        reference_words: Vec<WordId>,
        reference: Option<String>,
    ) -> Result<()> {
        let operation = Operation::SetReference;
        let strategy = self.strategy(operation)?;
        let mention = self.live(operation, id)?;
        if reference_words.is_empty() {
            return Err(MentionError::invalid(operation, "no reference words"));
        }
        if let Some(unknown) = reference_words.iter().find(|w| self.text.word(**w).is_none()) {
            return Err(MentionError::invalid(
                operation,
                format!("word {unknown} is not part of the text"),
            ));
        }
        let reference = match reference {
            Some(explicit) if explicit.trim().is_empty() => {
                return Err(MentionError::invalid(operation, "empty reference"));
            }
            Some(explicit) => explicit,
            None => self.text.join_words(&reference_words),
        };

        let key = MentionKey {
            words: mention.words(),
            phrases: mention.phrases(),
            reference_words: &reference_words,
            reference: &reference,
        };
        let duplicate = self
            .noun_mappings
            .values()
            .filter(|nm| nm.id() != id)
            .find(|nm| strategy.is_duplicate(nm.key(), key));
        if let Some(existing) = duplicate {
            return Err(MentionError::invariant(
                operation,
                reference,
                format!("duplicates live mention {}", existing.id()),
            ));
        }

        if let Some(mention) = self.noun_mappings.get_mut(&id) {
            debug!(mention = %id, from = %mention.reference(), to = %reference, "reference set");
            mention.set_reference(reference_words, reference);
        }
        Ok(())
    }

    /// Mark or unmark a mention as a compound noun
    pub fn set_compound(&mut self, id: MentionId, compound: bool) -> Result<()> {
        let operation = Operation::SetCompound;
        self.strategy(operation)?;
        let mention = self
            .noun_mappings
            .get_mut(&id)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::Mention(id)))?;
        mention.set_compound(compound);
        debug!(mention = %id, reference = %mention.reference(), compound, "compound flag set");
        Ok(())
    }

    // ========================================================================
    // Phrase mappings
    // ========================================================================

    /// Union two phrase mappings into a new one and retire both
    pub fn merge_phrase_mappings(
        &mut self,
        p: PhraseMappingId,
        q: PhraseMappingId,
    ) -> Result<PhraseMappingId> {
        let operation = Operation::MergePhraseMappings;
        if p == q {
            return Err(MentionError::invalid(
                operation,
                format!("cannot merge {p} with itself"),
            ));
        }
        let first = self.live_phrase_mapping(operation, p)?;
        let second = self.live_phrase_mapping(operation, q)?;
        let merged = PhraseMapping::new(
            operation,
            PhraseMappingId(self.next_phrase_mapping),
            &self.text,
            first.phrases().chain(second.phrases()),
        )?;

        let merged_id = merged.id();
        self.next_phrase_mapping += 1;
        self.phrase_mappings.insert(merged_id, merged);
        for backing in self.backing.values_mut() {
            if *backing == p || *backing == q {
                *backing = merged_id;
            }
        }
        self.retire_phrase_mapping(p, merged_id);
        self.retire_phrase_mapping(q, merged_id);
        debug!(merged = %merged_id, first = %p, second = %q, "phrase mappings merged");
        Ok(merged_id)
    }

    /// Merge two phrase mappings, then each pair of mentions they back.
    ///
    /// Every handle is checked before anything changes. Mention handles are
    /// resolved again before each pair merge, so pairs may overlap.
    pub fn merge_phrase_mappings_and_noun_mappings(
        &mut self,
        p: PhraseMappingId,
        q: PhraseMappingId,
        pairs: &[(MentionId, MentionId)],
        claimant: &Claimant,
    ) -> Result<PhraseMappingId> {
        let operation = Operation::MergePhraseMappings;
        self.live_phrase_mapping(operation, p)?;
        self.live_phrase_mapping(operation, q)?;
        for (a, b) in pairs {
            self.live(operation, *a)?;
            self.live(operation, *b)?;
        }

        let merged = self.merge_phrase_mappings(p, q)?;
        for (a, b) in pairs {
            let (Some(a), Some(b)) = (self.resolve(*a), self.resolve(*b)) else {
                continue;
            };
            if a != b {
                self.merge_noun_mappings(a, b, claimant, None)?;
            }
        }
        Ok(self.resolve_phrase_mapping(merged).unwrap_or(merged))
    }

    /// Remove one phrase from a live phrase mapping.
    ///
    /// A phrase mapping must keep every phrase its mentions' words sit in, so
    /// a phrase still backing a mention is refused as well as the mapping's
    /// last phrase. Both failures leave the state unchanged; detach a mention
    /// with [`remove_noun_mapping`](Self::remove_noun_mapping) first.
    pub fn remove_phrase(&mut self, id: PhraseMappingId, phrase: PhraseId) -> Result<()> {
        let operation = Operation::RemovePhrase;
        self.live_phrase_mapping(operation, id)?;
        let user = self
            .backing
            .iter()
            .filter(|(_, pm)| **pm == id)
            .filter_map(|(mention, _)| self.noun_mappings.get(mention))
            .find(|nm| nm.phrases().contains(&phrase));
        if let Some(user) = user {
            return Err(MentionError::invariant(
                operation,
                user.reference(),
                format!("{phrase} backs mention {}", user.id()),
            ));
        }

        let pm = self
            .phrase_mappings
            .get_mut(&id)
            .ok_or_else(|| MentionError::not_in_state(operation, Handle::PhraseMapping(id)))?;
        pm.remove_phrase(phrase)?;
        debug!(phrase_mapping = %id, phrase = %phrase, "phrase removed");
        Ok(())
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a weak listener on a live mention
    pub fn register_noun_mapping_listener<L>(&mut self, id: MentionId, listener: &Arc<L>) -> Result<()>
    where
        L: ReplacementListener<MentionId> + 'static,
    {
        let mention = self.noun_mappings.get_mut(&id).ok_or_else(|| {
            MentionError::not_in_state(Operation::RegisterListener, Handle::Mention(id))
        })?;
        mention.register_change_listener(downgrade(listener));
        Ok(())
    }

    /// Register a weak listener on a live phrase mapping
    pub fn register_phrase_mapping_listener<L>(
        &mut self,
        id: PhraseMappingId,
        listener: &Arc<L>,
    ) -> Result<()>
    where
        L: ReplacementListener<PhraseMappingId> + 'static,
    {
        let pm = self.phrase_mappings.get_mut(&id).ok_or_else(|| {
            MentionError::not_in_state(Operation::RegisterListener, Handle::PhraseMapping(id))
        })?;
        pm.register_change_listener(downgrade(listener));
        Ok(())
    }

    /// Handle to a live mention that follows its merges
    pub fn track_noun_mapping(&mut self, id: MentionId) -> Result<Arc<TrackedHandle<MentionId>>> {
        let handle = TrackedHandle::new(id);
        self.register_noun_mapping_listener(id, &handle)?;
        Ok(handle)
    }

    /// Handle to a live phrase mapping that follows its merges
    pub fn track_phrase_mapping(
        &mut self,
        id: PhraseMappingId,
    ) -> Result<Arc<TrackedHandle<PhraseMappingId>>> {
        let handle = TrackedHandle::new(id);
        self.register_phrase_mapping_listener(id, &handle)?;
        Ok(handle)
    }
}
