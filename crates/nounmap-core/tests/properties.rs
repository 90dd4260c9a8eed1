//! Property tests for confidence aggregation and the strict text state.
//!
//! Invariants:
//! - A confidence does not depend on the order in which distinct claimants voted.
//! - Merging confidences is commutative.
//! - Merging two strict mentions yields the same words, surface forms and
//!   claimants whichever side comes first.
//! - Under either strategy, merging three mentions yields the same words,
//!   surface forms and claimants however the merges are grouped, and every
//!   word stays owned.
//! - Under the strict strategy every word has at most one live owner, whatever
//!   the observation sequence.
//! - Repeating an observation never changes a strict text state.
//! - The last phrase of a phrase mapping is never removed.

use nounmap_core::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const WORDS: usize = 6;

/// Six one-word noun phrases, three per sentence
fn document() -> Arc<Text> {
    let mut builder = Text::builder();
    for (i, token) in ["Parser", "Lexer", "Token", "Scanner", "Buffer", "Cursor"]
        .into_iter()
        .enumerate()
    {
        if i == 3 {
            builder.end_sentence();
        }
        builder.phrase(PhraseType::Np, &[token]).unwrap();
    }
    Arc::new(builder.build())
}

fn aggregation() -> impl Strategy<Value = Aggregation> {
    prop_oneof![
        Just(Aggregation::Average),
        Just(Aggregation::Min),
        Just(Aggregation::Max),
        Just(Aggregation::Median),
    ]
}

fn kind() -> impl Strategy<Value = MappingKind> {
    prop_oneof![Just(MappingKind::Name), Just(MappingKind::Type)]
}

fn votes() -> impl Strategy<Value = BTreeMap<u8, f64>> {
    prop::collection::btree_map(0u8..8, 0.0f64..=1.0, 0..6)
}

fn confidence(aggregation: Aggregation, votes: impl Iterator<Item = (u8, f64)>) -> Confidence {
    let mut confidence = Confidence::new(aggregation);
    for (claimant, probability) in votes {
        confidence
            .add_observation(Claimant::new(format!("c{claimant}")), probability)
            .unwrap();
    }
    confidence
}

/// (word, kind, claimant, probability)
fn observations() -> impl Strategy<Value = Vec<(u32, MappingKind, u8, f64)>> {
    prop::collection::vec((0u32..WORDS as u32, kind(), 0u8..4, 0.0f64..=1.0), 1..24)
}

/// (kind, claimant, probability) votes on a single word
fn votes_on_one_word() -> impl Strategy<Value = Vec<(MappingKind, u8, f64)>> {
    prop::collection::vec((kind(), 0u8..4, 0.0f64..=1.0), 1..6)
}

fn observe(state: &mut TextState, (word, kind, claimant, p): (u32, MappingKind, u8, f64)) -> MentionId {
    state
        .add_or_extend_noun_mapping(WordId(word), kind, &Claimant::new(format!("c{claimant}")), p, &[])
        .unwrap()
}

fn strict_state() -> TextState {
    TextState::new(document(), TextStateConfig::strict()).unwrap()
}

fn config() -> impl Strategy<Value = TextStateConfig> {
    prop_oneof![Just(TextStateConfig::fuzzy()), Just(TextStateConfig::strict())]
}

/// Words, surface forms and claimants of a mention
type Evidence = (BTreeSet<WordId>, BTreeSet<String>, BTreeSet<Claimant>);

fn evidence(mention: &NounMapping) -> Evidence {
    let forms = mention.surface_forms().iter().cloned().collect();
    (mention.words().clone(), forms, mention.claimants())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn confidence_is_independent_of_vote_order(agg in aggregation(), votes in votes()) {
        let forward = confidence(agg, votes.iter().map(|(c, p)| (*c, *p)));
        let backward = confidence(agg, votes.iter().rev().map(|(c, p)| (*c, *p)));
        prop_assert!((forward.value() - backward.value()).abs() < 1e-12);
        prop_assert_eq!(forward.claimants(), backward.claimants());
    }

    #[test]
    fn confidence_merge_is_commutative(agg in aggregation(), a in votes(), b in votes()) {
        let left = confidence(agg, a.into_iter());
        let right = confidence(agg, b.into_iter());
        let lr = left.merge(&right);
        let rl = right.merge(&left);
        prop_assert!((lr.value() - rl.value()).abs() < 1e-12);
        prop_assert_eq!(lr.claimants(), rl.claimants());
        for claimant in lr.claimants() {
            prop_assert_eq!(lr.probability_of(&claimant), rl.probability_of(&claimant));
        }
    }

    #[test]
    fn strict_merge_is_symmetric(
        left_word in 0u32..WORDS as u32,
        offset in 1u32..WORDS as u32,
        left_votes in votes_on_one_word(),
        right_votes in votes_on_one_word(),
    ) {
        let right_word = (left_word + offset) % WORDS as u32;

        let mut results = Vec::new();
        for swap in [false, true] {
            let mut state = strict_state();
            let mut a = MentionId(0);
            for (kind, claimant, p) in &left_votes {
                a = observe(&mut state, (left_word, *kind, *claimant, *p));
            }
            let mut b = MentionId(0);
            for (kind, claimant, p) in &right_votes {
                b = observe(&mut state, (right_word, *kind, *claimant, *p));
            }
            let (x, y) = if swap { (b, a) } else { (a, b) };
            let merged = state
                .merge_noun_mappings(x, y, &Claimant::new("linker"), None)
                .unwrap();
            prop_assert!(state.validate().is_ok());
            let mention = state.noun_mapping(merged).unwrap();
            let forms: BTreeSet<String> = mention.surface_forms().iter().cloned().collect();
            results.push((mention.words().clone(), forms, mention.claimants()));
        }
        prop_assert_eq!(&results[0], &results[1]);
    }

    #[test]
    fn three_way_merge_is_independent_of_grouping(
        config in config(),
        words in prop::sample::subsequence((0..WORDS as u32).collect::<Vec<_>>(), 3),
        votes in prop::collection::vec((kind(), 0u8..4, 0.0f64..=1.0), 3),
    ) {
        let mut results = Vec::new();
        for grouping in 0..3 {
            let mut state = TextState::new(document(), config.clone()).unwrap();
            let mut ids = Vec::new();
            for (word, (kind, claimant, p)) in words.iter().zip(&votes) {
                let distribution = KindDistribution::with_vote(
                    config.confidence_aggregation,
                    *kind,
                    Claimant::new(format!("c{claimant}")),
                    *p,
                )
                .unwrap();
                ids.push(
                    state
                        .add_noun_mapping(NewNounMapping::new([WordId(*word)], distribution))
                        .unwrap(),
                );
            }
            let (a, b, c) = (ids[0], ids[1], ids[2]);
            let linker = Claimant::new("linker");
            let merged = match grouping {
                0 => {
                    let ab = state.merge_noun_mappings(a, b, &linker, None).unwrap();
                    state.merge_noun_mappings(ab, c, &linker, None).unwrap()
                }
                1 => {
                    let bc = state.merge_noun_mappings(b, c, &linker, None).unwrap();
                    state.merge_noun_mappings(a, bc, &linker, None).unwrap()
                }
                _ => {
                    let ca = state.merge_noun_mappings(c, a, &linker, None).unwrap();
                    state.merge_noun_mappings(ca, b, &linker, None).unwrap()
                }
            };
            prop_assert!(state.validate().is_ok());
            prop_assert_eq!(state.len(), 1);
            for word in &words {
                let owners: Vec<MentionId> = state
                    .noun_mappings_by_word(WordId(*word))
                    .iter()
                    .map(|nm| nm.id())
                    .collect();
                prop_assert_eq!(owners, vec![merged]);
            }
            results.push(evidence(state.noun_mapping(merged).unwrap()));
        }
        prop_assert_eq!(&results[0], &results[1]);
        prop_assert_eq!(&results[0], &results[2]);
        let all: BTreeSet<WordId> = words.iter().map(|w| WordId(*w)).collect();
        prop_assert_eq!(&results[0].0, &all);
    }

    #[test]
    fn strict_words_have_at_most_one_owner(obs in observations()) {
        let mut state = strict_state();
        for o in &obs {
            observe(&mut state, *o);
        }
        prop_assert!(state.validate().is_ok());
        let distinct: BTreeSet<u32> = obs.iter().map(|o| o.0).collect();
        prop_assert_eq!(state.len(), distinct.len());
        for word in 0..WORDS as u32 {
            let owners = state.noun_mappings_by_word(WordId(word)).len();
            prop_assert_eq!(owners, usize::from(distinct.contains(&word)));
        }
    }

    #[test]
    fn repeated_observation_changes_nothing(obs in observations(), pick in any::<prop::sample::Index>()) {
        let mut state = strict_state();
        for o in &obs {
            observe(&mut state, *o);
        }
        let repeat = obs[pick.index(obs.len())];
        let id = observe(&mut state, repeat);
        let before = state.noun_mapping(id).unwrap().distribution().clone();
        let forms = state.noun_mapping(id).unwrap().surface_forms().to_vec();
        let len = state.len();

        prop_assert_eq!(observe(&mut state, repeat), id);
        let mention = state.noun_mapping(id).unwrap();
        prop_assert_eq!(mention.distribution(), &before);
        prop_assert_eq!(mention.surface_forms(), forms.as_slice());
        prop_assert_eq!(state.len(), len);
    }

    #[test]
    fn last_phrase_is_never_removed(obs in observations()) {
        let mut state = strict_state();
        for o in &obs {
            observe(&mut state, *o);
        }
        let targets: Vec<(PhraseMappingId, PhraseId)> = state
            .phrase_mappings()
            .filter(|pm| pm.phrase_count() == 1)
            .filter_map(|pm| pm.phrases().next().map(|p| (pm.id(), p)))
            .collect();
        for (pm, phrase) in targets {
            prop_assert!(state.remove_phrase(pm, phrase).is_err());
            let kept = state.phrase_mapping(pm).unwrap();
            prop_assert_eq!(kept.phrase_count(), 1);
            prop_assert!(kept.contains_phrase(phrase));
        }
        prop_assert!(state.validate().is_ok());
    }
}
