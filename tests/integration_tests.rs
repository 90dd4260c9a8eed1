//! Integration tests for the complete nounmap pipeline
//!
//! These tests drive the engine the way the `nounmap` binary does:
//! - JSON document → Text
//! - JSON observations → replay under a configured strategy
//! - TextState → mention report → JSON
//!
//! Run with: cargo test --test integration_tests

use nounmap_core::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::tempdir;

const DOCUMENT: &str = r#"{
    "sentences": [
        { "phrases": [
            { "type": "NP", "words": ["The", "Logger"] },
            { "type": "VP", "words": [{ "text": "writes", "lemma": "write", "pos": "VBZ" }] },
            { "type": "NP", "words": [{ "text": "events", "lemma": "event", "pos": "NNS" }] }
        ] },
        { "phrases": [
            { "type": "NP", "words": [{ "text": "Loggers", "lemma": "logger", "pos": "NNS" }] },
            { "type": "VP", "words": ["notify"] },
            { "type": "NP", "words": ["the", "Handler"] }
        ] },
        { "phrases": [
            { "type": "NP", "words": ["event-store"] },
            { "type": "VP", "words": ["keeps"] },
            { "type": "NP", "words": ["EventStore"] }
        ] }
    ]
}"#;

// w1 Logger, w4 Loggers, w7 Handler, w8 event-store, w10 EventStore
const OBSERVATIONS: &str = r#"[
    { "word": 1, "kind": "name", "claimant": "ner", "probability": 0.8 },
    { "word": 4, "kind": "name", "claimant": "coref", "probability": 0.6 },
    { "word": 7, "kind": "type", "claimant": "ner", "probability": 0.7 },
    { "word": 1, "kind": "type", "claimant": "heuristic", "probability": 0.2 },
    { "word": 8, "kind": "name", "claimant": "ner", "probability": 0.9,
      "surfaceForms": ["event-store"] }
]"#;

fn text() -> Arc<Text> {
    let spec: TextSpec = serde_json::from_str(DOCUMENT).unwrap();
    Arc::new(spec.build().unwrap())
}

fn observations() -> Vec<ObservationRecord> {
    serde_json::from_str(OBSERVATIONS).unwrap()
}

fn mention<'a>(report: &'a [MentionReport], reference: &str) -> &'a MentionReport {
    report
        .iter()
        .find(|m| m.reference == reference)
        .unwrap_or_else(|| panic!("no mention `{reference}` in {report:#?}"))
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_fuzzy_replay_collapses_plural_mentions() {
    let state = replay(text(), TextStateConfig::fuzzy(), &observations()).unwrap();
    state.validate().unwrap();
    let report = report(&state);

    assert_eq!(report.len(), 3);
    let logger = mention(&report, "Logger");
    assert_eq!(logger.words, vec!["Logger", "Loggers"]);
    assert_eq!(logger.sentences, vec![1, 2]);
    assert_eq!(logger.kind, MappingKind::Name);
    assert!((logger.name_probability - 0.7).abs() < 1e-9);
    assert!((logger.type_probability - 0.2).abs() < 1e-9);
    assert_eq!(logger.claimants, vec!["coref", "heuristic", "ner"]);

    let handler = mention(&report, "Handler");
    assert_eq!(handler.kind, MappingKind::Type);
    assert_eq!(mention(&report, "event-store").surface_forms, vec!["event-store"]);
}

#[test]
fn test_strict_replay_keeps_every_word_apart() {
    let state = replay(text(), TextStateConfig::strict(), &observations()).unwrap();
    state.validate().unwrap();
    let report = report(&state);

    assert_eq!(report.len(), 4);
    assert_eq!(mention(&report, "Logger").words, vec!["Logger"]);
    assert_eq!(mention(&report, "Loggers").sentences, vec![2]);
    let ids: Vec<&str> = report.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);
    for m in &report {
        assert!(m.phrase_mapping.is_some(), "{} has no phrase mapping", m.id);
    }
}

#[test]
fn test_replay_rejects_an_unknown_word() {
    let mut observations = observations();
    observations.push(ObservationRecord {
        word: 99,
        kind: MappingKind::Name,
        claimant: Claimant::new("ner"),
        probability: 0.5,
        surface_forms: Vec::new(),
    });
    let err = replay(text(), TextStateConfig::strict(), &observations).unwrap_err();
    assert!(matches!(err, MentionError::NotInState { .. }), "{err}");
}

#[test]
fn test_report_serializes_camel_case() {
    let state = replay(text(), TextStateConfig::fuzzy(), &observations()).unwrap();
    let json = serde_json::to_value(report(&state)).unwrap();
    // m1 was retired when "Loggers" merged into it.
    let first = &json[0];
    assert_eq!(first["id"], "m2");
    assert_eq!(first["kind"], "name");
    assert!(first.get("surfaceForms").is_some());
    assert!(first.get("nameProbability").is_some());
    assert!(first.get("phraseMapping").is_some());
    assert_eq!(first["compound"], false);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_drives_the_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nounmap.json");
    std::fs::write(
        &path,
        r#"{ "mergeStrategy": "strict", "confidenceAggregation": "max" }"#,
    )
    .unwrap();

    let config = TextStateConfig::load_from_file(&path).unwrap();
    assert_eq!(config.merge_strategy, MergeStrategyKind::Strict);
    assert_eq!(config.confidence_aggregation, Aggregation::Max);
    assert!((config.similarity_threshold - 0.9).abs() < f64::EPSILON);

    let state = replay(text(), config, &observations()).unwrap();
    assert_eq!(state.strategy_kind(), Some(MergeStrategyKind::Strict));
    assert_eq!(state.len(), 4);
}

#[test]
fn test_invalid_config_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "similarityThreshold": 3.0 }"#).unwrap();
    let err = TextStateConfig::load_from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("similarity"), "{err:#}");
}

// ============================================================================
// Downstream consumers
// ============================================================================

/// Records every replacement it hears about
#[derive(Default)]
struct Recommendations {
    moved: Mutex<Vec<(MentionId, MentionId)>>,
}

impl ReplacementListener<MentionId> for Recommendations {
    fn on_replaced(&self, retired: MentionId, replacement: MentionId) {
        self.moved.lock().push((retired, replacement));
    }
}

#[test]
fn test_consumers_follow_a_manual_merge_after_replay() {
    let mut state = replay(text(), TextStateConfig::strict(), &observations()).unwrap();
    let store = state
        .noun_mapping_by_word(WordId(8))
        .unwrap()
        .map(NounMapping::id)
        .unwrap();
    let other = state
        .add_or_extend_noun_mapping(WordId(10), MappingKind::Name, &Claimant::new("ner"), 0.7, &[])
        .unwrap();

    let recommendations = Arc::new(Recommendations::default());
    state
        .register_noun_mapping_listener(other, &recommendations)
        .unwrap();

    let merged = state
        .merge_noun_mappings(store, other, &Claimant::new("linker"), Some(vec![WordId(10)]))
        .unwrap();

    assert_eq!(*recommendations.moved.lock(), vec![(other, merged)]);
    let merged = state.noun_mapping(merged).unwrap();
    assert_eq!(merged.reference(), "EventStore");
    assert_eq!(merged.sentence_numbers(state.text()), vec![3]);
    assert!(merged.claimants().contains(&Claimant::new("linker")));
    state.validate().unwrap();
}
