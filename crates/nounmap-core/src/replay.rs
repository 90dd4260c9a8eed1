//! Offline replay of recorded observations.
//!
//! Feeds a JSON document and a JSON list of claimant observations through a
//! [`TextState`] and reports the resulting mentions. Used by the `nounmap`
//! binary and by end-to-end tests.
//!
//! Document format:
//!
//! ```json
//! { "sentences": [
//!     { "phrases": [
//!         { "type": "NP", "words": ["the", "Logger"] },
//!         { "type": "VP", "words": [{ "text": "writes", "lemma": "write", "pos": "VBZ" }] }
//!     ] }
//! ] }
//! ```
//!
//! Observations name words by their position in the document:
//!
//! ```json
//! [ { "word": 1, "kind": "name", "claimant": "ner", "probability": 0.8 } ]
//! ```

use crate::claimant::Claimant;
use crate::confidence::MappingKind;
use crate::config::TextStateConfig;
use crate::error::Result;
use crate::text::{PhraseType, Text, WordId};
use crate::text_state::TextState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Input
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSpec {
    pub sentences: Vec<SentenceSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentenceSpec {
    pub phrases: Vec<PhraseSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseSpec {
    #[serde(rename = "type")]
    pub phrase_type: PhraseType,
    pub words: Vec<WordSpec>,
}

/// A bare token or a token with lemma and POS tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordSpec {
    Plain(String),
    Tagged {
        text: String,
        #[serde(default)]
        lemma: Option<String>,
        #[serde(default)]
        pos: Option<String>,
    },
}

impl TextSpec {
    pub fn build(&self) -> Result<Text> {
        let mut builder = Text::builder();
        for sentence in &self.sentences {
            for phrase in &sentence.phrases {
                let tokens: Vec<(&str, &str, &str)> = phrase
                    .words
                    .iter()
                    .map(|word| match word {
                        WordSpec::Plain(text) => (text.as_str(), "", "NN"),
                        WordSpec::Tagged { text, lemma, pos } => (
                            text.as_str(),
                            lemma.as_deref().unwrap_or(""),
                            pos.as_deref().unwrap_or("NN"),
                        ),
                    })
                    .collect();
                builder.tagged_phrase(phrase.phrase_type, &tokens)?;
            }
            builder.end_sentence();
        }
        Ok(builder.build())
    }
}

/// One recorded claimant vote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    pub word: u32,
    pub kind: MappingKind,
    pub claimant: Claimant,
    pub probability: f64,
    #[serde(default)]
    pub surface_forms: Vec<String>,
}

/// Replay observations in order; the first failing one aborts the replay
pub fn replay(
    text: Arc<Text>,
    config: TextStateConfig,
    observations: &[ObservationRecord],
) -> Result<TextState> {
    let mut state = TextState::new(text, config)?;
    for (index, observation) in observations.iter().enumerate() {
        let id = state.add_or_extend_noun_mapping(
            WordId(observation.word),
            observation.kind,
            &observation.claimant,
            observation.probability,
            &observation.surface_forms,
        )?;
        debug!(index, mention = %id, "observation replayed");
    }
    info!(
        observations = observations.len(),
        mentions = state.len(),
        phrase_mappings = state.phrase_mappings().count(),
        "replay finished"
    );
    Ok(state)
}

// ============================================================================
// Output
// ============================================================================

/// Serializable summary of one live mention
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionReport {
    pub id: String,
    pub reference: String,
    pub kind: MappingKind,
    pub probability: f64,
    pub name_probability: f64,
    pub type_probability: f64,
    pub words: Vec<String>,
    pub surface_forms: Vec<String>,
    pub claimants: Vec<String>,
    pub sentences: Vec<usize>,
    pub phrase_mapping: Option<String>,
    pub compound: bool,
}

/// Live mentions in creation order
pub fn report(state: &TextState) -> Vec<MentionReport> {
    let text = state.text();
    state
        .noun_mappings()
        .map(|nm| MentionReport {
            id: nm.id().to_string(),
            reference: nm.reference().to_string(),
            kind: nm.kind(),
            probability: nm.probability(),
            name_probability: nm.probability_for_kind(MappingKind::Name),
            type_probability: nm.probability_for_kind(MappingKind::Type),
            words: nm
                .words()
                .iter()
                .filter_map(|w| text.word(*w))
                .map(|w| w.text().to_string())
                .collect(),
            surface_forms: nm.surface_forms().to_vec(),
            claimants: nm.claimants().iter().map(|c| c.name().to_string()).collect(),
            sentences: nm.sentence_numbers(text),
            phrase_mapping: state.phrase_mapping_of(nm.id()).map(|pm| pm.id().to_string()),
            compound: nm.is_compound(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeStrategyKind;

    const DOCUMENT: &str = r#"{
        "sentences": [
            { "phrases": [
                { "type": "NP", "words": ["the", "Logger"] },
                { "type": "VP", "words": [{ "text": "writes", "lemma": "write", "pos": "VBZ" }] }
            ] },
            { "phrases": [ { "type": "NP", "words": ["Loggers"] } ] }
        ]
    }"#;

    #[test]
    fn builds_text_from_json() {
        let spec: TextSpec = serde_json::from_str(DOCUMENT).unwrap();
        let text = spec.build().unwrap();
        assert_eq!(text.words().len(), 4);
        assert_eq!(text.sentence_count(), 2);
        let writes = text.word(WordId(2)).unwrap();
        assert_eq!(writes.lemma(), "write");
        assert_eq!(writes.pos_tag(), "VBZ");
        assert_eq!(text.word(WordId(3)).unwrap().sentence_no(), 1);
    }

    #[test]
    fn replay_and_report() {
        let spec: TextSpec = serde_json::from_str(DOCUMENT).unwrap();
        let text = Arc::new(spec.build().unwrap());
        let observations: Vec<ObservationRecord> = serde_json::from_str(
            r#"[
                { "word": 1, "kind": "name", "claimant": "a", "probability": 0.8 },
                { "word": 3, "kind": "name", "claimant": "b", "probability": 0.6,
                  "surfaceForms": ["Loggers"] }
            ]"#,
        )
        .unwrap();

        let state = replay(text, TextStateConfig::default(), &observations).unwrap();
        assert_eq!(state.strategy_kind(), Some(MergeStrategyKind::Fuzzy));
        let report = report(&state);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].reference, "Logger");
        assert_eq!(report[0].words, vec!["Logger", "Loggers"]);
        assert_eq!(report[0].sentences, vec![1, 2]);
        assert_eq!(report[0].claimants, vec!["a", "b"]);
    }

    #[test]
    fn replay_stops_at_the_first_bad_observation() {
        let spec: TextSpec = serde_json::from_str(DOCUMENT).unwrap();
        let text = Arc::new(spec.build().unwrap());
        let observations = vec![ObservationRecord {
            word: 1,
            kind: MappingKind::Type,
            claimant: Claimant::new("a"),
            probability: 7.0,
            surface_forms: Vec::new(),
        }];
        assert!(replay(text, TextStateConfig::strict(), &observations).is_err());
    }
}
