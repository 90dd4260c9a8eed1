//! Upstream text model: the words and phrases of one document.
//!
//! The linguistic pipeline that produces these is out of scope. A [`Text`] is
//! built once (through [`TextBuilder`]), shared behind an `Arc`, and never
//! mutated afterwards. Mentions refer to words and phrases by handle only.

use crate::error::{MentionError, Operation, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a word; equals its position in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordId(pub u32);

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Stable handle of a phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseId(pub u32);

impl fmt::Display for PhraseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Constituent type of a phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhraseType {
    Np,
    Vp,
    Pp,
    Adjp,
    Advp,
    S,
    Other,
}

impl fmt::Display for PhraseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhraseType::Np => "NP",
            PhraseType::Vp => "VP",
            PhraseType::Pp => "PP",
            PhraseType::Adjp => "ADJP",
            PhraseType::Advp => "ADVP",
            PhraseType::S => "S",
            PhraseType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// An immutable token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Word {
    id: WordId,
    text: String,
    lemma: String,
    pos_tag: String,
    sentence_no: usize,
    position: usize,
    phrase: PhraseId,
}

impl Word {
    pub fn id(&self) -> WordId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    pub fn pos_tag(&self) -> &str {
        &self.pos_tag
    }

    /// Zero-based sentence number
    pub fn sentence_no(&self) -> usize {
        self.sentence_no
    }

    /// Position in the document
    pub fn position(&self) -> usize {
        self.position
    }

    /// Phrase containing this word
    pub fn phrase(&self) -> PhraseId {
        self.phrase
    }
}

/// An immutable contiguous span of words
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phrase {
    id: PhraseId,
    phrase_type: PhraseType,
    sentence_no: usize,
    words: Vec<WordId>,
}

impl Phrase {
    pub fn id(&self) -> PhraseId {
        self.id
    }

    pub fn phrase_type(&self) -> PhraseType {
        self.phrase_type
    }

    pub fn sentence_no(&self) -> usize {
        self.sentence_no
    }

    pub fn words(&self) -> &[WordId] {
        &self.words
    }

    /// Space-joined text of the contained words
    pub fn text(&self, text: &Text) -> String {
        text.join_words(&self.words)
    }
}

/// All words and phrases of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    words: Vec<Word>,
    phrases: Vec<Phrase>,
    sentences: usize,
}

impl Text {
    pub fn builder() -> TextBuilder {
        TextBuilder::default()
    }

    pub fn word(&self, id: WordId) -> Option<&Word> {
        self.words.get(id.0 as usize)
    }

    pub fn phrase(&self, id: PhraseId) -> Option<&Phrase> {
        self.phrases.get(id.0 as usize)
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences
    }

    /// Words whose text matches exactly, in document order
    pub fn find_words<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a Word> + 'a {
        self.words.iter().filter(move |w| w.text == text)
    }

    /// Join word texts with single spaces; unknown handles are skipped
    pub fn join_words(&self, ids: &[WordId]) -> String {
        ids.iter()
            .filter_map(|id| self.word(*id))
            .map(Word::text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds a [`Text`] sentence by sentence, phrase by phrase
#[derive(Debug, Default)]
pub struct TextBuilder {
    words: Vec<Word>,
    phrases: Vec<Phrase>,
    sentence_no: usize,
    sentence_open: bool,
}

impl TextBuilder {
    /// Append a phrase to the current sentence. Lemmas default to the
    /// lowercased token and the POS tag to `NN`.
    pub fn phrase(&mut self, phrase_type: PhraseType, tokens: &[&str]) -> Result<PhraseId> {
        let tagged: Vec<(&str, &str, &str)> = tokens.iter().map(|t| (*t, "", "NN")).collect();
        self.tagged_phrase(phrase_type, &tagged)
    }

    /// Append a phrase of `(text, lemma, pos_tag)` tokens; an empty lemma is
    /// replaced by the lowercased text.
    pub fn tagged_phrase(
        &mut self,
        phrase_type: PhraseType,
        tokens: &[(&str, &str, &str)],
    ) -> Result<PhraseId> {
        if tokens.is_empty() {
            return Err(MentionError::invalid(
                Operation::BuildText,
                "a phrase needs at least one word",
            ));
        }
        if let Some((text, _, _)) = tokens.iter().find(|(text, _, _)| text.trim().is_empty()) {
            return Err(MentionError::invalid(
                Operation::BuildText,
                format!("blank word `{text}`"),
            ));
        }

        let phrase_id = PhraseId(self.phrases.len() as u32);
        let mut ids = Vec::with_capacity(tokens.len());
        for (text, lemma, pos_tag) in tokens {
            let position = self.words.len();
            let id = WordId(position as u32);
            let lemma = if lemma.is_empty() {
                text.to_lowercase()
            } else {
                lemma.to_string()
            };
            self.words.push(Word {
                id,
                text: text.to_string(),
                lemma,
                pos_tag: pos_tag.to_string(),
                sentence_no: self.sentence_no,
                position,
                phrase: phrase_id,
            });
            ids.push(id);
        }
        self.phrases.push(Phrase {
            id: phrase_id,
            phrase_type,
            sentence_no: self.sentence_no,
            words: ids,
        });
        self.sentence_open = true;
        Ok(phrase_id)
    }

    /// Close the current sentence; empty sentences are ignored
    pub fn end_sentence(&mut self) -> &mut Self {
        if self.sentence_open {
            self.sentence_no += 1;
            self.sentence_open = false;
        }
        self
    }

    pub fn build(mut self) -> Text {
        self.end_sentence();
        Text {
            words: self.words,
            phrases: self.phrases,
            sentences: self.sentence_no,
        }
    }
}
