//! Morphology module for reducing Russian word forms to lemmas
//!
//! This module contains:
//! - The `Morphology` trait implemented by morphology engines
//! - A dictionary-backed engine with a built-in closed-class table
//! - The lemma extractor that turns HTML into lemma counts

mod dictionary;
mod extractor;

pub use dictionary::DictionaryMorphology;
pub use extractor::{visible_text, LemmaExtractor};

use crate::config::MorphologyConfig;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a morphology engine
#[derive(Debug, Error)]
pub enum MorphologyError {
    #[error("Unsupported character {character:?} in word {word:?}")]
    UnsupportedCharacter { word: String, character: char },

    #[error("Empty word")]
    EmptyWord,

    #[error("Failed to load dictionary: {0}")]
    Load(String),
}

/// Part of speech attached to a word form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordClass {
    Noun,
    Verb,
    Infinitive,
    FullAdjective,
    ShortAdjective,
    Adverb,
    Pronoun,
    Numeral,
    Preposition,
    Conjunction,
    Interjection,
    Particle,
    Unknown,
}

impl WordClass {
    /// Maps an OpenCorpora part-of-speech tag to a word class
    ///
    /// Tags without a counterpart map to `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "NOUN" => WordClass::Noun,
            "VERB" => WordClass::Verb,
            "INFN" => WordClass::Infinitive,
            "ADJF" => WordClass::FullAdjective,
            "ADJS" => WordClass::ShortAdjective,
            "ADVB" => WordClass::Adverb,
            "NPRO" => WordClass::Pronoun,
            "NUMR" => WordClass::Numeral,
            "PREP" => WordClass::Preposition,
            "CONJ" => WordClass::Conjunction,
            "INTJ" => WordClass::Interjection,
            "PRCL" => WordClass::Particle,
            _ => WordClass::Unknown,
        }
    }

    /// Returns true for classes that never reach the index
    pub fn is_stop_class(&self) -> bool {
        matches!(
            self,
            WordClass::Preposition | WordClass::Conjunction | WordClass::Interjection
        )
    }
}

/// A morphology engine for Russian
///
/// Implementations are read-only after construction and shared by every
/// crawl task and index worker.
pub trait Morphology: Send + Sync {
    /// Returns the normal forms of a lowercase word, most likely first
    fn normalize(&self, word: &str) -> Result<Vec<String>, MorphologyError>;

    /// Returns the word classes of every reading of a lowercase word
    fn classify(&self, word: &str) -> Result<Vec<WordClass>, MorphologyError>;
}

/// Builds the lemma extractor described by the morphology configuration
///
/// Without a dictionary path only the built-in closed word classes are
/// known. A configured dictionary that cannot be loaded is an error.
pub fn load_extractor(config: &MorphologyConfig) -> Result<LemmaExtractor, MorphologyError> {
    let morphology = match &config.dictionary_path {
        Some(path) => DictionaryMorphology::from_path(Path::new(path))?,
        None => {
            tracing::warn!("No morphology dictionary configured, using built-in word classes only");
            DictionaryMorphology::new()
        }
    };
    Ok(LemmaExtractor::new(Arc::new(morphology)))
}

/// Checks that a word only uses the supported Cyrillic alphabet
pub fn check_alphabet(word: &str) -> Result<(), MorphologyError> {
    if word.is_empty() {
        return Err(MorphologyError::EmptyWord);
    }
    match word.chars().find(|c| !is_russian_letter(*c)) {
        Some(character) => Err(MorphologyError::UnsupportedCharacter {
            word: word.to_string(),
            character,
        }),
        None => Ok(()),
    }
}

/// Returns true for lowercase Russian letters, including `ё`
pub fn is_russian_letter(c: char) -> bool {
    ('а'..='я').contains(&c) || c == 'ё'
}
