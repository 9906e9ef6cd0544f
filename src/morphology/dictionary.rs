//! Dictionary-backed morphology engine

use super::{check_alphabet, Morphology, MorphologyError, WordClass};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Closed word classes known without any dictionary file
const BUILTIN_PREPOSITIONS: &[&str] = &[
    "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "обо", "от", "ото", "до", "из",
    "изо", "у", "за", "над", "надо", "под", "подо", "при", "про", "без", "безо", "для",
    "через", "между", "перед", "около", "среди", "вокруг", "после", "кроме", "вместо",
    "сквозь", "ради",
];

const BUILTIN_CONJUNCTIONS: &[&str] = &[
    "и", "а", "но", "или", "либо", "да", "что", "чтобы", "если", "когда", "хотя", "зато",
    "однако", "тоже", "также", "причем", "притом", "поэтому", "потому", "будто", "словно",
    "ибо", "пока", "нежели",
];

const BUILTIN_INTERJECTIONS: &[&str] = &[
    "ах", "ох", "эх", "ой", "ай", "ух", "увы", "ура", "эй", "ого", "ага", "ну",
];

const BUILTIN_PARTICLES: &[&str] = &[
    "не", "ни", "же", "ли", "бы", "вот", "вон", "даже", "ведь", "лишь", "уже", "еще",
];

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    lemma: String,
    class: WordClass,
}

/// Morphology engine backed by a word-form dictionary
///
/// The engine knows the Russian closed word classes out of the box and learns
/// everything else from a tab-separated dictionary:
///
/// ```text
/// # wordform  lemma  tag
/// домами	дом	NOUN
/// бежал	бежать	VERB
/// ```
///
/// Words missing from the dictionary normalize to themselves with class
/// `WordClass::Unknown`.
#[derive(Debug, Clone, Default)]
pub struct DictionaryMorphology {
    readings: HashMap<String, Vec<Reading>>,
}

impl DictionaryMorphology {
    /// Creates an engine that only knows the built-in closed classes
    pub fn new() -> Self {
        let mut morphology = Self::default();
        for (words, class) in [
            (BUILTIN_PREPOSITIONS, WordClass::Preposition),
            (BUILTIN_CONJUNCTIONS, WordClass::Conjunction),
            (BUILTIN_INTERJECTIONS, WordClass::Interjection),
            (BUILTIN_PARTICLES, WordClass::Particle),
        ] {
            for word in words {
                morphology.add(word, word, class);
            }
        }
        morphology
    }

    /// Loads a dictionary file on top of the built-in table
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a tab-separated `wordform lemma tag` file
    ///
    /// # Returns
    ///
    /// * `Ok(DictionaryMorphology)` - Successfully loaded engine
    /// * `Err(MorphologyError::Load)` - File unreadable or malformed
    pub fn from_path(path: &Path) -> Result<Self, MorphologyError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MorphologyError::Load(format!("{}: {}", path.display(), e)))?;
        let morphology = Self::parse(&content)?;
        info!(
            "Loaded morphology dictionary {} ({} word forms)",
            path.display(),
            morphology.len()
        );
        Ok(morphology)
    }

    /// Parses dictionary text on top of the built-in table
    pub fn parse(content: &str) -> Result<Self, MorphologyError> {
        let mut morphology = Self::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [form, lemma, tag] = fields.as_slice() else {
                return Err(MorphologyError::Load(format!(
                    "line {}: expected 3 tab-separated fields, found {}",
                    index + 1,
                    fields.len()
                )));
            };

            let form = form.to_lowercase();
            let lemma = lemma.to_lowercase();
            if check_alphabet(&form).is_err() || check_alphabet(&lemma).is_err() {
                debug!("Skipping dictionary line {}: {}", index + 1, line);
                continue;
            }

            morphology.add(&form, &lemma, WordClass::from_tag(tag));
        }

        Ok(morphology)
    }

    /// Number of distinct word forms known to the engine
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn add(&mut self, form: &str, lemma: &str, class: WordClass) {
        let reading = Reading {
            lemma: lemma.to_string(),
            class,
        };
        let readings = self.readings.entry(form.to_string()).or_default();
        if !readings.contains(&reading) {
            readings.push(reading);
        }
    }
}

impl Morphology for DictionaryMorphology {
    fn normalize(&self, word: &str) -> Result<Vec<String>, MorphologyError> {
        check_alphabet(word)?;

        let Some(readings) = self.readings.get(word) else {
            return Ok(vec![word.to_string()]);
        };

        let mut lemmas: Vec<String> = Vec::with_capacity(readings.len());
        for reading in readings {
            if !lemmas.contains(&reading.lemma) {
                lemmas.push(reading.lemma.clone());
            }
        }
        Ok(lemmas)
    }

    fn classify(&self, word: &str) -> Result<Vec<WordClass>, MorphologyError> {
        check_alphabet(word)?;

        Ok(match self.readings.get(word) {
            Some(readings) => readings.iter().map(|r| r.class).collect(),
            None => vec![WordClass::Unknown],
        })
    }
}
