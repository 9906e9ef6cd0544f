//! Lemma extraction from HTML content

use super::{is_russian_letter, Morphology};
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Elements whose text never counts as page text
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Turns page markup into lemma counts
///
/// Cloning shares the underlying morphology engine.
#[derive(Clone)]
pub struct LemmaExtractor {
    morphology: Arc<dyn Morphology>,
}

impl LemmaExtractor {
    pub fn new(morphology: Arc<dyn Morphology>) -> Self {
        Self { morphology }
    }

    /// Counts the lemmas of every indexable word in an HTML document
    ///
    /// # Extraction Rules
    ///
    /// 1. Markup is stripped, leaving the visible text
    /// 2. Text is lowercased and split on every character that is not a
    ///    Latin or Russian letter
    /// 3. Tokens starting with a Latin letter or a digit are dropped
    /// 4. Prepositions, conjunctions and interjections are dropped
    /// 5. The first normal form of each remaining token is counted
    ///
    /// # Arguments
    ///
    /// * `html` - The page markup (a fragment is fine)
    ///
    /// # Returns
    ///
    /// A map from lemma to the number of tokens that normalized to it
    pub fn extract_lemmas(&self, html: &str) -> HashMap<String, u32> {
        self.lemmas_of_text(&visible_text(html))
    }

    /// Counts the lemmas of plain text, following the rules of
    /// [`extract_lemmas`](Self::extract_lemmas) minus markup stripping
    pub fn lemmas_of_text(&self, text: &str) -> HashMap<String, u32> {
        let text = text.to_lowercase();
        let mut lemmas: HashMap<String, u32> = HashMap::new();

        for token in text.split(|c: char| !is_token_char(c)) {
            if let Some(lemma) = self.lemma_of(token) {
                *lemmas.entry(lemma).or_insert(0) += 1;
            }
        }

        lemmas
    }

    /// Returns the lemma of a single word, or `None` if the word is not
    /// indexable
    pub fn lemma_of(&self, word: &str) -> Option<String> {
        let word = word.to_lowercase();
        let first = word.chars().next()?;
        if first.is_ascii_alphanumeric() {
            return None;
        }

        let classes = match self.morphology.classify(&word) {
            Ok(classes) => classes,
            Err(e) => {
                trace!("Skipping token {:?}: {}", word, e);
                return None;
            }
        };
        if classes.iter().any(|class| class.is_stop_class()) {
            return None;
        }

        match self.morphology.normalize(&word) {
            Ok(forms) => forms.into_iter().next(),
            Err(e) => {
                trace!("Skipping token {:?}: {}", word, e);
                None
            }
        }
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase() || is_russian_letter(c)
}

/// Extracts the visible text of an HTML document
///
/// Text nodes are joined with a single space so adjacent elements never glue
/// their words together.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .map(|element| HIDDEN_ELEMENTS.contains(&element.name()))
            .unwrap_or(false);
        if !hidden {
            parts.push(&**text);
        }
    }

    parts.join(" ")
}
