//! Sentence extraction and word highlighting for result snippets

use crate::crawler::extract_title;
use scraper::{Html, Selector};

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// The parts of a stored page that search results show
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub title: Option<String>,
    /// Body text nodes containing Cyrillic, with whitespace collapsed
    pub sentences: Vec<String>,
}

/// Splits stored page content into candidate snippet sentences
pub fn page_text(content: &str) -> PageText {
    let document = Html::parse_document(content);
    let mut sentences = Vec::new();

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            for node in body.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };
                let hidden = node
                    .parent()
                    .and_then(|parent| parent.value().as_element())
                    .map(|element| HIDDEN_ELEMENTS.contains(&element.name()))
                    .unwrap_or(false);
                if hidden {
                    continue;
                }

                let sentence = collapse_whitespace(text);
                if sentence.chars().any(is_cyrillic) {
                    sentences.push(sentence);
                }
            }
        }
    }

    PageText {
        title: extract_title(&document),
        sentences,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

/// Splits a sentence into words on every non-alphanumeric character
pub fn words(sentence: &str) -> impl Iterator<Item = &str> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Wraps the first occurrence of `word` not already wrapped in `<b>...</b>`
///
/// Occurrences immediately preceded by `<b>` are skipped, so calling this
/// once per matched word marks repeated words left to right.
pub fn highlight(text: &mut String, word: &str) {
    if word.is_empty() {
        return;
    }

    let mut from = 0;
    while let Some(offset) = text[from..].find(word) {
        let start = from + offset;
        let end = start + word.len();
        if text[..start].ends_with("<b>") {
            from = end;
            continue;
        }

        text.insert_str(end, "</b>");
        text.insert_str(start, "<b>");
        return;
    }
}
