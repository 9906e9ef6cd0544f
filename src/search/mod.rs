//! Search over the lemma index
//!
//! Queries are reduced to lemmas with the same extractor used for indexing,
//! matched conjunctively per site and ranked by relative relevance.

mod engine;
mod snippet;
mod types;

pub use engine::{
    compute_relevance, intersect_page_sets, order_by_rarity, paginate, LemmaHits, SearchEngine,
};
pub use snippet::{highlight, page_text, PageText};
pub use types::{SearchError, SearchQuery, SearchResponse, SearchResult};
