//! Conjunctive lemma search over the inverted index

use crate::config::SearchConfig;
use crate::morphology::LemmaExtractor;
use crate::search::snippet::{highlight, page_text, words};
use crate::search::types::{SearchError, SearchQuery, SearchResponse, SearchResult};
use crate::storage::{IndexEntry, SiteRecord, Storage};
use crate::url::normalize_site_url;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A query lemma as known to one site
#[derive(Debug, Clone, PartialEq)]
pub struct LemmaHits {
    pub lemma: String,
    pub frequency: i64,
    pub entries: Vec<IndexEntry>,
}

/// Answers free-text queries from the stored index
pub struct SearchEngine {
    storage: Arc<dyn Storage>,
    extractor: LemmaExtractor,
    settings: SearchConfig,
}

impl SearchEngine {
    pub fn new(storage: Arc<dyn Storage>, extractor: LemmaExtractor, settings: SearchConfig) -> Self {
        Self {
            storage,
            extractor,
            settings,
        }
    }

    /// Runs a search
    ///
    /// # Search Flow
    ///
    /// 1. Reject blank queries, unknown sites and sites still indexing
    /// 2. Reduce the query to its distinct lemmas
    /// 3. Per site, drop lemmas present on too large a share of its pages
    /// 4. Intersect the page sets of the remaining lemmas, rarest first
    /// 5. Score each page by `Σ occurrences / max occurrences`
    /// 6. Emit one result per page sentence containing a query lemma
    /// 7. Sort by relevance and cut the requested page
    ///
    /// A query lemma the site has never seen excludes the whole site.
    ///
    /// # Arguments
    ///
    /// * `query` - The search request
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - The requested page and the total result count
    /// * `Err(SearchError)` - The query could not be answered
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        if query.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let sites = self.relevant_sites(query.site.as_deref())?;
        if let Some(site) = sites.iter().find(|site| !site.status.is_searchable()) {
            return Err(SearchError::IndexingNotFinished(site.url.clone()));
        }

        let lemmas: BTreeSet<String> = self
            .extractor
            .lemmas_of_text(&query.query)
            .into_keys()
            .collect();
        if lemmas.is_empty() {
            tracing::debug!("Query {:?} has no indexable words", query.query);
            return Ok(SearchResponse::default());
        }

        let mut results = Vec::new();
        for site in &sites {
            results.extend(self.search_site(site, &lemmas)?);
        }

        results.sort_by(|a, b| compare_relevance(b, a));
        let count = results.len();
        let limit = query.limit.unwrap_or(self.settings.default_limit);
        let data = paginate(results, query.offset, limit);

        tracing::debug!(
            "Query {:?}: {} results, returning {}",
            query.query,
            count,
            data.len()
        );
        Ok(SearchResponse { count, data })
    }

    fn relevant_sites(&self, site: Option<&str>) -> Result<Vec<SiteRecord>, SearchError> {
        match site.map(str::trim).filter(|site| !site.is_empty()) {
            Some(url) => {
                let url = normalize_site_url(url).unwrap_or_else(|_| url.to_string());
                let site = self
                    .storage
                    .find_site_by_url(&url)?
                    .ok_or(SearchError::SiteNotFound(url))?;
                Ok(vec![site])
            }
            None => Ok(self.storage.find_all_sites()?),
        }
    }

    /// Collects the results of one site
    fn search_site(
        &self,
        site: &SiteRecord,
        lemmas: &BTreeSet<String>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let page_count = self.storage.count_pages(Some(site.id))?;

        let mut hits = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            let Some(record) = self.storage.find_lemma(site.id, lemma)? else {
                return Ok(Vec::new());
            };
            let entries = self.storage.find_entries_by_lemma(record.id)?;
            hits.push(LemmaHits {
                lemma: record.lemma,
                frequency: record.frequency,
                entries,
            });
        }

        let hits = self.drop_common_lemmas(hits, page_count);
        if hits.is_empty() {
            return Ok(Vec::new());
        }
        let hits = order_by_rarity(hits);
        let pages = intersect_page_sets(&hits);

        let mut results = Vec::new();
        for (page_id, occurrences) in pages {
            let Some(page) = self.storage.find_page_by_id(page_id)? else {
                continue;
            };
            let relevance = compute_relevance(&occurrences);
            let text = page_text(&page.content);
            let title = text.title.unwrap_or_default();

            for sentence in text.sentences {
                let matched: Vec<&str> = words(&sentence)
                    .filter(|word| {
                        self.extractor
                            .lemma_of(word)
                            .map(|lemma| lemmas.contains(&lemma))
                            .unwrap_or(false)
                    })
                    .collect();
                if matched.is_empty() {
                    continue;
                }

                let mut snippet = sentence.clone();
                for word in &matched {
                    highlight(&mut snippet, word);
                }

                results.push(SearchResult {
                    site: site.url.clone(),
                    site_name: site.name.clone(),
                    uri: page.path.clone(),
                    title: title.clone(),
                    snippet,
                    relevance,
                    words_found: matched.len(),
                });
            }
        }

        Ok(results)
    }

    /// Removes lemmas found on more than the configured share of pages
    ///
    /// Small sites are left alone: every lemma looks common there.
    fn drop_common_lemmas(&self, hits: Vec<LemmaHits>, page_count: u64) -> Vec<LemmaHits> {
        if page_count == 0 || page_count < self.settings.frequency_filter_min_pages {
            return hits;
        }

        hits.into_iter()
            .filter(|hit| {
                let share = hit.entries.len() as f64 / page_count as f64;
                let keep = share <= self.settings.frequency_ceiling;
                if !keep {
                    tracing::debug!("Ignoring common lemma {:?} ({:.2})", hit.lemma, share);
                }
                keep
            })
            .collect()
    }
}

/// Sorts lemmas by frequency, rarest first
///
/// Frequency is the stored occurrence total of the lemma on the site, not
/// the number of pages carrying it: a lemma repeated on one page can rank
/// after a lemma seen once on several pages. The sort is stable, so lemmas of
/// equal frequency keep their order.
pub fn order_by_rarity(mut hits: Vec<LemmaHits>) -> Vec<LemmaHits> {
    hits.sort_by_key(|hit| hit.frequency);
    hits
}

/// Intersects the page sets of lemmas, in the given order
///
/// # Returns
///
/// For every page carrying all lemmas, the occurrences of each lemma on it.
/// Empty as soon as one step of the intersection is empty.
pub fn intersect_page_sets(hits: &[LemmaHits]) -> BTreeMap<i64, Vec<i64>> {
    let Some((first, rest)) = hits.split_first() else {
        return BTreeMap::new();
    };

    let mut pages: BTreeMap<i64, Vec<i64>> = first
        .entries
        .iter()
        .map(|entry| (entry.page_id, vec![entry.occurrences]))
        .collect();

    for hit in rest {
        if pages.is_empty() {
            break;
        }
        let occurrences: BTreeMap<i64, i64> = hit
            .entries
            .iter()
            .map(|entry| (entry.page_id, entry.occurrences))
            .collect();

        pages.retain(|page_id, counts| match occurrences.get(page_id) {
            Some(count) => {
                counts.push(*count);
                true
            }
            None => false,
        });
    }

    pages
}

/// Relative relevance of a page: total occurrences over the largest one
pub fn compute_relevance(occurrences: &[i64]) -> f64 {
    let max = occurrences.iter().copied().max().unwrap_or(0);
    if max <= 0 {
        return 0.0;
    }
    let absolute: i64 = occurrences.iter().sum();
    absolute as f64 / max as f64
}

fn compare_relevance(a: &SearchResult, b: &SearchResult) -> Ordering {
    a.relevance.total_cmp(&b.relevance)
}

/// Cuts page `offset` of size `limit` from relevance-ordered results
///
/// The page itself is then ordered by matched word count, keeping relevance
/// order among equal counts.
pub fn paginate(results: Vec<SearchResult>, offset: usize, limit: usize) -> Vec<SearchResult> {
    let mut page: Vec<SearchResult> = results
        .into_iter()
        .skip(offset.saturating_mul(limit))
        .take(limit)
        .collect();
    page.sort_by(|a, b| b.words_found.cmp(&a.words_found));
    page
}
