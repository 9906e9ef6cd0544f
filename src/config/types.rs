use serde::Deserialize;

/// Main configuration structure for Lemma-Search
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub morphology: MorphologyConfig,
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

impl Config {
    /// Finds the configured site whose URL matches `url` exactly
    pub fn site_by_url(&self, url: &str) -> Option<&SiteEntry> {
        self.sites.iter().find(|site| site.url == url)
    }

    /// Returns true if `url` is one of the configured site URLs
    pub fn is_configured(&self, url: &str) -> bool {
        self.site_by_url(url).is_some()
    }
}

/// Crawler connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    /// User agent sent with every page request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header sent with every page request
    #[serde(default = "default_referrer")]
    pub referrer: String,

    /// Network timeout for a single page fetch (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referrer: default_referrer(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Search ranking settings
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Maximum share of a site's pages a lemma may appear on before it is
    /// ignored as too common
    #[serde(rename = "frequency-ceiling", default = "default_frequency_ceiling")]
    pub frequency_ceiling: f64,

    /// Sites with fewer pages than this never drop common lemmas
    #[serde(
        rename = "frequency-filter-min-pages",
        default = "default_frequency_filter_min_pages"
    )]
    pub frequency_filter_min_pages: u64,

    /// Page size used when a query does not specify one
    #[serde(rename = "default-limit", default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            frequency_ceiling: default_frequency_ceiling(),
            frequency_filter_min_pages: default_frequency_filter_min_pages(),
            default_limit: default_limit(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Morphology dictionary configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MorphologyConfig {
    /// Optional path to a tab-separated wordform dictionary
    #[serde(rename = "dictionary-path")]
    pub dictionary_path: Option<String>,
}

/// A site to crawl and index
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Base URL of the site, without a trailing slash
    pub url: String,

    /// Human readable site name
    pub name: String,
}

fn default_user_agent() -> String {
    "LemmaSearchBot/1.0".to_string()
}

fn default_referrer() -> String {
    "https://www.google.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_frequency_ceiling() -> f64 {
    0.95
}

fn default_frequency_filter_min_pages() -> u64 {
    10
}

fn default_limit() -> usize {
    20
}
