/// Site status definitions for tracking indexing progress
use std::fmt;

/// Represents the indexing state of a configured site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    /// A crawl of the site is queued or running
    Indexing,

    /// The last crawl of the site ran to completion
    Indexed,

    /// The last crawl was stopped or failed
    Failed,
}

impl SiteStatus {
    /// Returns true if the site can be searched
    pub fn is_searchable(&self) -> bool {
        matches!(self, Self::Indexed)
    }

    /// Returns true if this is a terminal state for a crawl run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Indexing)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexing => "INDEXING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// `QUEUED` is accepted as an alias of `INDEXING`.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "INDEXING" | "QUEUED" => Some(Self::Indexing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
