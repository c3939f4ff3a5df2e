use chrono::{DateTime, Utc};
use intel_core::{EnrichedItem, Relevance};
use serde::{Deserialize, Serialize};

pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// An article as persisted: store-assigned id plus the analyzed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: u64,
    /// SHA-256 of the normalized URL.
    pub key: String,
    pub ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    pub item: EnrichedItem,
}

impl StoredArticle {
    pub fn title(&self) -> &str {
        &self.item.item.title
    }

    pub fn category(&self) -> &str {
        &self.item.item.category
    }

    /// Published date when the feed gave one, otherwise ingestion time.
    pub fn sort_date(&self) -> DateTime<Utc> {
        self.item.item.published.unwrap_or(self.ingested_at)
    }
}

/// Filters for listing articles. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub limit: Option<usize>,
    pub relevance: Option<Relevance>,
    /// Case-insensitive exact match.
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ArticleQuery {
    pub fn matches(&self, article: &StoredArticle) -> bool {
        if let Some(relevance) = self.relevance {
            if article.item.relevance != relevance {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if !article.category().eq_ignore_ascii_case(category) {
                return false;
            }
        }
        let date = article.sort_date();
        if self.start_date.is_some_and(|start| date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| date > end) {
            return false;
        }
        true
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_QUERY_LIMIT)
    }
}
