//! Item data model: what the fetcher produces, what the analyzer adds, and
//! the merged record that gets persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IntelError;

/// A candidate item as produced by a feed fetch. Immutable within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Stable source identifier (the article link).
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    /// Name of the feed this item came from.
    pub source: String,
    /// Feed-assigned category label.
    #[serde(default)]
    pub category: String,
}

impl RawItem {
    /// Reject items that cannot be deduplicated or displayed.
    pub fn validate(&self) -> Result<(), IntelError> {
        if self.url.trim().is_empty() {
            return Err(IntelError::InvalidItem(format!(
                "item '{}' from {} has no url",
                self.title, self.source
            )));
        }
        if self.title.trim().is_empty() {
            return Err(IntelError::InvalidItem(format!("item {} has no title", self.url)));
        }
        Ok(())
    }

    /// URL with surrounding whitespace, fragment, and trailing slash removed.
    pub fn normalized_url(&self) -> String {
        let url = self.url.trim();
        let url = url.split('#').next().unwrap_or(url);
        url.trim_end_matches('/').to_string()
    }
}

/// Relevance classification assigned by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    High,
    Medium,
    Low,
    #[default]
    Irrelevant,
}

impl Relevance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::High => "high",
            Relevance::Medium => "medium",
            Relevance::Low => "low",
            Relevance::Irrelevant => "irrelevant",
        }
    }

    /// Lenient parse used for query parameters and model output.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Relevance::High),
            "medium" | "med" => Some(Relevance::Medium),
            "low" => Some(Relevance::Low),
            "irrelevant" | "none" | "not relevant" => Some(Relevance::Irrelevant),
            _ => None,
        }
    }
}

/// Fields produced by one analysis pass over a [`RawItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Enrichment {
    pub relevance: Relevance,
    /// Analyzer category; overrides the feed category when present.
    pub category: Option<String>,
    #[serde(default)]
    pub signals: Vec<String>,
    /// Relevance score in `0.0..=1.0`.
    #[serde(default)]
    pub score: f32,
    /// One-paragraph analyst summary.
    pub summary: Option<String>,
}

/// A [`RawItem`] with analyzer output merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: RawItem,
    pub relevance: Relevance,
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub score: f32,
    pub analysis: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl EnrichedItem {
    /// Merge analyzer output into the raw item it was produced from.
    pub fn merge(mut item: RawItem, enrichment: Enrichment) -> Self {
        if let Some(category) = enrichment.category.filter(|c| !c.trim().is_empty()) {
            item.category = category.trim().to_string();
        }
        Self {
            item,
            relevance: enrichment.relevance,
            signals: enrichment.signals,
            score: enrichment.score.clamp(0.0, 1.0),
            analysis: enrichment.summary,
            analyzed_at: Utc::now(),
        }
    }

    pub fn url(&self) -> &str {
        &self.item.url
    }

    /// Timestamp used for date filtering: published when known, otherwise analyzed.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.item.published.unwrap_or(self.analyzed_at)
    }
}
