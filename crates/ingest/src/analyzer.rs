//! LLM-backed [`Analyzer`]: one completion per item, JSON reply parsed into
//! an [`Enrichment`].

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use intel_core::{Enrichment, RawItem, Relevance};
use intel_llm::{CompletionRequest, LlmProvider, Message};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::IngestError;
use crate::settings::AppSettings;
use crate::traits::Analyzer;

const SYSTEM_PROMPT: &str = "You are a media intelligence analyst. You read one news item \
and judge how relevant it is to the analyst's topics of interest. Reply with a single JSON \
object and nothing else.";

const REPLY_SHAPE: &str = r#"{"relevance": "high|medium|low|irrelevant", "category": "short label", "signals": ["key fact or entity", "..."], "score": 0.0-1.0, "summary": "one or two sentences"}"#;

pub struct LlmAnalyzer {
    provider: Arc<dyn LlmProvider>,
    topics: RwLock<Vec<String>>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &AppSettings) -> Self {
        Self {
            provider,
            topics: RwLock::new(settings.analysis.topics.clone()),
            temperature: 0.1,
            max_tokens: 1024,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.read().map(|t| t.clone()).unwrap_or_default()
    }

    fn build_request(&self, item: &RawItem) -> CompletionRequest {
        let topics = self.topics();
        let topics = if topics.is_empty() {
            "general news".to_string()
        } else {
            topics.join(", ")
        };

        let mut prompt = format!("Topics of interest: {topics}\n\n");
        prompt.push_str(&format!("Title: {}\n", item.title));
        prompt.push_str(&format!("Source: {}\n", item.source));
        if !item.category.is_empty() {
            prompt.push_str(&format!("Feed category: {}\n", item.category));
        }
        if let Some(published) = item.published {
            prompt.push_str(&format!("Published: {}\n", published.to_rfc3339()));
        }
        prompt.push_str(&format!("URL: {}\n\n{}\n\n", item.url, item.summary));
        prompt.push_str("Respond with JSON in this shape:\n");
        prompt.push_str(REPLY_SHAPE);

        CompletionRequest::new(vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)])
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .expect_json()
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(&self, item: &RawItem) -> Result<Enrichment, IngestError> {
        let request = self.build_request(item);
        let reply = self.provider.complete(&request).await?;
        debug!(url = %item.url, provider = self.provider.name(), "analysis reply received");
        parse_enrichment(&reply)
    }

    fn reload(&self, settings: &AppSettings) {
        if let Ok(mut topics) = self.topics.write() {
            *topics = settings.analysis.topics.clone();
            info!(topics = topics.len(), "analyzer reloaded");
        }
    }
}

#[derive(Debug, Deserialize)]
struct Reply {
    relevance: String,
    category: Option<String>,
    #[serde(default)]
    signals: Signals,
    score: Option<f32>,
    summary: Option<String>,
}

/// Models return signals either as a list or as one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Signals {
    List(Vec<String>),
    Text(String),
}

impl Default for Signals {
    fn default() -> Self {
        Signals::List(Vec::new())
    }
}

impl Signals {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Signals::List(list) => list,
            Signals::Text(text) => text.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Parse a model reply. Tolerates code fences and prose around the object.
pub fn parse_enrichment(reply: &str) -> Result<Enrichment, IngestError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| IngestError::Analyze(format!("no JSON object in reply: {}", preview(reply))))?;
    let parsed: Reply = serde_json::from_str(json)
        .map_err(|e| IngestError::Analyze(format!("bad analysis JSON: {e}")))?;

    let relevance = Relevance::parse(&parsed.relevance).ok_or_else(|| {
        IngestError::Analyze(format!("unrecognized relevance '{}'", parsed.relevance))
    })?;
    let score = parsed.score.unwrap_or(match relevance {
        Relevance::High => 0.9,
        Relevance::Medium => 0.6,
        Relevance::Low => 0.3,
        Relevance::Irrelevant => 0.0,
    });

    Ok(Enrichment {
        relevance,
        category: parsed.category.filter(|c| !c.trim().is_empty()),
        signals: parsed.signals.into_vec(),
        score: if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 },
        summary: parsed.summary.filter(|s| !s.trim().is_empty()),
    })
}

fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}
