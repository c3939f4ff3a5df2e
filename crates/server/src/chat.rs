//! Question answering over stored articles.
//!
//! Keyword search picks the articles; when an LLM provider is available it
//! writes the answer from them, otherwise the reply is a plain listing.

use intel_llm::{CompletionRequest, LlmProvider, Message};
use intel_storage::{ArticleStore, StorageError, StoredArticle};
use serde::Serialize;
use tracing::{info, warn};

/// Articles handed to the model and returned to the caller.
pub const CHAT_CONTEXT_ARTICLES: usize = 8;

const CHAT_SYSTEM_PROMPT: &str = "You are a media intelligence assistant. Answer the \
analyst's question using only the numbered articles provided. Cite articles by their \
number. If the articles do not answer the question, say so.";

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub articles: Vec<StoredArticle>,
}

pub async fn answer(
    store: &ArticleStore,
    provider: Option<&dyn LlmProvider>,
    question: &str,
) -> Result<ChatReply, StorageError> {
    let articles = store.search(question, CHAT_CONTEXT_ARTICLES)?;
    info!(matches = articles.len(), "chat query");

    if articles.is_empty() {
        return Ok(ChatReply {
            response: "No matching articles found.".to_string(),
            articles,
        });
    }

    let response = match provider {
        Some(provider) => match provider.complete(&build_request(question, &articles)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => format_results(&articles),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "chat completion failed, listing matches");
                format_results(&articles)
            }
        },
        None => format_results(&articles),
    };

    Ok(ChatReply { response, articles })
}

fn build_request(question: &str, articles: &[StoredArticle]) -> CompletionRequest {
    let mut prompt = String::from("Articles:\n");
    for (i, article) in articles.iter().enumerate() {
        let item = &article.item;
        prompt.push_str(&format!(
            "[{}] {} ({}, relevance {})\n",
            i + 1,
            item.item.title,
            item.item.source,
            item.relevance.as_str()
        ));
        let summary = item.analysis.as_deref().unwrap_or(&item.item.summary);
        if !summary.is_empty() {
            prompt.push_str(summary);
            prompt.push('\n');
        }
    }
    prompt.push_str(&format!("\nQuestion: {question}"));

    CompletionRequest::new(vec![Message::system(CHAT_SYSTEM_PROMPT), Message::user(prompt)])
        .with_temperature(0.3)
}

pub fn format_results(articles: &[StoredArticle]) -> String {
    let mut out = format!("Found {} matching articles:\n", articles.len());
    for article in articles {
        let item = &article.item;
        out.push_str(&format!(
            "- [{}] {} ({})\n",
            item.relevance.as_str(),
            item.item.title,
            item.item.source
        ));
    }
    out.trim_end().to_string()
}
