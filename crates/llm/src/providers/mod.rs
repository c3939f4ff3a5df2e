pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use intel_core::config::{LlmConfig, OllamaConfig};
use serde_json::Value;

use crate::provider::{LlmError, LlmProvider};

/// Create the appropriate LLM provider based on config.
pub fn create_provider(
    llm_config: &LlmConfig,
    ollama_config: &OllamaConfig,
    timeout: Duration,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let client = http_client(timeout)?;
    match llm_config.provider.as_str() {
        "openai" => {
            let api_key = llm_config
                .openai_api_key
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm_config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string());
            Ok(Arc::new(openai::OpenAiProvider::new(
                client,
                api_key,
                llm_config.openai_model.clone(),
                base_url,
            )))
        }
        "anthropic" | "claude" => {
            let api_key = llm_config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Arc::new(claude::ClaudeProvider::new(
                client,
                api_key,
                llm_config.anthropic_model.clone(),
            )))
        }
        "gemini" => {
            let api_key = llm_config
                .gemini_api_key
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY not set".into()))?;
            Ok(Arc::new(gemini::GeminiProvider::new(
                client,
                api_key,
                llm_config.gemini_model.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(ollama::OllamaProvider::new(
            client,
            ollama_config.url.clone(),
            ollama_config.model.clone(),
        ))),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            other
        ))),
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Send a prepared request and return the JSON body, mapping non-2xx to `ApiError`.
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, LlmError> {
    let response = request
        .header("Content-Type", "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json().await?)
}

/// Pull a string out of a response by JSON pointer.
pub(crate) fn text_at(resp: &Value, pointer: &str) -> Result<String, LlmError> {
    resp.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::ParseError(format!("missing {pointer}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn llm(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.into(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".into(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude".into(),
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".into(),
            temperature: 0.1,
            max_tokens: 256,
        }
    }

    fn ollama() -> OllamaConfig {
        OllamaConfig {
            url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
        }
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = create_provider(&llm("gemini"), &ollama(), Duration::from_secs(5))
            .err()
            .expect("gemini without key should fail");
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[test]
    fn unknown_provider_rejected() {
        let result = create_provider(&llm("watson"), &ollama(), Duration::from_secs(5));
        assert!(matches!(result, Err(LlmError::NotConfigured(msg)) if msg.contains("watson")));
    }

    #[test]
    fn builds_each_configured_provider() {
        let mut config = llm("gemini");
        config.gemini_api_key = Some("g".into());
        config.openai_api_key = Some("o".into());
        config.anthropic_api_key = Some("a".into());

        for (name, expected) in [
            ("gemini", "gemini"),
            ("openai", "openai"),
            ("claude", "anthropic"),
            ("ollama", "ollama"),
        ] {
            config.provider = name.into();
            let provider = create_provider(&config, &ollama(), Duration::from_secs(5)).unwrap();
            assert_eq!(provider.name(), expected);
        }
    }

    #[test]
    fn text_at_reports_missing_path() {
        let resp = json!({ "message": { "content": "hi" } });
        assert_eq!(text_at(&resp, "/message/content").unwrap(), "hi");
        let err = text_at(&resp, "/choices/0/message/content").unwrap_err();
        assert!(err.to_string().contains("/choices/0/message/content"));
    }
}
