use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{send_json, text_at};
use crate::provider::{CompletionRequest, LlmError, LlmProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI chat completions, or any server exposing the same API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, "OpenAI request to {}", url);

        let resp = send_json(
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&self.build_request_body(request)),
        )
        .await?;

        text_at(&resp, "/choices/0/message/content")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(
            reqwest::Client::new(),
            "key".into(),
            "gpt-4o-mini".into(),
            "http://localhost:8080/".into(),
        )
    }

    #[test]
    fn messages_keep_roles_inline() {
        let request = CompletionRequest::new(vec![
            Message::system("Be terse."),
            Message::user("Hello"),
        ]);
        let body = provider().build_request_body(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Hello");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn json_output_sets_response_format() {
        let request = CompletionRequest::new(vec![Message::user("Hello")]).expect_json();
        let body = provider().build_request_body(&request);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        assert_eq!(provider().base_url, "http://localhost:8080");
    }
}
