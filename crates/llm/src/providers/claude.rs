use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{send_json, text_at};
use crate::provider::{CompletionRequest, LlmError, LlmProvider};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<&crate::provider::Message> = request.conversation().collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        // Anthropic has no JSON mode; the instruction rides in the system prompt.
        let system = match (request.system_prompt(), request.json_output) {
            (Some(s), true) => Some(format!("{s}\n\nRespond with a single JSON object only.")),
            (Some(s), false) => Some(s.to_string()),
            (None, true) => Some("Respond with a single JSON object only.".to_string()),
            (None, false) => None,
        };
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(model = %self.model, "Claude request");

        let resp = send_json(
            self.client
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&self.build_request_body(request)),
        )
        .await?;

        text_at(&resp, "/content/0/text")
    }
}
