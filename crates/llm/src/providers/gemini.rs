use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{send_json, text_at};
use crate::provider::{CompletionRequest, LlmError, LlmProvider, Role};

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    /// Build the request body for the Gemini generateContent API.
    fn build_request_body(request: &CompletionRequest) -> Value {
        let contents: Vec<Value> = request
            .conversation()
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut generation = json!({
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        });
        if request.json_output {
            generation["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if let Some(system) = request.system_prompt() {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model,
        );
        debug!(model = %self.model, "Gemini request");

        let resp = send_json(
            self.client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&Self::build_request_body(request)),
        )
        .await?;

        text_at(&resp, "/candidates/0/content/parts/0/text")
    }
}
