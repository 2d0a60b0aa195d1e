use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::schema::StructuredOutput;
use crate::types::*;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// A chat-completions-style client against an OpenAI-compatible endpoint, per
/// spec §6 (`OPENAI_API_KEY`, per-component `*_MODEL` env vars).
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Plain chat completion. Temperature 0 by default; pass a different value
    /// for the scene director (0.7) and summarizer (0.2) per spec §5.
    pub async fn chat_completion(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![WireMessage::system(system), WireMessage::user(user)],
            temperature: Some(temperature),
            max_tokens: Some(2048),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model, "chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion error ({status}): {text}"));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("no content in chat completion response"))
    }

    /// Strict-JSON structured extraction via the `json_schema` response format.
    /// Callers pick the temperature: 0 for the classifier/reranker/themes/intro,
    /// 0.7 for the scene director, 0.2 for the summarizer (spec §5).
    pub async fn extract<T: StructuredOutput>(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<T> {
        let schema = T::json_schema_strict();

        let request = StructuredRequest {
            model: model.to_string(),
            messages: vec![WireMessage::system(system), WireMessage::user(user)],
            temperature: Some(temperature),
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "structured_response",
                    strict: true,
                    schema,
                },
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model, "structured extraction request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("structured extraction error ({status}): {text}"));
        }

        let parsed: ChatResponse = response.json().await?;
        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("no content in structured extraction response"))?;

        let cleaned = crate::util::strip_code_blocks(&raw);
        serde_json::from_str(cleaned)
            .map_err(|e| anyhow!("failed to deserialize structured response: {e}"))
    }

    /// Render an image and return its raw bytes. Prefers a wide aspect ratio,
    /// falling back to square when the requested size is rejected (spec §4.7).
    pub async fn generate_image(&self, model: &str, prompt: &str, wide: bool) -> Result<Vec<u8>> {
        let size = if wide { "1536x1024" } else { "1024x1024" };
        match self.generate_image_at_size(model, prompt, size).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if wide => {
                debug!(error = %e, "wide image render failed, retrying square");
                self.generate_image_at_size(model, prompt, "1024x1024").await
            }
            Err(e) => Err(e),
        }
    }

    async fn generate_image_at_size(&self, model: &str, prompt: &str, size: &'static str) -> Result<Vec<u8>> {
        use base64::Engine;

        let request = ImageRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            size,
            n: 1,
        };

        let url = format!("{}/images/generations", self.base_url);

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("image generation error ({status}): {text}"));
        }

        let parsed: ImageResponse = response.json().await?;
        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no image data in response"))?;

        if let Some(b64) = datum.b64_json {
            return base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| anyhow!("failed to decode base64 image: {e}"));
        }

        if let Some(url) = datum.url {
            let bytes = self.http.get(&url).send().await?.bytes().await?;
            return Ok(bytes.to_vec());
        }

        Err(anyhow!("image response had neither b64_json nor url"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_defaults_to_openai_url() {
        let client = LlmClient::new("sk-test");
        assert_eq!(client.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn with_base_url_overrides_endpoint() {
        let client = LlmClient::new("sk-test").with_base_url("https://custom.example.com/v1");
        assert_eq!(client.base_url, "https://custom.example.com/v1");
    }
}
