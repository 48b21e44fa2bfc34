//! OpenAI-compatible chat completions enhancer.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{normalize_keywords, ContentEnhancer, EnhancedContent, EnhancementError, EnhancementRequest};
use crate::config::EnhancerConfig;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiContentEnhancer {
    client: Client,
    config: EnhancerConfig,
}

impl std::fmt::Debug for OpenAiContentEnhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiContentEnhancer")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl OpenAiContentEnhancer {
    pub fn new(config: EnhancerConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn description_prompt(request: &EnhancementRequest) -> String {
        format!(
            "Enhance the following product description for marketplace:\n\n\
             Title: {}\nCategory: {}\nCurrent description: {}\n\n\
             Create an attractive, detailed and sales-optimized description.\n\
             Include key benefits and important features.\nMaximum 500 words.",
            request.title,
            request.category.as_deref().unwrap_or("General"),
            request.description
        )
    }

    fn keywords_prompt(&self, request: &EnhancementRequest) -> String {
        format!(
            "Generate {} relevant keywords for this product:\n\n\
             Title: {}\nCategory: {}\nDescription: {}\n\n\
             Return only the keywords separated by commas.",
            self.config.max_keywords,
            request.title,
            request.category.as_deref().unwrap_or("General"),
            request.description
        )
    }

    async fn complete(&self, prompt: String) -> Result<String, EnhancementError> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnhancementError::Timeout
                } else {
                    EnhancementError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Enhancement backend returned an error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => EnhancementError::RateLimited(text),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    EnhancementError::MalformedInput(text)
                }
                s if s.is_server_error() => EnhancementError::Unavailable(text),
                _ => EnhancementError::Rejected(format!("HTTP {status}: {text}")),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| EnhancementError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| EnhancementError::InvalidResponse("no choices returned".to_string()))
    }
}

#[async_trait]
impl ContentEnhancer for OpenAiContentEnhancer {
    async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancedContent, EnhancementError> {
        if request.title.trim().is_empty() {
            return Err(EnhancementError::MalformedInput("product title is empty".to_string()));
        }

        let enhanced_description = self.complete(Self::description_prompt(request)).await?;
        let raw_keywords = self.complete(self.keywords_prompt(request)).await?;
        let keywords = normalize_keywords(raw_keywords.split(','), self.config.max_keywords);

        debug!(keyword_count = keywords.len(), "Enhancement completed");
        Ok(EnhancedContent {
            enhanced_description,
            keywords,
        })
    }
}
