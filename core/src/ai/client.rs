// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::model::{Analysis, AnalysisFailure};
use super::payload::{MediaPart, PayloadBuilder};
use super::{prompt, response};
use crate::meme::MemeItem;
use crate::settings::AiSettings;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

/// Describes and tags a meme.
pub trait Analyzer: Send + Sync {
    /// One call produces one description and tag set for the whole meme,
    /// however many files it spans.
    fn analyze(&self, item: &MemeItem) -> Result<Analysis, AnalysisFailure>;
}

/// Longest slice of an error body kept in a failure message.
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Analyzer backed by an OpenAI compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    settings: AiSettings,
    http: reqwest::blocking::Client,
    payload: PayloadBuilder,
}

impl OpenAiClient {
    pub fn build(settings: AiSettings, payload: PayloadBuilder) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            settings,
            http,
            payload,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, parts: &[MediaPart], is_album: bool) -> serde_json::Value {
        let text = if is_album {
            prompt::album(parts.len())
        } else {
            prompt::single()
        };

        let mut content = vec![serde_json::json!({"type": "text", "text": text})];
        for part in parts {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": {"url": part.data_url()}
            }));
        }

        serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": prompt::SYSTEM_PROMPT},
                {"role": "user", "content": content}
            ],
            "temperature": self.settings.temperature,
            "max_completion_tokens": self.settings.max_completion_tokens,
        })
    }

    fn transport_failure(&self, e: reqwest::Error) -> AnalysisFailure {
        if e.is_timeout() {
            AnalysisFailure::transient(format!(
                "request timed out after {:?}",
                self.settings.request_timeout
            ))
        } else if e.is_connect() {
            AnalysisFailure::transient(format!("connection failed: {}", e))
        } else {
            AnalysisFailure::transient(format!("request failed: {}", e))
        }
    }
}

impl Analyzer for OpenAiClient {
    fn analyze(&self, item: &MemeItem) -> Result<Analysis, AnalysisFailure> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalysisFailure::auth("no API key configured"))?;

        let parts = self.payload.build(item)?;
        let body = self.request_body(&parts, item.layout.is_album());

        info!(
            "Sending meme {} ({} images) to {}",
            item.meme_id,
            parts.len(),
            self.settings.model
        );

        let resp = self
            .http
            .post(self.url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| self.transport_failure(e))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| self.transport_failure(e))?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        debug!("Raw reply for meme {}: {}", item.meme_id, truncate(&text));

        let completion: ChatCompletion = serde_json::from_str(&text).map_err(|e| {
            AnalysisFailure::invalid_response(format!("not a chat completion: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisFailure::invalid_response("reply has no content"))?;

        response::parse(&content)
    }
}

/// Maps an unsuccessful HTTP status to a failure kind.
pub fn classify_status(status: StatusCode, body: &str) -> AnalysisFailure {
    let message = format!("HTTP {}: {}", status, truncate(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisFailure::auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AnalysisFailure::transient(message)
        }
        StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => AnalysisFailure::unsupported(message),
        s if s.is_server_error() => AnalysisFailure::transient(message),
        _ => AnalysisFailure::invalid_response(message),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_BODY_CHARS).collect()
}
