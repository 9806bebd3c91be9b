//! Gemini `generateContent` over HTTPS.

use serde_json::{json, Value};
use tracing::debug;

use crate::prompt::{api_user_text, parse_recommendation, API_SYSTEM_PROMPT};
use crate::types::{Recommendation, RecommendationInput};
use crate::{RecordError, Result};

pub const MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Request body for a deterministic command recommendation.
pub fn request_body(input: &RecommendationInput) -> Value {
    let mut parts = Vec::new();
    if let Some(shot) = input.screenshot.as_deref().filter(|s| !s.is_empty()) {
        parts.push(json!({
            "inlineData": { "mimeType": "image/png", "data": shot }
        }));
    }
    parts.push(json!({ "text": api_user_text(&input.snapshot, &input.prompt) }));

    json!({
        "systemInstruction": { "parts": [{ "text": API_SYSTEM_PROMPT }] },
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "temperature": 0.1,
            "responseMimeType": "application/json"
        }
    })
}

/// Text of the first candidate part, if the model produced one.
pub fn response_text(body: &Value) -> Option<&str> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

pub async fn recommend(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    input: &RecommendationInput,
) -> Result<Recommendation> {
    let url = format!(
        "{}/v1beta/models/{MODEL}:generateContent",
        base_url.trim_end_matches('/')
    );
    debug!(model = MODEL, "requesting recommendation");

    let resp = http
        .post(&url)
        .query(&[("key", api_key)])
        .json(&request_body(input))
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RecordError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let body: Value = resp.json().await?;
    let text = response_text(&body).ok_or(RecordError::EmptyResponse)?;
    parse_recommendation(text)
}
