use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::StudioConfig;
use crate::error::StudioError;
use crate::http::{build_client, response_json_or_error};

pub trait VisionClient: Send + Sync {
    fn model(&self) -> &str;
    fn analyze_image(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, StudioError>;
}

pub struct GeminiVisionClient {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl GeminiVisionClient {
    pub fn new(config: &StudioConfig, model: impl Into<String>) -> Result<Self, StudioError> {
        let Some(api_key) = config.gemini_api_key.clone() else {
            return Err(StudioError::MissingCredential(
                "GEMINI_API_KEY or GOOGLE_API_KEY".to_string(),
            ));
        };
        Ok(Self {
            api_base: config.gemini_api_base.clone(),
            api_key,
            model: model.into(),
            http: build_client("Gemini vision", config.request_timeout())?,
        })
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

pub(crate) fn vision_request_body(prompt: &str, image_bytes: &[u8], mime_type: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": BASE64.encode(image_bytes),
                    }
                },
                { "text": prompt },
            ]
        }],
        "generationConfig": {
            "temperature": 0.2,
            "responseMimeType": "application/json",
        }
    })
}

/// Joins the text parts of the first candidate. A blocked prompt or an empty
/// answer is an error so the caller can fall back.
pub(crate) fn extract_candidate_text(service: &str, payload: &Value) -> Result<String, StudioError> {
    let parts = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<&str>>()
        .join("\n");
    if !text.is_empty() {
        return Ok(text);
    }
    let reason = payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
        .map(|reason| format!("prompt blocked ({reason})"))
        .unwrap_or_else(|| "no text in response".to_string());
    Err(StudioError::invalid(service, reason))
}

impl VisionClient for GeminiVisionClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn analyze_image(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, StudioError> {
        let endpoint = self.endpoint();
        debug!(model = %self.model, bytes = image_bytes.len(), "sending vision request");
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&vision_request_body(prompt, image_bytes, mime_type))
            .send()
            .map_err(|err| StudioError::transport("Gemini vision", err))?;
        let payload = response_json_or_error("Gemini vision", response)?;
        extract_candidate_text("Gemini vision", &payload)
    }
}

/// Answers every request with the same well-formed identity.
pub struct DryrunVisionClient;

impl VisionClient for DryrunVisionClient {
    fn model(&self) -> &str {
        "dryrun-multimodal-1"
    }

    fn analyze_image(
        &self,
        _prompt: &str,
        _image_bytes: &[u8],
        _mime_type: &str,
    ) -> Result<String, StudioError> {
        Ok(json!({
            "brand_name": "Northwind Goods",
            "industry": "outdoor apparel",
            "palette": ["#1B4332", "#D8F3DC", "#F77F00"],
            "style": "rugged minimalism with natural textures",
            "tone": "adventurous and grounded",
            "target_audience": "weekend hikers and city commuters",
            "keywords": ["durable", "outdoors", "sustainable"],
            "summary": "Hard-wearing everyday gear with a quiet outdoor character."
        })
        .to_string())
    }
}
