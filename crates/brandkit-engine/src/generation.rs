use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use brandkit_contracts::aspect::AspectRatio;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::{StudioConfig, ToolNames};
use crate::error::StudioError;
use crate::tools::ToolExecutor;

/// A long-running video job as returned by the generate tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
    pub aspect_ratio: AspectRatio,
}

/// A generated value plus the exchange that produced it, for receipts.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub tool: String,
    pub request: Map<String, Value>,
    pub response: Value,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationModels {
    pub image: String,
    pub video: String,
    pub text: String,
}

pub struct GenerationService {
    executor: Arc<dyn ToolExecutor>,
    tool_names: ToolNames,
    models: GenerationModels,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl GenerationService {
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        config: &StudioConfig,
        models: GenerationModels,
    ) -> Self {
        Self {
            executor,
            tool_names: config.tool_names.clone(),
            models,
            poll_interval: config.video_poll_interval(),
            poll_timeout: config.video_poll_timeout(),
        }
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn models(&self) -> &GenerationModels {
        &self.models
    }

    fn call(
        &self,
        tool: &str,
        request: Map<String, Value>,
    ) -> Result<(Map<String, Value>, Value, Value), StudioError> {
        let output = self.executor.execute(tool, &request)?;
        Ok((request, output.data, output.raw))
    }

    pub fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Generated<String>, StudioError> {
        let tool = self.tool_names.generate_image.as_str();
        let request = object(json!({
            "prompt": prompt,
            "aspect_ratio": aspect_ratio.as_str(),
            "model": self.models.image,
            "number_of_images": 1,
        }));
        let (request, data, raw) = self.call(tool, request)?;
        let url = first_url(&data)
            .or_else(|| first_url(&raw))
            .ok_or_else(|| StudioError::invalid(tool, "no image URL in response"))?;
        Ok(Generated {
            value: url,
            tool: tool.to_string(),
            request,
            response: raw,
            warnings: Vec::new(),
        })
    }

    pub fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Generated<OperationHandle>, StudioError> {
        let tool = self.tool_names.generate_video.as_str();
        if !aspect_ratio.is_video_supported() {
            return Err(StudioError::tool(
                tool,
                format!("aspect ratio {aspect_ratio} is not supported for video"),
            ));
        }
        let request = object(json!({
            "prompt": prompt,
            "aspect_ratio": aspect_ratio.as_str(),
            "model": self.models.video,
            "number_of_videos": 1,
        }));
        let (request, data, raw) = self.call(tool, request)?;
        let name = operation_name(&data)
            .ok_or_else(|| StudioError::invalid(tool, "no operation handle in response"))?;
        Ok(Generated {
            value: OperationHandle { name, aspect_ratio },
            tool: tool.to_string(),
            request,
            response: raw,
            warnings: Vec::new(),
        })
    }

    /// Blocks on the wait tool once, then polls the status tool every
    /// `poll_interval` until the operation is done or `poll_timeout` elapses.
    pub fn await_video(&self, handle: &OperationHandle) -> Result<Generated<String>, StudioError> {
        let started = Instant::now();
        let mut warnings = Vec::new();

        let wait_tool = self.tool_names.wait_for_video.as_str();
        let wait_request = object(json!({
            "operation_name": handle.name,
            "timeout_seconds": self.poll_timeout.as_secs(),
        }));
        match self.call(wait_tool, wait_request) {
            Ok((request, data, raw)) => {
                if is_done(&data) {
                    if let Some(url) = first_url(&data) {
                        return Ok(Generated {
                            value: url,
                            tool: wait_tool.to_string(),
                            request,
                            response: raw,
                            warnings,
                        });
                    }
                }
            }
            Err(err) => {
                warn!(operation = %handle.name, error = %err, "wait tool failed; polling status");
                warnings.push(format!("wait tool failed: {err}"));
            }
        }

        let status_tool = self.tool_names.video_status.as_str();
        loop {
            let request = object(json!({ "operation_name": handle.name }));
            let (request, data, raw) = self.call(status_tool, request)?;
            if let Some(message) = data.get("error").filter(|value| !value.is_null()) {
                let message = message
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| message.to_string());
                return Err(StudioError::tool(status_tool, message));
            }
            if is_done(&data) {
                let url = first_url(&data).ok_or_else(|| {
                    StudioError::invalid(status_tool, "operation finished without a video URL")
                })?;
                return Ok(Generated {
                    value: url,
                    tool: status_tool.to_string(),
                    request,
                    response: raw,
                    warnings,
                });
            }
            let waited = started.elapsed();
            if waited >= self.poll_timeout {
                return Err(StudioError::VideoTimeout {
                    operation: handle.name.clone(),
                    waited_s: waited.as_secs_f64(),
                });
            }
            debug!(operation = %handle.name, waited_s = waited.as_secs_f64(), "video not ready");
            thread::sleep(self.poll_interval);
        }
    }

    pub fn generate_text(&self, prompt: &str) -> Result<Generated<String>, StudioError> {
        let tool = self.tool_names.generate_text.as_str();
        let request = object(json!({
            "prompt": prompt,
            "model": self.models.text,
        }));
        let (request, data, raw) = self.call(tool, request)?;
        let text = extract_text(&data)
            .ok_or_else(|| StudioError::invalid(tool, "no text in response"))?;
        Ok(Generated {
            value: text,
            tool: tool.to_string(),
            request,
            response: raw,
            warnings: Vec::new(),
        })
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

const URL_KEYS: [&str; 9] = [
    "url",
    "uri",
    "urls",
    "output",
    "image_url",
    "video_url",
    "download_url",
    "signed_url",
    "s3url",
];

/// Collects http(s) URLs in document order. Strings count only at the top
/// level or under a URL-like key; other nested objects and arrays are walked.
pub fn extract_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => push_url(url, out),
        Value::Array(rows) => {
            for row in rows {
                extract_urls(row, out);
            }
        }
        Value::Object(obj) => {
            for (key, row) in obj {
                let lowered = key.to_ascii_lowercase();
                if URL_KEYS.contains(&lowered.as_str()) {
                    collect_url_values(row, out);
                } else if row.is_object() || row.is_array() {
                    extract_urls(row, out);
                }
            }
        }
        _ => {}
    }
}

fn collect_url_values(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(rows) => {
            for row in rows {
                collect_url_values(row, out);
            }
        }
        other => extract_urls(other, out),
    }
}

fn push_url(url: &str, out: &mut Vec<String>) {
    let trimmed = url.trim();
    if trimmed.starts_with("http") && !out.iter().any(|existing| existing == trimmed) {
        out.push(trimmed.to_string());
    }
}

pub fn first_url(value: &Value) -> Option<String> {
    let mut urls = Vec::new();
    extract_urls(value, &mut urls);
    urls.into_iter().next()
}

fn operation_name(value: &Value) -> Option<String> {
    if let Some(name) = value.as_str().map(str::trim).filter(|name| !name.is_empty()) {
        return Some(name.to_string());
    }
    let obj = value.as_object()?;
    for key in ["operation_name", "operationName", "name"] {
        if let Some(name) = obj
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            return Some(name.to_string());
        }
    }
    obj.get("operation").and_then(operation_name)
}

fn is_done(value: &Value) -> bool {
    if value.get("done").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    value
        .get("status")
        .and_then(Value::as_str)
        .map(|status| {
            matches!(
                status.trim().to_ascii_lowercase().as_str(),
                "done" | "succeeded" | "completed" | "success"
            )
        })
        .unwrap_or(false)
}

fn extract_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(obj) => obj
            .get("text")
            .or_else(|| obj.get("content"))
            .or_else(|| obj.get("output"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                let parts = obj
                    .get("candidates")?
                    .get(0)?
                    .get("content")?
                    .get("parts")?
                    .as_array()?;
                Some(
                    parts
                        .iter()
                        .filter_map(|part| part.get("text").and_then(Value::as_str))
                        .collect::<Vec<&str>>()
                        .join("\n"),
                )
            }),
        _ => None,
    }?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
