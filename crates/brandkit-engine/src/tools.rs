use std::sync::Arc;

use brandkit_contracts::providers::{NamedProvider, ProviderRegistry};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{StudioConfig, ToolNames};
use crate::error::StudioError;
use crate::http::{build_client, response_json_or_error, truncate_text};

/// Result of one tool call. `data` is the tool's own payload; `raw` is the
/// whole envelope as returned, kept for receipts.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub data: Value,
    pub raw: Value,
}

pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &str;
    fn execute(&self, tool: &str, params: &Map<String, Value>) -> Result<ToolOutput, StudioError>;
}

/// A named executor, so the engine can pick one by `--backend`.
#[derive(Clone)]
pub struct ToolBackend {
    name: String,
    executor: Arc<dyn ToolExecutor>,
}

impl ToolBackend {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            name: executor.name().to_string(),
            executor,
        }
    }

    pub fn executor(&self) -> Arc<dyn ToolExecutor> {
        Arc::clone(&self.executor)
    }
}

impl NamedProvider for ToolBackend {
    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ToolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBackend").field("name", &self.name).finish()
    }
}

pub fn default_backends(config: &StudioConfig) -> Result<ProviderRegistry<ToolBackend>, StudioError> {
    Ok(ProviderRegistry::new(vec![
        ToolBackend::new(Arc::new(HttpToolExecutor::new(config)?)),
        ToolBackend::new(Arc::new(DryrunToolExecutor::new(config.tool_names.clone()))),
    ]))
}

pub struct HttpToolExecutor {
    api_base: String,
    api_key: Option<String>,
    user_id: String,
    http: HttpClient,
}

impl HttpToolExecutor {
    pub fn new(config: &StudioConfig) -> Result<Self, StudioError> {
        Ok(Self {
            api_base: config.tools_api_base.clone(),
            api_key: config.tools_api_key.clone(),
            user_id: config.tools_user_id.clone(),
            http: build_client("tools", config.request_timeout())?,
        })
    }

    pub fn endpoint(&self, tool: &str) -> String {
        format!("{}/tools/execute/{}", self.api_base, tool.trim())
    }
}

impl ToolExecutor for HttpToolExecutor {
    fn name(&self) -> &str {
        "http"
    }

    fn execute(&self, tool: &str, params: &Map<String, Value>) -> Result<ToolOutput, StudioError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(StudioError::MissingCredential(
                "BRANDKIT_TOOLS_API_KEY or COMPOSIO_API_KEY".to_string(),
            ));
        };
        let endpoint = self.endpoint(tool);
        debug!(tool, endpoint = %endpoint, "executing tool");
        let response = self
            .http
            .post(&endpoint)
            .header("x-api-key", api_key)
            .json(&json!({
                "arguments": params,
                "user_id": self.user_id,
            }))
            .send()
            .map_err(|err| StudioError::transport(tool, err))?;
        let raw = response_json_or_error(tool, response)?;
        interpret_tool_response(tool, raw)
    }
}

/// Turns the service envelope into data or a tool error. The service reports
/// failures in-band with `successful: false` or a non-empty `error`.
pub(crate) fn interpret_tool_response(tool: &str, raw: Value) -> Result<ToolOutput, StudioError> {
    let Some(envelope) = raw.as_object() else {
        return Ok(ToolOutput {
            data: raw.clone(),
            raw,
        });
    };
    let error_text = envelope.get("error").and_then(error_message);
    let unsuccessful = envelope.get("successful").and_then(Value::as_bool) == Some(false);
    if unsuccessful || error_text.is_some() {
        let message = error_text.unwrap_or_else(|| "tool reported failure".to_string());
        return Err(StudioError::tool(tool, truncate_text(&message, 512)));
    }
    let data = envelope.get("data").cloned().unwrap_or_else(|| raw.clone());
    Ok(ToolOutput { data, raw })
}

fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

/// Offline executor with stable outputs derived from the request, for
/// `--dryrun` and tests.
pub struct DryrunToolExecutor {
    tool_names: ToolNames,
}

impl DryrunToolExecutor {
    pub fn new(tool_names: ToolNames) -> Self {
        Self { tool_names }
    }

    fn digest(params: &Map<String, Value>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Value::Object(params.clone()).to_string().as_bytes());
        hex::encode(hasher.finalize())[..12].to_string()
    }

    fn video_uri(operation: &str) -> String {
        let id = operation.rsplit('/').next().unwrap_or(operation);
        format!("https://dryrun.brandkit.local/videos/{id}.mp4")
    }

    fn operation_param(tool: &str, params: &Map<String, Value>) -> Result<String, StudioError> {
        params
            .get("operation_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StudioError::tool(tool, "operation_name is required"))
    }
}

impl ToolExecutor for DryrunToolExecutor {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn execute(&self, tool: &str, params: &Map<String, Value>) -> Result<ToolOutput, StudioError> {
        let names = &self.tool_names;
        let digest = Self::digest(params);
        let data = if tool == names.generate_image {
            json!({
                "images": [{
                    "url": format!("https://dryrun.brandkit.local/images/{digest}.png"),
                    "mime_type": "image/png",
                }]
            })
        } else if tool == names.generate_video {
            json!({
                "operation_name": format!("operations/dryrun-{digest}"),
                "done": false,
            })
        } else if tool == names.wait_for_video {
            let operation = Self::operation_param(tool, params)?;
            json!({ "operation_name": operation, "done": true })
        } else if tool == names.video_status {
            let operation = Self::operation_param(tool, params)?;
            json!({
                "name": operation,
                "done": true,
                "response": {
                    "generatedVideos": [{ "video": { "uri": Self::video_uri(&operation) } }]
                }
            })
        } else if tool == names.generate_text {
            let copy = json!({
                "headline": "Made for the way you work",
                "body": "Thoughtful design, honest materials and a look that stays fresh all season.",
                "call_to_action": "Shop now",
                "hashtags": ["#NewSeason", "#MadeWell"],
            });
            json!({ "text": copy.to_string() })
        } else {
            return Err(StudioError::tool(tool, "unknown tool for dryrun backend"));
        };
        Ok(ToolOutput {
            raw: json!({ "successful": true, "data": data, "error": null }),
            data,
        })
    }
}
