use std::env;
use std::time::Duration;

pub const DEFAULT_TOOLS_API_BASE: &str = "https://backend.composio.dev/api/v3";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolNames {
    pub generate_image: String,
    pub generate_video: String,
    pub wait_for_video: String,
    pub video_status: String,
    pub generate_text: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            generate_image: "GEMINI_GENERATE_IMAGE".to_string(),
            generate_video: "GEMINI_GENERATE_VIDEOS".to_string(),
            wait_for_video: "GEMINI_WAIT_FOR_VIDEO".to_string(),
            video_status: "GEMINI_GET_VIDEOS_OPERATION".to_string(),
            generate_text: "GEMINI_GENERATE_CONTENT".to_string(),
        }
    }
}

/// Runtime settings for the studio. Built from the environment; the CLI
/// overrides individual fields from flags.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub backend: String,
    pub tools_api_base: String,
    pub tools_api_key: Option<String>,
    pub tools_user_id: String,
    pub gemini_api_base: String,
    pub gemini_api_key: Option<String>,
    pub vision_model: Option<String>,
    pub image_model: Option<String>,
    pub video_model: Option<String>,
    pub text_model: Option<String>,
    pub request_timeout_s: f64,
    pub video_poll_interval_s: f64,
    pub video_poll_timeout_s: f64,
    pub max_upload_bytes: u64,
    pub vision_max_dim: u32,
    pub tool_names: ToolNames,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| {
                lookup(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };
        let read_f64 = |key: &str, default: f64, min: f64, max: f64| -> f64 {
            read(&[key])
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(default)
                .clamp(min, max)
        };
        let defaults = ToolNames::default();

        Self {
            backend: read(&["BRANDKIT_BACKEND"])
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_else(|| "http".to_string()),
            tools_api_base: read(&["BRANDKIT_TOOLS_API_BASE"])
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TOOLS_API_BASE.to_string()),
            tools_api_key: read(&["BRANDKIT_TOOLS_API_KEY", "COMPOSIO_API_KEY"]),
            tools_user_id: read(&["BRANDKIT_TOOLS_USER_ID"])
                .unwrap_or_else(|| "default".to_string()),
            gemini_api_base: read(&["GEMINI_API_BASE"])
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            gemini_api_key: read(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            vision_model: read(&["BRANDKIT_VISION_MODEL"]),
            image_model: read(&["BRANDKIT_IMAGE_MODEL"]),
            video_model: read(&["BRANDKIT_VIDEO_MODEL"]),
            text_model: read(&["BRANDKIT_TEXT_MODEL"]),
            request_timeout_s: read_f64("BRANDKIT_REQUEST_TIMEOUT", 120.0, 10.0, 600.0),
            video_poll_interval_s: read_f64("BRANDKIT_VIDEO_POLL_INTERVAL", 10.0, 0.5, 60.0),
            video_poll_timeout_s: read_f64("BRANDKIT_VIDEO_POLL_TIMEOUT", 600.0, 5.0, 3600.0),
            max_upload_bytes: read(&["BRANDKIT_MAX_UPLOAD_BYTES"])
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
                .clamp(1024, 50 * 1024 * 1024),
            vision_max_dim: read(&["BRANDKIT_VISION_MAX_DIM"])
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(1024)
                .clamp(128, 4096),
            tool_names: ToolNames {
                generate_image: read(&["BRANDKIT_TOOL_GENERATE_IMAGE"])
                    .unwrap_or(defaults.generate_image),
                generate_video: read(&["BRANDKIT_TOOL_GENERATE_VIDEO"])
                    .unwrap_or(defaults.generate_video),
                wait_for_video: read(&["BRANDKIT_TOOL_WAIT_FOR_VIDEO"])
                    .unwrap_or(defaults.wait_for_video),
                video_status: read(&["BRANDKIT_TOOL_VIDEO_STATUS"])
                    .unwrap_or(defaults.video_status),
                generate_text: read(&["BRANDKIT_TOOL_GENERATE_TEXT"])
                    .unwrap_or(defaults.generate_text),
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_s)
    }

    pub fn video_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.video_poll_interval_s)
    }

    pub fn video_poll_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.video_poll_timeout_s)
    }
}
