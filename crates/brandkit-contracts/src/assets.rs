use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aspect::{AspectRatio, ImageSlot};
use crate::brand::BrandIdentity;
use crate::text::{coerce_text_list, value_as_clean_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
    Copy,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Copy => "copy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl AssetStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssetStatus::Completed | AssetStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    pub kind: AssetKind,
    pub aspect_ratio: Option<AspectRatio>,
    pub variant: u32,
    pub prompt: String,
    pub status: AssetStatus,
    pub url: Option<String>,
    pub error: Option<String>,
    pub latency_s: Option<f64>,
}

impl AssetRecord {
    pub fn image(slot: &ImageSlot, prompt: impl Into<String>) -> Self {
        Self::pending(
            format!(
                "image-{:02}-{}-v{}",
                slot.index + 1,
                slot.aspect_ratio.as_str().replace(':', "x"),
                slot.variant
            ),
            AssetKind::Image,
            Some(slot.aspect_ratio),
            slot.variant,
            prompt,
        )
    }

    pub fn video(aspect_ratio: AspectRatio, prompt: impl Into<String>) -> Self {
        Self::pending(
            format!("video-{}", aspect_ratio.as_str().replace(':', "x")),
            AssetKind::Video,
            Some(aspect_ratio),
            1,
            prompt,
        )
    }

    pub fn copy(prompt: impl Into<String>) -> Self {
        Self::pending("copy".to_string(), AssetKind::Copy, None, 1, prompt)
    }

    fn pending(
        asset_id: String,
        kind: AssetKind,
        aspect_ratio: Option<AspectRatio>,
        variant: u32,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            asset_id,
            kind,
            aspect_ratio,
            variant,
            prompt: prompt.into(),
            status: AssetStatus::Pending,
            url: None,
            error: None,
            latency_s: None,
        }
    }

    pub fn start(&mut self) {
        if !self.status.is_terminal() {
            self.status = AssetStatus::Generating;
        }
    }

    pub fn complete(&mut self, url: Option<String>, latency_s: f64) {
        self.status = AssetStatus::Completed;
        self.url = url;
        self.error = None;
        self.latency_s = Some(latency_s.max(0.0));
    }

    pub fn fail(&mut self, error: impl Into<String>, latency_s: f64) {
        self.status = AssetStatus::Failed;
        self.url = None;
        self.error = Some(error.into());
        self.latency_s = Some(latency_s.max(0.0));
    }
}

/// The results list plus the counters derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBoard {
    assets: Vec<AssetRecord>,
}

impl AssetBoard {
    pub fn new(assets: Vec<AssetRecord>) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &[AssetRecord] {
        &self.assets
    }

    pub fn get(&self, asset_id: &str) -> Option<&AssetRecord> {
        self.assets.iter().find(|asset| asset.asset_id == asset_id)
    }

    pub fn get_mut(&mut self, asset_id: &str) -> Option<&mut AssetRecord> {
        self.assets
            .iter_mut()
            .find(|asset| asset.asset_id == asset_id)
    }

    pub fn of_kind(&self, kind: AssetKind) -> impl Iterator<Item = &AssetRecord> {
        self.assets.iter().filter(move |asset| asset.kind == kind)
    }

    pub fn total(&self) -> usize {
        self.assets.len()
    }

    pub fn count(&self, status: AssetStatus) -> usize {
        self.assets
            .iter()
            .filter(|asset| asset.status == status)
            .count()
    }

    pub fn completed(&self) -> usize {
        self.count(AssetStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(AssetStatus::Failed)
    }

    pub fn pending(&self) -> usize {
        self.total() - self.completed() - self.failed()
    }

    /// Share of assets that reached a terminal state.
    pub fn progress(&self) -> f64 {
        if self.assets.is_empty() {
            return 1.0;
        }
        (self.completed() + self.failed()) as f64 / self.total() as f64
    }

    pub fn is_settled(&self) -> bool {
        self.assets.iter().all(|asset| asset.status.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCopy {
    pub headline: String,
    pub body: String,
    pub call_to_action: String,
    pub hashtags: Vec<String>,
}

impl AdCopy {
    /// Canned copy assembled from the identity when text generation fails.
    pub fn fallback(identity: &BrandIdentity) -> Self {
        let lead_keyword = identity
            .keywords
            .first()
            .cloned()
            .unwrap_or_else(|| "quality".to_string());
        Self {
            headline: format!("Discover {}", identity.brand_name),
            body: format!(
                "{} brings {} {} to {}.",
                identity.brand_name,
                lead_keyword.to_ascii_lowercase(),
                identity.industry,
                identity.target_audience
            ),
            call_to_action: "Shop now".to_string(),
            hashtags: identity
                .keywords
                .iter()
                .take(4)
                .map(|keyword| hashtag(keyword))
                .filter(|tag| tag.len() > 1)
                .collect(),
        }
    }
}

pub fn copy_instruction_schema() -> &'static str {
    "Respond with JSON only (no markdown):\n{\n  \"headline\": \"<= 8 words\",\n  \"body\": \"<= 30 words\",\n  \"call_to_action\": \"<= 4 words\",\n  \"hashtags\": [\"#tag\", \"...\"]\n}"
}

/// Headline and body are required; a missing call to action falls back to a
/// generic one.
pub fn parse_ad_copy_payload(payload: &Map<String, Value>) -> Option<AdCopy> {
    let headline = value_as_clean_text(
        payload.get("headline").or_else(|| payload.get("title")),
        90,
    )?;
    let body = value_as_clean_text(
        payload
            .get("body")
            .or_else(|| payload.get("primary_text"))
            .or_else(|| payload.get("description")),
        320,
    )?;
    let call_to_action = value_as_clean_text(
        payload
            .get("call_to_action")
            .or_else(|| payload.get("callToAction"))
            .or_else(|| payload.get("cta")),
        40,
    )
    .unwrap_or_else(|| "Learn more".to_string());
    let hashtags = coerce_text_list(payload.get("hashtags"), 6, 32)
        .iter()
        .map(|tag| hashtag(tag))
        .filter(|tag| tag.len() > 1)
        .collect();
    Some(AdCopy {
        headline,
        body,
        call_to_action,
        hashtags,
    })
}

fn hashtag(raw: &str) -> String {
    let body = raw
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect::<String>();
    format!("#{body}")
}
