use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assets::{AdCopy, AssetBoard, AssetRecord};
use crate::brand::BrandAnalysis;
use crate::events::now_utc_iso;
use crate::status::PipelineStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: PipelineStatus,
    pub error: Option<String>,
    pub plan: String,
    pub brand: Option<BrandAnalysis>,
    pub total_assets: u64,
    pub completed_assets: u64,
    pub failed_assets: u64,
    pub assets: Vec<AssetRecord>,
    pub copy: Option<AdCopy>,
}

impl CampaignSummary {
    pub fn tally(&mut self, board: &AssetBoard) {
        self.total_assets = board.total() as u64;
        self.completed_assets = board.completed() as u64;
        self.failed_assets = board.failed() as u64;
        self.assets = board.assets().to_vec();
    }
}

pub fn write_summary(
    path: &Path,
    summary: &CampaignSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}
