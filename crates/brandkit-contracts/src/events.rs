use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::status::PipelineStatus;

pub type EventPayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CampaignStarted,
    StatusChanged,
    BrandAnalyzed,
    AssetStarted,
    AssetCompleted,
    AssetFailed,
    CopyReady,
    CampaignFinished,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CampaignStarted => "campaign_started",
            EventKind::StatusChanged => "status_changed",
            EventKind::BrandAnalyzed => "brand_analyzed",
            EventKind::AssetStarted => "asset_started",
            EventKind::AssetCompleted => "asset_completed",
            EventKind::AssetFailed => "asset_failed",
            EventKind::CopyReady => "copy_ready",
            EventKind::CampaignFinished => "campaign_finished",
        }
    }
}

/// Append-only writer for `events.jsonl`.
///
/// - default fields are `type`, `campaign_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
///
/// Clones share one file lock, so batch workers can emit concurrently
/// without interleaving lines.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    campaign_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, campaign_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                campaign_id: campaign_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn campaign_id(&self) -> &str {
        &self.inner.campaign_id
    }

    pub fn emit(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert(
            "campaign_id".to_string(),
            Value::String(self.inner.campaign_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }

    pub fn emit_status(
        &self,
        from: PipelineStatus,
        to: PipelineStatus,
        error: Option<&str>,
    ) -> anyhow::Result<Value> {
        let mut payload = EventPayload::new();
        payload.insert("from".to_string(), Value::String(from.as_str().to_string()));
        payload.insert("status".to_string(), Value::String(to.as_str().to_string()));
        payload.insert(
            "error".to_string(),
            error
                .map(|message| Value::String(message.to_string()))
                .unwrap_or(Value::Null),
        );
        self.emit(EventKind::StatusChanged, payload)
    }
}

pub(crate) fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "campaign-123");

        let mut payload = EventPayload::new();
        payload.insert("out_dir".to_string(), Value::String("/tmp/run".to_string()));
        let emitted = writer.emit(EventKind::CampaignStarted, payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("campaign_started".to_string()));
        assert_eq!(parsed["campaign_id"], Value::String("campaign-123".to_string()));
        assert_eq!(parsed["out_dir"], Value::String("/tmp/run".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "campaign-123");

        let mut payload = EventPayload::new();
        payload.insert(
            "campaign_id".to_string(),
            Value::String("override".to_string()),
        );
        let emitted = writer.emit(EventKind::CopyReady, payload)?;
        assert_eq!(emitted["campaign_id"], Value::String("override".to_string()));
        assert_eq!(emitted["type"], Value::String("copy_ready".to_string()));
        Ok(())
    }

    #[test]
    fn status_events_carry_both_ends_of_the_transition() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("nested/events.jsonl"), "c");
        let ok = writer.emit_status(PipelineStatus::Idle, PipelineStatus::Analyzing, None)?;
        assert_eq!(ok["from"], Value::String("idle".to_string()));
        assert_eq!(ok["status"], Value::String("analyzing".to_string()));
        assert_eq!(ok["error"], Value::Null);

        let failed = writer.emit_status(
            PipelineStatus::Generating,
            PipelineStatus::Error,
            Some("all assets failed"),
        )?;
        assert_eq!(failed["error"], Value::String("all assets failed".to_string()));
        Ok(())
    }

    #[test]
    fn concurrent_emits_keep_lines_intact() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "campaign-123");

        std::thread::scope(|scope| {
            for idx in 0..8 {
                let writer = writer.clone();
                scope.spawn(move || {
                    let mut payload = EventPayload::new();
                    payload.insert("idx".to_string(), Value::from(idx));
                    writer.emit(EventKind::AssetStarted, payload)
                });
            }
        });

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8);
        for line in lines {
            let parsed: Value = serde_json::from_str(line)?;
            assert_eq!(parsed["type"], Value::String("asset_started".to_string()));
        }
        Ok(())
    }
}
