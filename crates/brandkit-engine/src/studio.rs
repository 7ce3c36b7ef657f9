use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use brandkit_contracts::aspect::{AspectPlan, AspectRatio, ImageSlot};
use brandkit_contracts::assets::{
    parse_ad_copy_payload, AdCopy, AssetBoard, AssetRecord, AssetStatus,
};
use brandkit_contracts::brand::{
    brand_analysis_instruction, parse_brand_payload, AnalysisSource, BrandAnalysis, BrandIdentity,
};
use brandkit_contracts::events::{EventKind, EventPayload, EventWriter};
use brandkit_contracts::json_extract::extract_json_object_from_text;
use brandkit_contracts::models::{Capability, ModelSelector};
use brandkit_contracts::prompts::{copy_prompt, image_prompt, video_prompt};
use brandkit_contracts::providers::ProviderRegistry;
use brandkit_contracts::runs::receipts::{build_asset_receipt, write_receipt};
use brandkit_contracts::runs::summary::{write_summary, CampaignSummary};
use brandkit_contracts::status::{PipelineStatus, StatusTracker};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StudioConfig;
use crate::error::StudioError;
use crate::generation::{GenerationModels, GenerationService};
use crate::tools::{ToolBackend, ToolExecutor};
use crate::upload::BrandUpload;
use crate::vision::{DryrunVisionClient, GeminiVisionClient, VisionClient};

const DRYRUN_MODEL: &str = "dryrun-multimodal-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    pub include_video: bool,
    pub video_ratio: AspectRatio,
    pub include_copy: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            include_video: true,
            video_ratio: AspectRatio::Widescreen,
            include_copy: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignResults {
    pub board: AssetBoard,
    pub copy: Option<AdCopy>,
    pub copy_source: Option<AnalysisSource>,
}

/// What observers see while a campaign runs. Asset updates arrive from batch
/// worker threads.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Status {
        from: PipelineStatus,
        to: PipelineStatus,
        error: Option<String>,
    },
    Asset {
        asset_id: String,
        status: AssetStatus,
        progress: f64,
    },
}

pub type ProgressObserver = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Job {
    Image(ImageSlot),
    Video(AspectRatio),
    Copy,
}

pub struct StudioEngine {
    run_dir: PathBuf,
    campaign_id: String,
    events: EventWriter,
    config: StudioConfig,
    backend: String,
    executor: Arc<dyn ToolExecutor>,
    vision: Option<Arc<dyn VisionClient>>,
    vision_model: String,
    models: GenerationModels,
    tracker: StatusTracker,
    started_at: String,
    observer: Option<ProgressObserver>,
    plan: Option<AspectPlan>,
    analysis: Option<BrandAnalysis>,
    results: Option<CampaignResults>,
}

impl StudioEngine {
    pub fn new(
        run_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        config: StudioConfig,
        backends: &ProviderRegistry<ToolBackend>,
    ) -> Result<Self> {
        let backend = backends
            .resolve(&config.backend)
            .map_err(|message| anyhow!(message))?;
        let executor = backend.executor();
        Self::with_executor(run_dir, events_path, config, executor)
    }

    pub fn with_executor(
        run_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        config: StudioConfig,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<Self> {
        let run_dir = run_dir.into();
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed creating {}", run_dir.display()))?;
        let campaign_id = format!("campaign-{}", Uuid::new_v4().simple());
        let events = EventWriter::new(events_path.into(), campaign_id.clone());
        let backend = executor.name().to_string();

        let selector = ModelSelector::new(None);
        let dryrun = backend == "dryrun";
        let pick = |configured: Option<&str>, capability: Capability| -> Result<String> {
            let requested = configured.or(dryrun.then_some(DRYRUN_MODEL));
            let selection = selector
                .select(requested, capability)
                .map_err(|message| anyhow!(message))?;
            if let (Some(reason), Some(_)) = (&selection.fallback_reason, &selection.requested) {
                warn!(capability = %capability, "{reason}");
            }
            Ok(selection.model.name)
        };
        let vision_model = pick(config.vision_model.as_deref(), Capability::Vision)?;
        let models = GenerationModels {
            image: pick(config.image_model.as_deref(), Capability::Image)?,
            video: pick(config.video_model.as_deref(), Capability::Video)?,
            text: pick(config.text_model.as_deref(), Capability::Text)?,
        };

        events.emit(
            EventKind::CampaignStarted,
            map_object(json!({
                "out_dir": run_dir.to_string_lossy().to_string(),
                "backend": backend,
                "vision_model": vision_model,
                "image_model": models.image,
                "video_model": models.video,
                "text_model": models.text,
            })),
        )?;
        info!(campaign_id = %campaign_id, backend = %backend, "campaign started");

        Ok(Self {
            run_dir,
            campaign_id,
            events,
            config,
            backend,
            executor,
            vision: None,
            vision_model,
            models,
            tracker: StatusTracker::new(),
            started_at: now_utc_iso(),
            observer: None,
            plan: None,
            analysis: None,
            results: None,
        })
    }

    /// Replaces the vision client chosen from the backend.
    pub fn with_vision(mut self, vision: Arc<dyn VisionClient>) -> Self {
        self.vision_model = vision.model().to_string();
        self.vision = Some(vision);
        self
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    pub fn status(&self) -> PipelineStatus {
        self.tracker.current()
    }

    pub fn error(&self) -> Option<&str> {
        self.tracker.error()
    }

    pub fn history(&self) -> &[PipelineStatus] {
        self.tracker.history()
    }

    pub fn models(&self) -> &GenerationModels {
        &self.models
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    fn set_status(&mut self, next: PipelineStatus) -> Result<()> {
        let previous = self.tracker.advance(next).map_err(|message| anyhow!(message))?;
        self.events.emit_status(previous, next, None)?;
        info!(from = %previous, to = %next, "status changed");
        self.notify(&ProgressUpdate::Status {
            from: previous,
            to: next,
            error: None,
        });
        Ok(())
    }

    /// Moves to `error` from any state. Always succeeds; event write failures
    /// are only logged.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        let previous = self.tracker.fail(message.clone());
        if previous == PipelineStatus::Error {
            return;
        }
        if let Err(err) = self
            .events
            .emit_status(previous, PipelineStatus::Error, Some(&message))
        {
            warn!(error = %err, "failed writing status event");
        }
        warn!(from = %previous, error = %message, "campaign failed");
        self.notify(&ProgressUpdate::Status {
            from: previous,
            to: PipelineStatus::Error,
            error: Some(message),
        });
    }

    fn notify(&self, update: &ProgressUpdate) {
        if let Some(observer) = self.observer.as_ref() {
            observer(update);
        }
    }

    fn vision_client(&self) -> Result<Arc<dyn VisionClient>, StudioError> {
        if let Some(vision) = self.vision.as_ref() {
            return Ok(Arc::clone(vision));
        }
        if self.backend == "dryrun" {
            return Ok(Arc::new(DryrunVisionClient));
        }
        Ok(Arc::new(GeminiVisionClient::new(
            &self.config,
            self.vision_model.clone(),
        )?))
    }

    /// Infers the brand identity. Any vision or parsing failure yields the
    /// fallback identity with a warning; only bookkeeping errors are returned.
    pub fn analyze(&mut self, upload: &BrandUpload) -> Result<BrandAnalysis> {
        self.set_status(PipelineStatus::Analyzing)?;

        let analysis = match self.vision_client().and_then(|vision| {
            let (bytes, mime_type) = upload.vision_payload(self.config.vision_max_dim);
            vision.analyze_image(brand_analysis_instruction(), &bytes, &mime_type)
        }) {
            Ok(text) => {
                let identity = extract_json_object_from_text(&text)
                    .as_ref()
                    .and_then(parse_brand_payload);
                match identity {
                    Some(identity) => {
                        BrandAnalysis::from_model(identity, self.vision_model.clone())
                    }
                    None => BrandAnalysis::fallback("brand analysis response was not usable JSON"),
                }
            }
            Err(err) => BrandAnalysis::fallback(format!("brand analysis failed: {err}")),
        };
        if let Some(warning) = analysis.warning.as_deref() {
            warn!(warning, "using fallback brand identity");
        }

        let mut payload = map_object(json!({
            "source": analysis.source,
            "model": analysis.model,
            "warning": analysis.warning,
            "upload": {
                "file_name": upload.file_name,
                "mime_type": upload.mime_type,
                "width": upload.width,
                "height": upload.height,
                "sha256": upload.sha256,
            },
        }));
        payload.insert(
            "identity".to_string(),
            serde_json::to_value(&analysis.identity)?,
        );
        self.events.emit(EventKind::BrandAnalyzed, payload)?;
        info!(
            brand = %analysis.identity.brand_name,
            fallback = analysis.used_fallback(),
            "brand analyzed"
        );

        self.analysis = Some(analysis.clone());
        Ok(analysis)
    }

    /// Runs every image slot, the video and the copy job in parallel. Each
    /// asset settles on its own; a failed request never aborts its siblings.
    pub fn generate(
        &mut self,
        identity: &BrandIdentity,
        plan: &AspectPlan,
        options: GenerateOptions,
    ) -> Result<CampaignResults> {
        self.set_status(PipelineStatus::Generating)?;
        self.plan = Some(plan.clone());

        let ratios = plan.ratios();
        let mut jobs = Vec::new();
        let mut records = Vec::new();
        for slot in plan.fan_out() {
            records.push(AssetRecord::image(&slot, image_prompt(identity, &slot)));
            jobs.push(Job::Image(slot));
        }
        if options.include_video {
            records.push(AssetRecord::video(
                options.video_ratio,
                video_prompt(identity, options.video_ratio),
            ));
            jobs.push(Job::Video(options.video_ratio));
        }
        if options.include_copy {
            records.push(AssetRecord::copy(copy_prompt(identity, &ratios)));
            jobs.push(Job::Copy);
        }
        let job_ids = records
            .iter()
            .map(|record| record.asset_id.clone())
            .collect::<Vec<String>>();
        info!(assets = records.len(), plan = %plan, "generating campaign assets");

        let service = GenerationService::new(
            Arc::clone(&self.executor),
            &self.config,
            self.models.clone(),
        );
        let batch = Batch {
            service: &service,
            events: &self.events,
            run_dir: &self.run_dir,
            board: Mutex::new(AssetBoard::new(records)),
            copy: Mutex::new(None),
            observer: self.observer.as_ref(),
        };
        thread::scope(|scope| {
            for (job, asset_id) in jobs.iter().zip(job_ids.iter()) {
                let batch = &batch;
                scope.spawn(move || batch.run_job(*job, asset_id));
            }
        });

        let board = batch.board.into_inner().unwrap_or_else(PoisonError::into_inner);
        let copy_result = batch.copy.into_inner().unwrap_or_else(PoisonError::into_inner);
        let (copy, copy_source) = if options.include_copy {
            match copy_result {
                Some(copy) => (Some(copy), Some(AnalysisSource::Model)),
                None => (Some(AdCopy::fallback(identity)), Some(AnalysisSource::Fallback)),
            }
        } else {
            (None, None)
        };
        if let Some(copy) = copy.as_ref() {
            let mut payload = map_object(json!({ "source": copy_source }));
            payload.insert("copy".to_string(), serde_json::to_value(copy)?);
            self.events.emit(EventKind::CopyReady, payload)?;
        }

        let results = CampaignResults {
            board,
            copy,
            copy_source,
        };
        self.results = Some(results.clone());
        Ok(results)
    }

    /// Full pipeline for an already validated upload. Ends `completed` when
    /// at least one asset succeeded, otherwise `error`. A bookkeeping failure
    /// mid-run still settles the campaign in `error` and writes the summary
    /// before the error is returned.
    pub fn run(
        &mut self,
        upload: &BrandUpload,
        plan: &AspectPlan,
        options: GenerateOptions,
    ) -> Result<CampaignSummary> {
        match self.run_stages(upload, plan, options) {
            Ok(()) => self.finish(),
            Err(err) => {
                self.fail(format!("{err:#}"));
                if let Err(finish_err) = self.finish() {
                    warn!(error = %finish_err, "failed finishing campaign");
                }
                Err(err)
            }
        }
    }

    fn run_stages(
        &mut self,
        upload: &BrandUpload,
        plan: &AspectPlan,
        options: GenerateOptions,
    ) -> Result<()> {
        let analysis = self.analyze(upload)?;
        let results = self.generate(&analysis.identity, plan, options)?;

        let board = &results.board;
        if board.completed() > 0 {
            self.set_status(PipelineStatus::Completed)?;
        } else {
            let first_error = board
                .assets()
                .iter()
                .find_map(|asset| asset.error.as_deref())
                .unwrap_or("no assets were requested");
            self.fail(format!(
                "no assets were generated ({} failed): {first_error}",
                board.failed()
            ));
        }
        Ok(())
    }

    /// Loads the upload first; a rejected file ends the campaign in `error`.
    pub fn run_path(
        &mut self,
        image_path: &Path,
        plan: &AspectPlan,
        options: GenerateOptions,
    ) -> Result<CampaignSummary> {
        match BrandUpload::from_path(image_path, self.config.max_upload_bytes) {
            Ok(upload) => self.run(&upload, plan, options),
            Err(err) => {
                self.plan = Some(plan.clone());
                self.fail(err.to_string());
                self.finish()
            }
        }
    }

    /// Writes `summary.json` and the closing event.
    pub fn finish(&mut self) -> Result<CampaignSummary> {
        let mut summary = CampaignSummary {
            campaign_id: self.campaign_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            status: self.tracker.current(),
            error: self.tracker.error().map(str::to_string),
            plan: self
                .plan
                .as_ref()
                .map(|plan| plan.to_string())
                .unwrap_or_default(),
            brand: self.analysis.clone(),
            total_assets: 0,
            completed_assets: 0,
            failed_assets: 0,
            assets: Vec::new(),
            copy: None,
        };
        if let Some(results) = self.results.as_ref() {
            summary.tally(&results.board);
            summary.copy = results.copy.clone();
        }

        let extra = map_object(json!({
            "backend": self.backend,
            "vision_model": self.vision_model,
            "image_model": self.models.image,
            "video_model": self.models.video,
            "text_model": self.models.text,
            "history": self
                .tracker
                .history()
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<&str>>(),
        }));
        let summary_path = self.run_dir.join("summary.json");
        write_summary(&summary_path, &summary, Some(&extra))?;
        self.events.emit(
            EventKind::CampaignFinished,
            map_object(json!({
                "status": summary.status,
                "error": summary.error,
                "total_assets": summary.total_assets,
                "completed_assets": summary.completed_assets,
                "failed_assets": summary.failed_assets,
                "summary_path": summary_path.to_string_lossy().to_string(),
            })),
        )?;
        info!(
            status = %summary.status,
            completed = summary.completed_assets,
            failed = summary.failed_assets,
            "campaign finished"
        );
        Ok(summary)
    }
}

struct Batch<'a> {
    service: &'a GenerationService,
    events: &'a EventWriter,
    run_dir: &'a Path,
    board: Mutex<AssetBoard>,
    copy: Mutex<Option<AdCopy>>,
    observer: Option<&'a ProgressObserver>,
}

/// One finished request: the value plus what goes into the receipt.
struct JobOutput {
    url: Option<String>,
    tool: String,
    request: Map<String, Value>,
    response: Value,
    warnings: Vec<String>,
}

impl Batch<'_> {
    fn board(&self) -> MutexGuard<'_, AssetBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_job(&self, job: Job, asset_id: &str) {
        let prompt = {
            let mut board = self.board();
            let Some(asset) = board.get_mut(asset_id) else {
                return;
            };
            asset.start();
            asset.prompt.clone()
        };
        self.emit(
            EventKind::AssetStarted,
            map_object(json!({ "asset_id": asset_id })),
        );
        self.report(asset_id, AssetStatus::Generating);

        let started = Instant::now();
        let outcome = match job {
            Job::Image(slot) => self.image(&prompt, slot.aspect_ratio),
            Job::Video(ratio) => self.video(&prompt, ratio),
            Job::Copy => self.copy(&prompt),
        };
        let latency_s = started.elapsed().as_secs_f64();

        let (record, output) = {
            let mut board = self.board();
            let Some(asset) = board.get_mut(asset_id) else {
                return;
            };
            let output = match outcome {
                Ok(output) => {
                    asset.complete(output.url.clone(), latency_s);
                    Some(output)
                }
                Err(err) => {
                    asset.fail(err.to_string(), latency_s);
                    None
                }
            };
            (asset.clone(), output)
        };

        match output {
            Some(output) => {
                info!(asset_id, latency_s, "asset completed");
                let receipt_path = self
                    .run_dir
                    .join("receipts")
                    .join(format!("receipt-{asset_id}.json"));
                let receipt = build_asset_receipt(
                    &record,
                    &output.tool,
                    &output.request,
                    &output.response,
                    &output.warnings,
                );
                if let Err(err) = write_receipt(&receipt_path, &receipt) {
                    warn!(asset_id, error = %err, "failed writing receipt");
                }
                self.emit(
                    EventKind::AssetCompleted,
                    map_object(json!({
                        "asset_id": asset_id,
                        "kind": record.kind.as_str(),
                        "url": record.url,
                        "latency_s": latency_s,
                        "receipt_path": receipt_path.to_string_lossy().to_string(),
                    })),
                );
            }
            None => {
                let error = record.error.clone().unwrap_or_default();
                warn!(asset_id, error = %error, "asset failed");
                self.emit(
                    EventKind::AssetFailed,
                    map_object(json!({
                        "asset_id": asset_id,
                        "kind": record.kind.as_str(),
                        "error": error,
                        "latency_s": latency_s,
                    })),
                );
            }
        }
        self.report(asset_id, record.status);
    }

    fn image(&self, prompt: &str, ratio: AspectRatio) -> Result<JobOutput, StudioError> {
        let generated = self.service.generate_image(prompt, ratio)?;
        Ok(JobOutput {
            url: Some(generated.value),
            tool: generated.tool,
            request: generated.request,
            response: generated.response,
            warnings: generated.warnings,
        })
    }

    fn video(&self, prompt: &str, ratio: AspectRatio) -> Result<JobOutput, StudioError> {
        let started = self.service.generate_video(prompt, ratio)?;
        let finished = self.service.await_video(&started.value)?;
        let mut warnings = started.warnings;
        warnings.extend(finished.warnings);
        Ok(JobOutput {
            url: Some(finished.value),
            tool: started.tool,
            request: started.request,
            response: json!({
                "operation": started.response,
                "result": finished.response,
            }),
            warnings,
        })
    }

    fn copy(&self, prompt: &str) -> Result<JobOutput, StudioError> {
        let generated = self.service.generate_text(prompt)?;
        let copy = extract_json_object_from_text(&generated.value)
            .as_ref()
            .and_then(parse_ad_copy_payload)
            .ok_or_else(|| StudioError::invalid(&generated.tool, "ad copy was not usable JSON"))?;
        *self.copy.lock().unwrap_or_else(PoisonError::into_inner) = Some(copy);
        Ok(JobOutput {
            url: None,
            tool: generated.tool,
            request: generated.request,
            response: generated.response,
            warnings: generated.warnings,
        })
    }

    fn emit(&self, kind: EventKind, payload: EventPayload) {
        if let Err(err) = self.events.emit(kind, payload) {
            warn!(event = kind.as_str(), error = %err, "failed writing event");
        }
    }

    fn report(&self, asset_id: &str, status: AssetStatus) {
        if let Some(observer) = self.observer {
            let progress = self.board().progress();
            observer(&ProgressUpdate::Asset {
                asset_id: asset_id.to_string(),
                status,
                progress,
            });
        }
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use brandkit_contracts::aspect::AspectPlan;
    use brandkit_contracts::assets::{AssetKind, AssetStatus};
    use brandkit_contracts::brand::{AnalysisSource, FALLBACK_BRAND_NAME};
    use brandkit_contracts::status::PipelineStatus;
    use serde_json::{json, Value};

    use super::{GenerateOptions, ProgressUpdate, StudioEngine};
    use crate::config::StudioConfig;
    use crate::error::StudioError;
    use crate::tools::tests::FnExecutor;
    use crate::tools::{default_backends, DryrunToolExecutor, ToolExecutor};
    use crate::upload::tests::png_bytes;
    use crate::upload::BrandUpload;
    use crate::vision::VisionClient;

    struct CannedVision(Result<String, String>);

    impl VisionClient for CannedVision {
        fn model(&self) -> &str {
            "gemini-2.5-flash"
        }

        fn analyze_image(&self, _: &str, _: &[u8], _: &str) -> Result<String, StudioError> {
            self.0
                .clone()
                .map_err(|message| StudioError::invalid("vision", message))
        }
    }

    fn dryrun_config() -> StudioConfig {
        let mut config = StudioConfig::default();
        config.backend = "dryrun".to_string();
        config.video_poll_interval_s = 0.5;
        config
    }

    fn upload() -> BrandUpload {
        BrandUpload::from_bytes("brand.png", png_bytes(32, 32), 1_000_000).unwrap()
    }

    fn read_events(path: &std::path::Path) -> anyhow::Result<Vec<Value>> {
        std::fs::read_to_string(path)?
            .lines()
            .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
            .collect()
    }

    #[test]
    fn dryrun_campaign_completes_and_writes_artifacts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let run_dir = temp.path().join("run");
        let events_path = run_dir.join("events.jsonl");
        let config = dryrun_config();
        let backends = default_backends(&config)?;
        let mut engine = StudioEngine::new(&run_dir, &events_path, config, &backends)?;

        let summary = engine.run(&upload(), &AspectPlan::default(), GenerateOptions::default())?;

        assert_eq!(summary.status, PipelineStatus::Completed);
        assert_eq!(summary.total_assets, 6);
        assert_eq!(summary.completed_assets, 6);
        assert_eq!(summary.brand.as_ref().map(|b| b.source), Some(AnalysisSource::Model));
        assert_eq!(
            summary.copy.as_ref().map(|copy| copy.headline.as_str()),
            Some("Made for the way you work")
        );
        assert_eq!(
            engine.history(),
            &[
                PipelineStatus::Idle,
                PipelineStatus::Analyzing,
                PipelineStatus::Generating,
                PipelineStatus::Completed
            ]
        );
        assert!(run_dir.join("summary.json").exists());
        assert!(run_dir.join("receipts/receipt-video-16x9.json").exists());
        assert!(run_dir.join("receipts/receipt-image-01-1x1-v1.json").exists());

        let events = read_events(&events_path)?;
        let kinds = events
            .iter()
            .filter_map(|event| event["type"].as_str())
            .collect::<Vec<&str>>();
        assert_eq!(kinds.first(), Some(&"campaign_started"));
        assert_eq!(kinds.last(), Some(&"campaign_finished"));
        assert_eq!(kinds.iter().filter(|kind| **kind == "asset_completed").count(), 6);
        assert!(kinds.contains(&"brand_analyzed"));
        assert!(kinds.contains(&"copy_ready"));
        Ok(())
    }

    #[test]
    fn partial_failures_do_not_abort_siblings() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let executor = FnExecutor::new(|tool, params| {
            let ratio = params.get("aspect_ratio").and_then(Value::as_str);
            match (tool, ratio) {
                ("GEMINI_GENERATE_IMAGE", Some("9:16")) => {
                    Err(StudioError::tool(tool, "content policy violation"))
                }
                ("GEMINI_GENERATE_IMAGE", Some(ratio)) => Ok(json!({
                    "images": [{"url": format!("https://cdn.example/{}.png", ratio.replace(':', "x"))}]
                })),
                ("GEMINI_GENERATE_VIDEOS", _) => Err(StudioError::tool(tool, "video quota exhausted")),
                ("GEMINI_GENERATE_CONTENT", _) => Ok(json!({"text": "Sorry, I cannot help with that."})),
                _ => Err(StudioError::tool(tool, "unexpected")),
            }
        });
        let mut engine = StudioEngine::with_executor(
            temp.path(),
            temp.path().join("events.jsonl"),
            StudioConfig::default(),
            Arc::new(executor),
        )?
        .with_vision(Arc::new(CannedVision(Ok(
            "```json\n{\"brand_name\": \"Acme Coffee\", \"industry\": \"coffee\"}\n```".to_string(),
        ))));

        let plan = AspectPlan::parse("1:1=2,9:16,16:9").map_err(anyhow::Error::msg)?;
        let summary = engine.run(&upload(), &plan, GenerateOptions::default())?;
        assert_eq!(summary.status, PipelineStatus::Completed);
        assert_eq!(summary.total_assets, 6);
        assert_eq!(summary.completed_assets, 3);
        assert_eq!(summary.failed_assets, 3);

        let by_id = |id: &str| summary.assets.iter().find(|asset| asset.asset_id == id).cloned();
        let story = by_id("image-03-9x16-v1").unwrap();
        assert_eq!(story.status, AssetStatus::Failed);
        assert!(story.error.unwrap().contains("content policy violation"));
        let square = by_id("image-02-1x1-v2").unwrap();
        assert_eq!(square.status, AssetStatus::Completed);
        assert_eq!(square.url.as_deref(), Some("https://cdn.example/1x1.png"));
        assert_eq!(by_id("video-16x9").unwrap().status, AssetStatus::Failed);

        let copy = summary.copy.unwrap();
        assert_eq!(copy.headline, "Discover Acme Coffee");
        assert_eq!(copy.call_to_action, "Shop now");
        assert_eq!(summary.brand.unwrap().identity.brand_name, "Acme Coffee");
        Ok(())
    }

    #[test]
    fn vision_failure_falls_back_to_canned_identity() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut engine = StudioEngine::with_executor(
            temp.path(),
            temp.path().join("events.jsonl"),
            StudioConfig::default(),
            Arc::new(DryrunToolExecutor::new(Default::default())),
        )?
        .with_vision(Arc::new(CannedVision(Err("503 overloaded".to_string()))));
        let analysis = engine.analyze(&upload())?;
        assert!(analysis.used_fallback());
        assert_eq!(analysis.identity.brand_name, FALLBACK_BRAND_NAME);
        assert!(analysis.warning.unwrap().contains("503 overloaded"));
        assert_eq!(engine.status(), PipelineStatus::Analyzing);

        let mut engine = StudioEngine::with_executor(
            temp.path(),
            temp.path().join("events-2.jsonl"),
            StudioConfig::default(),
            Arc::new(DryrunToolExecutor::new(Default::default())),
        )?
        .with_vision(Arc::new(CannedVision(Ok("I think this is a coffee brand.".to_string()))));
        let analysis = engine.analyze(&upload())?;
        assert!(analysis.used_fallback());
        Ok(())
    }

    #[test]
    fn missing_gemini_key_falls_back_instead_of_failing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let executor = FnExecutor::new(|tool, _| Err(StudioError::tool(tool, "unused")));
        let mut engine = StudioEngine::with_executor(
            temp.path(),
            temp.path().join("events.jsonl"),
            StudioConfig::default(),
            Arc::new(executor),
        )?;
        assert_eq!(engine.vision_model(), "gemini-2.5-flash");
        let analysis = engine.analyze(&upload())?;
        assert!(analysis.warning.unwrap().contains("GEMINI_API_KEY"));
        Ok(())
    }

    #[test]
    fn all_assets_failing_ends_in_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let executor: Arc<dyn ToolExecutor> = Arc::new(FnExecutor::new(|tool, _| {
            Err(StudioError::tool(tool, "service unavailable"))
        }));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let mut engine = StudioEngine::with_executor(
            temp.path(),
            temp.path().join("events.jsonl"),
            StudioConfig::default(),
            executor,
        )?
        .with_vision(Arc::new(CannedVision(Err("down".to_string()))))
        .with_observer(Arc::new(move |update: &ProgressUpdate| {
            sink.lock().unwrap().push(update.clone());
        }));

        let plan = AspectPlan::parse("4:5=2").map_err(anyhow::Error::msg)?;
        let options = GenerateOptions {
            include_video: false,
            ..GenerateOptions::default()
        };
        let summary = engine.run(&upload(), &plan, options)?;
        assert_eq!(summary.status, PipelineStatus::Error);
        let error = summary.error.unwrap();
        assert!(error.starts_with("no assets were generated (3 failed)"));
        assert!(error.contains("service unavailable"));
        assert_eq!(summary.copy.unwrap().headline, format!("Discover {FALLBACK_BRAND_NAME}"));
        assert_eq!(summary.assets.iter().filter(|a| a.kind == AssetKind::Video).count(), 0);

        let updates = updates.lock().unwrap();
        assert!(updates.contains(&ProgressUpdate::Status {
            from: PipelineStatus::Generating,
            to: PipelineStatus::Error,
            error: Some(error.clone()),
        }));
        let last_progress = updates
            .iter()
            .filter_map(|update| match update {
                ProgressUpdate::Asset { progress, .. } => Some(*progress),
                _ => None,
            })
            .fold(0.0_f64, f64::max);
        assert_eq!(last_progress, 1.0);
        Ok(())
    }

    #[test]
    fn unwritable_event_log_settles_run_in_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let run_dir = temp.path().join("run");
        let events_path = run_dir.join("events.jsonl");
        let mut engine = StudioEngine::with_executor(
            &run_dir,
            &events_path,
            dryrun_config(),
            Arc::new(DryrunToolExecutor::new(Default::default())),
        )?;
        std::fs::remove_file(&events_path)?;
        std::fs::create_dir(&events_path)?;

        let outcome = engine.run(&upload(), &AspectPlan::default(), GenerateOptions::default());
        assert!(outcome.is_err());
        assert_eq!(engine.status(), PipelineStatus::Error);
        assert!(engine.error().is_some());
        assert_eq!(
            engine.history(),
            &[PipelineStatus::Idle, PipelineStatus::Analyzing, PipelineStatus::Error]
        );

        let summary: Value = serde_json::from_str(&std::fs::read_to_string(
            run_dir.join("summary.json"),
        )?)?;
        assert_eq!(summary["status"], json!("error"));
        Ok(())
    }

    #[test]
    fn rejected_upload_ends_in_error_with_summary() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bogus = temp.path().join("notes.txt");
        std::fs::write(&bogus, "not an image")?;
        let mut engine = StudioEngine::with_executor(
            temp.path().join("run"),
            temp.path().join("run/events.jsonl"),
            StudioConfig::default(),
            Arc::new(DryrunToolExecutor::new(Default::default())),
        )?;
        let summary = engine.run_path(&bogus, &AspectPlan::default(), GenerateOptions::default())?;
        assert_eq!(summary.status, PipelineStatus::Error);
        assert!(summary.error.unwrap().starts_with("upload rejected"));
        assert_eq!(summary.total_assets, 0);
        assert_eq!(engine.history(), &[PipelineStatus::Idle, PipelineStatus::Error]);
        assert!(temp.path().join("run/summary.json").exists());
        Ok(())
    }

    #[test]
    fn generate_requires_analysis_first() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut engine = StudioEngine::with_executor(
            temp.path(),
            temp.path().join("events.jsonl"),
            StudioConfig::default(),
            Arc::new(DryrunToolExecutor::new(Default::default())),
        )?;
        let identity = brandkit_contracts::brand::BrandIdentity::fallback();
        assert!(engine
            .generate(&identity, &AspectPlan::default(), GenerateOptions::default())
            .is_err());
        assert_eq!(engine.status(), PipelineStatus::Idle);
        Ok(())
    }
}
