use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use brandkit_contracts::aspect::{AspectPlan, AspectRatio};
use brandkit_contracts::assets::AssetStatus;
use brandkit_contracts::brand::BrandIdentity;
use brandkit_contracts::prompts::{image_prompt, video_prompt};
use brandkit_contracts::runs::summary::CampaignSummary;
use brandkit_contracts::status::PipelineStatus;
use brandkit_engine::{
    default_backends, BrandUpload, GenerateOptions, ProgressUpdate, StudioConfig, StudioEngine,
};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "brandkit",
    version,
    about = "Turn one brand image into a campaign of images, a video and ad copy"
)]
struct Cli {
    /// Log engine activity to stderr (same as RUST_LOG=debug for brandkit crates).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Infer the brand identity from an image and print it as JSON.
    /// Only events are recorded; no summary is written for an analysis alone.
    Analyze(AnalyzeArgs),
    /// Run the full pipeline: analysis, asset batch, copy.
    Generate(GenerateArgs),
    /// Print the asset fan-out for a ratio plan without calling any service.
    Plan(PlanArgs),
}

#[derive(Debug, Args)]
struct BackendArgs {
    /// Use the offline backend; no keys or network needed.
    #[arg(long)]
    dryrun: bool,
    /// Tool backend name (`http` or `dryrun`); defaults to BRANDKIT_BACKEND.
    #[arg(long, conflicts_with = "dryrun")]
    backend: Option<String>,
    #[arg(long)]
    vision_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    video_model: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, env = "BRANDKIT_OUT_DIR", default_value = "brandkit-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, env = "BRANDKIT_OUT_DIR", default_value = "brandkit-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Images per aspect ratio, e.g. `1:1=2,9:16,16:9`.
    #[arg(long, value_parser = AspectPlan::parse)]
    ratios: Option<AspectPlan>,
    #[arg(long)]
    no_video: bool,
    #[arg(long, default_value = "16:9")]
    video_ratio: AspectRatio,
    #[arg(long)]
    no_copy: bool,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Args)]
struct PlanArgs {
    #[arg(long, value_parser = AspectPlan::parse)]
    ratios: Option<AspectPlan>,
    #[arg(long)]
    no_video: bool,
    #[arg(long, default_value = "16:9")]
    video_ratio: AspectRatio,
    /// Also print the prompt each asset would be generated from.
    #[arg(long)]
    prompts: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("brandkit error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Generate(args) => run_generate(args),
        Command::Plan(args) => run_plan(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,brandkit_engine={default_level},brandkit_cli={default_level}"
        ))
    });
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn studio_config(args: &BackendArgs) -> StudioConfig {
    let config = apply_overrides(StudioConfig::from_env(), args);
    debug!(
        backend = %config.backend,
        tools_api_base = %config.tools_api_base,
        has_tools_key = config.tools_api_key.is_some(),
        has_gemini_key = config.gemini_api_key.is_some(),
        "resolved configuration"
    );
    config
}

fn apply_overrides(mut config: StudioConfig, args: &BackendArgs) -> StudioConfig {
    if args.dryrun {
        config.backend = "dryrun".to_string();
    } else if let Some(backend) = args.backend.as_deref() {
        config.backend = backend.trim().to_ascii_lowercase();
    }
    let models = [
        (&mut config.vision_model, &args.vision_model),
        (&mut config.image_model, &args.image_model),
        (&mut config.video_model, &args.video_model),
        (&mut config.text_model, &args.text_model),
    ];
    for (slot, flag) in models {
        if let Some(model) = flag.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            *slot = Some(model.to_string());
        }
    }
    config
}

fn open_engine(out: &Path, events: Option<&Path>, config: StudioConfig) -> Result<StudioEngine> {
    let events_path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out.join("events.jsonl"));
    let backends = default_backends(&config)?;
    StudioEngine::new(out, &events_path, config, &backends)
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let config = studio_config(&args.backend);
    let upload = BrandUpload::from_path(&args.image, config.max_upload_bytes)
        .with_context(|| format!("cannot use {}", args.image.display()))?;
    let mut engine = open_engine(&args.out, args.events.as_deref(), config)?;
    let analysis = engine.analyze(&upload)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(0)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = studio_config(&args.backend);
    let plan = args.ratios.clone().unwrap_or_default();
    let options = GenerateOptions {
        include_video: !args.no_video,
        video_ratio: args.video_ratio,
        include_copy: !args.no_copy,
    };
    let mut engine = open_engine(&args.out, args.events.as_deref(), config)?.with_observer(
        Arc::new(|update: &ProgressUpdate| println!("{}", describe_update(update))),
    );
    let summary = engine.run_path(&args.image, &plan, options)?;

    println!();
    print!("{}", results_table(&summary));
    if let Some(copy) = summary.copy.as_ref() {
        println!();
        println!("{}", serde_json::to_string_pretty(copy)?);
    }
    println!();
    println!("Run directory: {}", engine.run_dir().display());
    println!("Events: {}", engine.events_path().display());
    Ok(exit_code(&summary))
}

fn run_plan(args: PlanArgs) -> Result<i32> {
    let plan = args.ratios.clone().unwrap_or_default();
    let identity = BrandIdentity::fallback();
    println!("plan: {plan} ({} images)", plan.total());
    for slot in plan.fan_out() {
        println!(
            "  #{:<2} {:<5} variant {}  {}",
            slot.index + 1,
            slot.aspect_ratio.as_str(),
            slot.variant,
            slot.aspect_ratio.placement()
        );
        if args.prompts {
            println!("      {}", image_prompt(&identity, &slot));
        }
    }
    if !args.no_video {
        if args.video_ratio.is_video_supported() {
            println!("  video {}", args.video_ratio);
            if args.prompts {
                println!("      {}", video_prompt(&identity, args.video_ratio));
            }
        } else {
            println!(
                "  video {} is not supported (use 16:9 or 9:16)",
                args.video_ratio
            );
        }
    }
    println!("  copy");
    Ok(0)
}

fn describe_update(update: &ProgressUpdate) -> String {
    match update {
        ProgressUpdate::Status { from, to, error } => match error {
            Some(message) => format!("status: {from} -> {to} ({message})"),
            None => format!("status: {from} -> {to}"),
        },
        ProgressUpdate::Asset {
            asset_id,
            status,
            progress,
        } => format!(
            "[{:>3.0}%] {asset_id} {}",
            progress * 100.0,
            asset_status_label(*status)
        ),
    }
}

fn asset_status_label(status: AssetStatus) -> &'static str {
    match status {
        AssetStatus::Pending => "pending",
        AssetStatus::Generating => "generating",
        AssetStatus::Completed => "completed",
        AssetStatus::Failed => "failed",
    }
}

fn results_table(summary: &CampaignSummary) -> String {
    let mut out = format!(
        "{:<18} {:<6} {:<5} {:<10} {:>8}  {}\n",
        "ASSET", "KIND", "RATIO", "STATUS", "LATENCY", "RESULT"
    );
    for asset in &summary.assets {
        let ratio = asset
            .aspect_ratio
            .map(|ratio| ratio.to_string())
            .unwrap_or_else(|| "-".to_string());
        let latency = asset
            .latency_s
            .map(|value| format!("{value:.1}s"))
            .unwrap_or_else(|| "-".to_string());
        let result = asset
            .url
            .clone()
            .or_else(|| asset.error.clone())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<18} {:<6} {:<5} {:<10} {:>8}  {}\n",
            asset.asset_id,
            asset.kind.as_str(),
            ratio,
            asset_status_label(asset.status),
            latency,
            result
        ));
    }
    out.push_str(&format!(
        "{} of {} assets completed, {} failed; status {}",
        summary.completed_assets, summary.total_assets, summary.failed_assets, summary.status
    ));
    if let Some(error) = summary.error.as_deref() {
        out.push_str(&format!(" ({error})"));
    }
    out.push('\n');
    out
}

fn exit_code(summary: &CampaignSummary) -> i32 {
    if summary.status == PipelineStatus::Completed {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use brandkit_contracts::aspect::{AspectPlan, AspectRatio};
    use brandkit_contracts::assets::{AssetBoard, AssetRecord, AssetStatus};
    use brandkit_contracts::runs::summary::CampaignSummary;
    use brandkit_contracts::status::PipelineStatus;
    use brandkit_engine::{ProgressUpdate, StudioConfig};
    use clap::Parser;

    use super::{
        apply_overrides, describe_update, exit_code, results_table, run_analyze, AnalyzeArgs,
        BackendArgs, Cli, Command,
    };

    const ONE_PIXEL_PNG: [u8; 69] = [
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0xb8,
        0x90, 0x67, 0x05, 0x00, 0x03, 0x8a, 0x01, 0x79, 0x8d, 0x12, 0x31, 0x28, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn summary(status: PipelineStatus) -> CampaignSummary {
        let plan = AspectPlan::parse("1:1,16:9").unwrap();
        let mut board = AssetBoard::new(
            plan.fan_out()
                .iter()
                .map(|slot| AssetRecord::image(slot, "p"))
                .collect(),
        );
        board
            .get_mut("image-01-1x1-v1")
            .unwrap()
            .complete(Some("https://cdn.example/a.png".to_string()), 2.25);
        board
            .get_mut("image-02-16x9-v1")
            .unwrap()
            .fail("quota exceeded", 0.5);
        let mut summary = CampaignSummary {
            campaign_id: "campaign-1".to_string(),
            started_at: String::new(),
            finished_at: String::new(),
            status,
            error: None,
            plan: plan.to_string(),
            brand: None,
            total_assets: 0,
            completed_assets: 0,
            failed_assets: 0,
            assets: Vec::new(),
            copy: None,
        };
        summary.tally(&board);
        summary
    }

    #[test]
    fn generate_flags_parse_plan_and_video_ratio() {
        let cli = Cli::try_parse_from([
            "brandkit",
            "generate",
            "--image",
            "logo.png",
            "--out",
            "runs/a",
            "--ratios",
            "1:1=2,9:16",
            "--video-ratio",
            "9:16",
            "--dryrun",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.ratios.unwrap().to_string(), "1:1=2,9:16=1");
        assert_eq!(args.video_ratio, AspectRatio::Story);
        assert!(args.backend.dryrun);
        assert!(!args.no_video);
    }

    #[test]
    fn malformed_ratios_and_conflicting_backend_flags_are_rejected() {
        assert!(Cli::try_parse_from(["brandkit", "plan", "--ratios", "1:1=x"]).is_err());
        assert!(Cli::try_parse_from([
            "brandkit", "analyze", "--image", "a.png", "--dryrun", "--backend", "http"
        ])
        .is_err());
    }

    #[test]
    fn flags_override_environment_config() {
        let cli = Cli::try_parse_from([
            "brandkit",
            "analyze",
            "--image",
            "a.png",
            "--backend",
            " DryRun ",
            "--image-model",
            "imagen-4.0-fast-generate-001",
            "--text-model",
            "  ",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let mut base = StudioConfig::default();
        base.text_model = Some("gemini-2.5-pro".to_string());
        let config = apply_overrides(base, &args.backend);
        assert_eq!(config.backend, "dryrun");
        assert_eq!(
            config.image_model.as_deref(),
            Some("imagen-4.0-fast-generate-001")
        );
        assert_eq!(config.text_model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn results_table_lists_every_asset_and_totals() {
        let table = results_table(&summary(PipelineStatus::Completed));
        let lines = table.lines().collect::<Vec<&str>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ASSET"));
        assert!(lines[1].contains("https://cdn.example/a.png"));
        assert!(lines[1].contains("2.2s") || lines[1].contains("2.3s"));
        assert!(lines[2].contains("failed") && lines[2].contains("quota exceeded"));
        assert_eq!(lines[3], "1 of 2 assets completed, 1 failed; status completed");
    }

    #[test]
    fn exit_code_follows_final_status() {
        assert_eq!(exit_code(&summary(PipelineStatus::Completed)), 0);
        assert_eq!(exit_code(&summary(PipelineStatus::Error)), 1);
    }

    #[test]
    fn progress_updates_render_as_single_lines() {
        assert_eq!(
            describe_update(&ProgressUpdate::Status {
                from: PipelineStatus::Generating,
                to: PipelineStatus::Error,
                error: Some("no assets were generated".to_string()),
            }),
            "status: generating -> error (no assets were generated)"
        );
        assert_eq!(
            describe_update(&ProgressUpdate::Asset {
                asset_id: "video-16x9".to_string(),
                status: AssetStatus::Completed,
                progress: 0.5,
            }),
            "[ 50%] video-16x9 completed"
        );
    }

    #[test]
    fn analyze_records_events_without_a_summary() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image = temp.path().join("brand.png");
        std::fs::write(&image, ONE_PIXEL_PNG)?;
        let out = temp.path().join("out");
        let args = AnalyzeArgs {
            image,
            out: out.clone(),
            events: None,
            backend: BackendArgs {
                dryrun: true,
                backend: None,
                vision_model: None,
                image_model: None,
                video_model: None,
                text_model: None,
            },
        };

        assert_eq!(run_analyze(args)?, 0);
        assert!(out.join("events.jsonl").exists());
        assert!(!out.join("summary.json").exists());
        Ok(())
    }
}
