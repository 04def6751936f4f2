//! blueprint - reduce a room video to a JSON blueprint of furniture positions

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use arcplan_blueprint::{
    BackendRegistry, Blueprint, BlueprintConfig, BlueprintEntry, FileOpener, ScriptedBackend,
};
use arcplan_blueprint::ingest::ensure_decoder;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file to scan (or stub://name?frames=N&width=W&height=H).
    video: String,
    /// Config file (JSON, or TOML by extension). Overrides ARCPLAN_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Detection stride: run the detector on every Nth frame.
    #[arg(long)]
    stride: Option<u64>,
    /// Detector backend (scripted|tract).
    #[arg(long)]
    backend: Option<String>,
    /// Detection script for the scripted backend (JSON array of per-call arrays).
    #[arg(long)]
    script: Option<PathBuf>,
    /// ONNX model for the tract backend.
    #[arg(long, env = "ARCPLAN_MODEL_PATH")]
    model: Option<PathBuf>,
    /// Write annotated sampled frames as JPEGs into this directory.
    #[arg(long)]
    annotate_dir: Option<PathBuf>,
    /// Write the blueprint here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
    /// Wrap output as {"message", "blueprint"} like the upload endpoint does.
    #[arg(long)]
    envelope: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    message: &'a str,
    blueprint: &'a [BlueprintEntry],
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a str,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let envelope = args.envelope;
    if let Err(e) = run(args) {
        log::error!("error during video processing: {:#}", e);
        if envelope {
            let body = ErrorEnvelope {
                error: "Failed during video processing",
            };
            if let Ok(json) = serde_json::to_string(&body) {
                println!("{json}");
            }
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let ui = ui::Ui::new(
        ui::UiMode::parse(&args.ui),
        std::io::stderr().is_terminal(),
        std::io::stdout().is_terminal(),
    );

    let mut cfg = match &args.config {
        Some(path) => BlueprintConfig::load_from(path)?,
        None => BlueprintConfig::load()?,
    };
    if let Some(stride) = args.stride {
        cfg.stride = stride;
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(script) = &args.script {
        cfg.detector.script_path = Some(script.clone());
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }

    let scanner = cfg.scanner()?;
    ensure_decoder(&args.video)?;

    let registry = {
        let _stage = ui.stage("load detector");
        build_registry(&cfg)?
    };
    let backend = registry.resolve(Some(cfg.detector.backend.as_str()))?;
    let mut detector = backend
        .lock()
        .map_err(|_| anyhow!("detector backend lock poisoned"))?;
    detector.warm_up().context("detector warm-up failed")?;

    let blueprint: Blueprint = {
        let mut stage = ui.stage(&format!("scan {}", args.video));
        let result = match &args.annotate_dir {
            Some(dir) => scan_annotated(&scanner, &args.video, &mut *detector, dir),
            None => scanner.scan(&args.video, &FileOpener, &mut *detector),
        };
        if result.is_err() {
            stage.fail();
        }
        result?
    };

    if !blueprint.stats.source_opened {
        log::warn!("video {} could not be opened; blueprint is empty", args.video);
    }

    let json = render(&blueprint, args.envelope, args.pretty)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("blueprint written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

fn build_registry(cfg: &BlueprintConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();

    let scripted = match &cfg.detector.script_path {
        Some(path) => ScriptedBackend::from_json_path(path)?,
        None => ScriptedBackend::empty(),
    };
    registry.register(scripted);

    register_tract(&mut registry, cfg)?;

    if registry.get(&cfg.detector.backend).is_none() && cfg.detector.backend == "tract" {
        return Err(anyhow!(
            "tract backend needs --model and a build with the backend-tract feature"
        ));
    }

    log::debug!("detector backends: {}", registry.list().join(", "));
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, cfg: &BlueprintConfig) -> Result<()> {
    let Some(model_path) = &cfg.detector.model_path else {
        return Ok(());
    };
    let settings = arcplan_blueprint::TractSettings {
        input_width: cfg.detector.input_width,
        input_height: cfg.detector.input_height,
        confidence_threshold: cfg.detector.confidence_threshold,
        iou_threshold: cfg.detector.iou_threshold,
        ..Default::default()
    };
    registry.register(arcplan_blueprint::TractBackend::new(model_path, settings)?);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, cfg: &BlueprintConfig) -> Result<()> {
    if cfg.detector.model_path.is_some() {
        log::warn!("model path ignored: built without the backend-tract feature");
    }
    Ok(())
}

#[cfg(feature = "annotate")]
fn scan_annotated(
    scanner: &arcplan_blueprint::VideoScanner,
    video: &str,
    detector: &mut dyn arcplan_blueprint::DetectorBackend,
    dir: &std::path::Path,
) -> Result<Blueprint> {
    let mut sink = arcplan_blueprint::JpegDirSink::create(dir)?;
    scanner.scan_with_sink(video, &FileOpener, detector, &mut sink)
}

#[cfg(not(feature = "annotate"))]
fn scan_annotated(
    _scanner: &arcplan_blueprint::VideoScanner,
    _video: &str,
    _detector: &mut dyn arcplan_blueprint::DetectorBackend,
    _dir: &std::path::Path,
) -> Result<Blueprint> {
    Err(anyhow!("--annotate-dir requires the annotate feature"))
}

fn render(blueprint: &Blueprint, envelope: bool, pretty: bool) -> Result<String> {
    let json = match (envelope, pretty) {
        (true, pretty) => {
            let body = Envelope {
                message: "File processed successfully",
                blueprint: blueprint.entries(),
            };
            if pretty {
                serde_json::to_string_pretty(&body)?
            } else {
                serde_json::to_string(&body)?
            }
        }
        (false, true) => serde_json::to_string_pretty(blueprint.entries())?,
        (false, false) => serde_json::to_string(blueprint.entries())?,
    };
    Ok(json)
}
