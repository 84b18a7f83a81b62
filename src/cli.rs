use crate::{
    config::Config,
    extract::{self, ExtractedContent},
    model::{gemini::GeminiClient, Structurer},
    pipeline::{empty_run_guidance, save_batch, Pipeline},
    renderer::pdfium::PdfiumRenderer,
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "facturia")]
#[command(about = "Invoice line-item extractor (PDF text/render + LLM structuring + SQLite ledger)")]
pub struct Args {
    /// Defaults to `run`.
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Path to config TOML. If omitted, uses ./facturia.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan the input folder, structure every invoice and append the rows to the database.
    Run {},
    /// Show whether a document goes to the model as text or as a rendered page.
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Check the API key and list the models that can generate content.
    Doctor {},
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    load_env_file(&cfg);

    match args.cmd.clone().unwrap_or(Command::Run {}) {
        Command::Run {} => run(&cfg),
        Command::Classify { input } => classify(&cfg, &input),
        Command::Doctor {} => doctor(&cfg),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["facturia.toml", "facturia.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("facturia.log"))
}

fn load_env_file(cfg: &Config) {
    match dotenvy::from_filename(&cfg.paths.env_file) {
        Ok(path) => debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("no env file at {}", cfg.paths.env_file),
        Err(e) => warn!("could not load {}: {e}", cfg.paths.env_file),
    }
}

fn api_key(cfg: &Config) -> String {
    std::env::var(&cfg.model.api_key_env).unwrap_or_default()
}

fn client(cfg: &Config) -> Result<GeminiClient> {
    GeminiClient::new(cfg, api_key(cfg)).map_err(|e| {
        anyhow!(
            "{e}: set {} in {} or in the environment",
            cfg.model.api_key_env,
            cfg.paths.env_file
        )
    })
}

fn run(cfg: &Config) -> Result<()> {
    let renderer = PdfiumRenderer::new()?;
    let structurer = client(cfg)?;
    info!("structuring invoices with model {}", structurer.model());
    let pipeline = Pipeline::new(cfg, renderer, structurer);

    let output = pipeline.run()?;
    let report = output.report;

    if !cfg.paths.report_path.is_empty() {
        let path = Path::new(&cfg.paths.report_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing report: {}", path.display()))?;
    }

    if output.batch.is_empty() {
        for line in empty_run_guidance(cfg, &report) {
            warn!("{line}");
        }
        print_summary(cfg, &report.totals, 0, 0, None)?;
        return Ok(());
    }

    let saved = save_batch(cfg, output.batch)?;
    if saved.converted > 0 {
        info!(
            "converted {} '{}' amounts at rate {}",
            saved.converted, cfg.currency.source, cfg.currency.rate
        );
    }
    let persisted = saved.persisted;

    info!(
        "saved {} invoice rows to {} (table {} now holds {})",
        persisted, cfg.paths.database, cfg.paths.table, saved.table_rows
    );
    print_summary(
        cfg,
        &report.totals,
        saved.converted,
        persisted,
        Some(saved.table_rows),
    )
}

fn print_summary(
    cfg: &Config,
    totals: &crate::report::RunTotals,
    converted: usize,
    persisted: usize,
    table_rows: Option<u64>,
) -> Result<()> {
    if cfg.global.print_summary {
        let status = if persisted > 0 { "ok" } else { "empty" };
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "totals": totals,
                "converted": converted,
                "persisted": persisted,
                "database": cfg.paths.database,
                "table": cfg.paths.table,
                "table_rows": table_rows,
                "status": status,
            }))?
        );
    }
    Ok(())
}

fn classify(cfg: &Config, input: &Path) -> Result<()> {
    let renderer = PdfiumRenderer::new()?;
    let extraction = extract::extract_document(cfg, &renderer, input)?;
    let image = match &extraction.content {
        ExtractedContent::Image(img) => Some(serde_json::json!({
            "width": img.width,
            "height": img.height,
            "png_bytes": img.png.len(),
        })),
        ExtractedContent::Text(_) => None,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "pages": extraction.page_count,
            "text_chars": extraction.text_chars,
            "min_text_chars": cfg.extraction.min_text_chars,
            "content": extraction.content.kind(),
            "image": image,
        }))?
    );
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let key_present = !api_key(cfg).trim().is_empty();
    let listing = client(cfg).and_then(|c| c.list_models().map_err(|e| anyhow!(e)));

    let diag = match listing {
        Ok(models) => {
            let usable: Vec<&str> = models
                .iter()
                .filter(|m| m.supports_generate_content())
                .map(|m| m.id())
                .collect();
            let available = usable.contains(&cfg.model.model.as_str());
            serde_json::json!({
                "api_key_env": cfg.model.api_key_env,
                "api_key_present": key_present,
                "model": cfg.model.model,
                "model_available": available,
                "models": usable,
                "ok": available,
            })
        }
        Err(e) => serde_json::json!({
            "api_key_env": cfg.model.api_key_env,
            "api_key_present": key_present,
            "model": cfg.model.model,
            "ok": false,
            "error": format!("{e:#}"),
        }),
    };

    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}
