use crate::{
    config::Config,
    fsutil::{ensure_dir, guess_ext},
    locator::BackendLocator,
    pipeline::Pipeline,
    registry,
    settings::{self, BackendConfig, BackendKind},
};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "office-bridge")]
#[command(about = "Convert PDF / DOCX / PPT / PPTX through an installed office suite")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./office-bridge.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert one file; formats come from the file extensions.
    Convert {
        #[arg(long)]
        input: PathBuf,
        /// Destination file. Defaults to the input path with the --to extension.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Target format (pdf, docx).
        #[arg(long)]
        to: Option<String>,
    },
    /// List reachable target formats.
    Targets {
        #[arg(long)]
        from: Option<String>,
    },
    /// Inspect or change the configured conversion backend.
    Backend {
        #[command(subcommand)]
        action: BackendCommand,
    },
    Doctor {},
}

#[derive(Subcommand, Debug)]
pub enum BackendCommand {
    Show {},
    /// Record the executable to convert with (soffice or winword).
    Set {
        path: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    HeadlessTool,
    DocumentEditor,
}

impl From<KindArg> for BackendKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::HeadlessTool => BackendKind::HeadlessTool,
            KindArg::DocumentEditor => BackendKind::DocumentEditor,
        }
    }
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Convert { input, output, to } => {
            convert(&cfg, input, output.as_deref(), to.as_deref())
        }
        Command::Targets { from } => targets(from.as_deref()),
        Command::Backend { action } => match action {
            BackendCommand::Show {} => backend_show(&cfg),
            BackendCommand::Set { path, kind } => backend_set(&cfg, path, *kind),
        },
        Command::Doctor {} => doctor(&cfg),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("office-bridge.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = match resolve_log_path(cfg) {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            ensure_dir(parent).with_context(|| format!("create log dir: {}", parent.display()))?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
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
        return Some(crate::config::expand_tilde(&cfg.logging.file_path));
    }
    cfg.backend_record_path()
        .parent()
        .map(|dir| dir.join("office-bridge.log"))
}

fn convert(cfg: &Config, input: &Path, output: Option<&Path>, to: Option<&str>) -> Result<()> {
    let output = plan_output(input, output, to)?;
    let pipeline = Pipeline::new(cfg);
    let report = pipeline
        .convert_file(input, &output)
        .map_err(|e| anyhow!("{:?}: {e}", e.kind()))?;

    if cfg.output.print_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Works out the destination path and rejects requests the registry can't
/// serve, naming what the source format does support.
pub fn plan_output(input: &Path, output: Option<&Path>, to: Option<&str>) -> Result<PathBuf> {
    let src = guess_ext(input);
    let to = to.map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase());

    let dst = match (output, to) {
        (Some(out), Some(to)) => {
            let ext = guess_ext(out);
            if ext != to {
                bail!("--output {} does not end in .{to}", out.display());
            }
            ext
        }
        (Some(out), None) => guess_ext(out),
        (None, Some(to)) => to,
        (None, None) => bail!("either --output or --to is required"),
    };

    if dst == src {
        bail!("source and target are the same type: {src}");
    }

    let targets = registry::available_targets_for(&src);
    if !targets.iter().any(|f| f.ext() == dst) {
        let list: Vec<&str> = targets.iter().map(|f| f.ext()).collect();
        let list = if list.is_empty() {
            "-".to_string()
        } else {
            list.join(", ")
        };
        bail!("unsupported conversion; this build supports: {src} -> {list}");
    }

    Ok(output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(&dst)))
}

fn targets(from: Option<&str>) -> Result<()> {
    let value = match from {
        Some(src) => serde_json::json!({
            "from": src.trim().to_ascii_lowercase(),
            "targets": registry::available_targets_for(src),
        }),
        None => serde_json::json!({
            "conversions": registry::supported_keys(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn backend_show(cfg: &Config) -> Result<()> {
    let locator = BackendLocator::new(cfg.backend_record_path());
    let backend = locator
        .locate()
        .map_err(|e| anyhow!("{:?}: {e}", e.kind()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "record": locator.record_path(),
            "backend": backend,
        }))?
    );
    Ok(())
}

fn backend_set(cfg: &Config, raw: &str, kind: Option<KindArg>) -> Result<()> {
    let path = settings::normalize_candidate(raw);
    settings::validate_candidate(&path)?;

    let kind = match kind {
        Some(k) => k.into(),
        None => BackendKind::infer(&path).ok_or_else(|| {
            anyhow!(
                "cannot tell what kind of backend {} is; pass --kind",
                path.display()
            )
        })?,
    };

    let record = cfg.backend_record_path();
    let backend = BackendConfig {
        api_path: path,
        kind,
    };
    settings::save(&record, &backend)
        .with_context(|| format!("saving backend record {}", record.display()))?;
    info!("backend set: {} ({kind})", backend.api_path.display());
    println!("{}", record.display());
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let locator = BackendLocator::new(cfg.backend_record_path());
    let backend = match locator.locate() {
        Ok(b) => serde_json::json!({
            "configured": true,
            "kind": b.kind,
            "path": b.api_path,
            "exists": b.api_path.is_file(),
        }),
        Err(e) => serde_json::json!({
            "configured": false,
            "error": e.to_string(),
        }),
    };

    let diag = serde_json::json!({
        "record": locator.record_path(),
        "backend": backend,
        "automation": {
            "powershell_exe": cfg.automation.powershell_exe,
            "word_visible": cfg.automation.word_visible,
            "powerpoint_visible": cfg.automation.powerpoint_visible,
        },
        "pdf2docx": {
            "python_exe": cfg.pdf2docx.python_exe,
        },
        "scratch_root": cfg.scratch_root(),
        "conversions": registry::supported_keys(),
    });
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}
