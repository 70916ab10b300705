mod display;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use onboard_pipeline::{
    PipelineConfig, PrefillOrchestrator, PrefillRequest, ReconcileOutcome, ReconcileRequest,
    ReconcileService,
};
use tracing_subscriber::EnvFilter;

/// Legacy BRD reconciliation and prefill.
#[derive(Debug, Parser)]
#[command(name = "onboard", version)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// JSON pipeline config; flags and env vars override it.
    #[arg(long, global = true, env = "ONBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Database file for catalogs, legacy records, and site snapshots.
    #[arg(long, global = true, env = "ONBOARD_DB")]
    db: Option<PathBuf>,

    /// Directory relative blob paths resolve against.
    #[arg(long, global = true, env = "ONBOARD_BLOB_ROOT", default_value = ".")]
    blob_root: PathBuf,

    #[arg(long, global = true, env = "ONBOARD_FORM_URL")]
    form_url: Option<String>,

    #[arg(long, global = true, env = "ONBOARD_PREFILL_URL")]
    prefill_url: Option<String>,

    /// Remote semantic matcher. Takes precedence over the local vector matcher.
    #[arg(long, global = true, env = "ONBOARD_MATCHER_URL")]
    matcher_url: Option<String>,

    /// Embedding service used by the local vector matcher.
    #[arg(long, global = true, env = "ONBOARD_EMBED_URL")]
    embed_url: Option<String>,

    /// JSON array of BRD field targets for the local vector matcher.
    #[arg(long, global = true, env = "ONBOARD_FIELDS")]
    fields: Option<PathBuf>,

    #[arg(long, global = true, env = "ONBOARD_SITE_CONCURRENCY")]
    site_concurrency: Option<usize>,

    #[arg(long, global = true, env = "ONBOARD_MATCH_THRESHOLD")]
    match_threshold: Option<f32>,

    #[arg(long, global = true, env = "ONBOARD_HTTP_TIMEOUT_SECS", default_value_t = 60)]
    http_timeout_secs: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile a legacy rule export and write the combined artifact.
    Reconcile {
        /// Rule export: a path, file:// URI, or http(s) URL.
        #[arg(long)]
        rules: String,
        /// Standard-data baseline used when no catalog is stored yet.
        #[arg(long)]
        standard: Option<String>,
        #[arg(long)]
        catalog_key: Option<String>,
        /// Artifact destination; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Re-run reconciliation for a BRD's stored legacy upload.
    Convert {
        #[arg(long)]
        brd_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Prefill a BRD form and its legacy sites. Exits 2 on partial failure.
    Prefill {
        #[arg(long)]
        brd_id: String,
        /// Source document name; repeatable.
        #[arg(long = "doc", required = true)]
        docs: Vec<String>,
    },
    /// Print a JSON file with empty branches pruned.
    Clean { file: PathBuf },
}

impl GlobalOpts {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(n) = self.site_concurrency {
            config.site_concurrency = n;
        }
        if let Some(t) = self.match_threshold {
            config.match_threshold = t;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("onboard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Reconcile {
            rules,
            standard,
            catalog_key,
            out,
        } => {
            let service = reconcile_service(&cli.opts)?;
            let req = ReconcileRequest {
                rules_uri: rules,
                catalog_key,
                standard_uri: standard,
            };
            let outcome = service
                .reconcile(&req)
                .await
                .with_context(|| format!("reconciling {}", req.rules_uri))?;
            emit(&outcome, out.as_deref())?;
        }
        Command::Convert { brd_id, out } => {
            let service = reconcile_service(&cli.opts)?;
            let outcome = service
                .convert_legacy(&brd_id)
                .await
                .with_context(|| format!("converting legacy BRD {brd_id}"))?;
            emit(&outcome, out.as_deref())?;
        }
        Command::Prefill { brd_id, docs } => {
            let config = cli.opts.pipeline_config()?;
            let stores = wiring::open_stores(cli.opts.db.as_deref())?;
            let timeout = wiring::timeout(&cli.opts);
            let orchestrator = PrefillOrchestrator::new(
                wiring::form_service(cli.opts.form_url.as_deref(), timeout)?,
                wiring::prefill_generator(cli.opts.prefill_url.as_deref(), timeout)?,
                stores.sites,
                stores.legacy,
                &config,
            );
            let ok = orchestrator
                .prefill(&PrefillRequest::new(brd_id.clone(), docs))
                .await
                .with_context(|| format!("prefilling BRD {brd_id}"))?;
            println!("{ok}");
            if !ok {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Clean { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree: serde_json::Value =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&onboard_core::clean(&tree))?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn reconcile_service(opts: &GlobalOpts) -> anyhow::Result<ReconcileService> {
    let config = opts.pipeline_config()?;
    let stores = wiring::open_stores(opts.db.as_deref())?;
    let matcher = wiring::matcher(opts, &config)?;
    Ok(ReconcileService::new(
        wiring::blob_source(&opts.blob_root),
        matcher,
        stores.catalogs,
        stores.legacy,
        config,
    ))
}

fn emit(outcome: &ReconcileOutcome, out: Option<&std::path::Path>) -> anyhow::Result<()> {
    display::print_summary(outcome);
    match out {
        Some(path) => {
            std::fs::write(path, &outcome.artifact)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("  Wrote {} bytes to {}", outcome.artifact.len(), path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&outcome.artifact)),
    }
    Ok(())
}
