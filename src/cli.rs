use crate::{
    classifier::{http::HttpClassifier, ClassificationRequest, Classifier},
    config::Config,
    dataset,
    pipeline::{Pipeline, PipelineEvent, RunOutcome, Source},
    report::{DerivedStats, HistoryEntry},
    store::{DirStore, KeyValueStore, ResultStore},
    util::{ensure_dir, hash_file, millis_to_rfc3339},
    view::{
        self,
        rows::{ExplorerField, ExplorerRow, HistoryField, ResultField},
        Query, SortDirection, SortState, StatusFilter, ViewRow,
    },
};
use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "tx-sentry")]
#[command(about = "Batch fraud classification and exploration for blockchain account datasets")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./tx-sentry.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify every row of a CSV dataset and store the result set.
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Name for the stored result set; defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Classify a single account and add it to the prediction history.
    Predict {
        #[arg(long)]
        address: String,
        /// Feature value as key=value, e.g. --set sent_tnx=12. Unset features are 0.
        #[arg(long = "set", value_parser = parse_feature)]
        features: Vec<(String, f64)>,
    },
    /// Browse a raw dataset without classifying it.
    Explore {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum)]
        sort: Option<ExplorerField>,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Manage stored result sets.
    Results {
        #[command(subcommand)]
        cmd: ResultsCommand,
    },
    /// Manage the single-prediction history.
    History {
        #[command(subcommand)]
        cmd: HistoryCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResultsCommand {
    List {},
    Show {
        #[arg(long)]
        id: Uuid,
        #[arg(long, value_enum)]
        sort: Option<ResultField>,
        #[command(flatten)]
        view: ViewArgs,
    },
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    Clear {},
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    List {
        #[arg(long, value_enum)]
        sort: Option<HistoryField>,
        #[command(flatten)]
        view: ViewArgs,
    },
    Remove {
        /// Timestamp (unix ms) of the entry to drop.
        #[arg(long)]
        timestamp: i64,
    },
    Clear {},
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ViewArgs {
    /// all, fraudulent (1) or legitimate (0).
    #[arg(long, default_value = "all")]
    pub status: String,
    #[arg(long, default_value = "")]
    pub search: String,
    #[arg(long, value_enum, default_value_t = SortDirection::Asc)]
    pub order: SortDirection,
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long)]
    pub page_size: Option<usize>,
}

pub async fn dispatch(args: Args) -> Result<()> {
    let mut cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    cfg.apply_env();

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Analyze { input, name } => analyze(&cfg, input, name.as_deref()).await,
        Command::Predict { address, features } => predict(&cfg, address, features).await,
        Command::Explore { input, sort, view } => explore(&cfg, input, *sort, view),
        Command::Results { cmd } => results(&cfg, cmd),
        Command::History { cmd } => history(&cfg, cmd),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["tx-sentry.toml", "tx-sentry.example.toml"]
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

    // stdout carries command output; logs go to stderr.
    let console_layer = if cfg.logging.json {
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

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
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
        .with(console_layer)
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

    Some(PathBuf::from(&cfg.store.dir).join("tx-sentry.log"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(cfg: &Config) -> ResultStore<DirStore> {
    ResultStore::new(DirStore::from_config(cfg))
}

async fn analyze(cfg: &Config, input: &Path, name: Option<&str>) -> Result<()> {
    let records = dataset::load(cfg, input)
        .with_context(|| format!("loading dataset: {}", input.display()))?;
    let digest = hash_file(input).with_context(|| format!("hashing input: {}", input.display()))?;

    let source = Source {
        name: name
            .map(str::to_string)
            .or_else(|| input.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| input.display().to_string()),
        digest: Some(digest),
    };

    let classifier = HttpClassifier::new(cfg)?;
    info!(endpoint = classifier.endpoint(), rows = records.len(), "starting analysis");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(cfg, classifier, open_store(cfg)).with_events(tx);
    let every = cfg.pipeline.progress_log_every.max(1);

    let run = pipeline.run(&source, &records);
    tokio::pin!(run);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let outcome = loop {
        tokio::select! {
            out = &mut run => break out,
            Some(event) = rx.recv() => log_progress(&event, every),
            res = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if res.is_ok() {
                    warn!("interrupt received; stopping after the current row");
                    pipeline.cancel();
                }
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        log_progress(&event, every);
    }

    match outcome.with_context(|| format!("analyzing {}", input.display()))? {
        RunOutcome::Completed { result, persisted } => {
            if !persisted {
                warn!("result set could not be stored and will not survive this process");
            }
            print_json(&serde_json::json!({
                "status": "completed",
                "id": result.id,
                "name": result.name,
                "created": millis_to_rfc3339(result.created_at),
                "stats": result.stats,
                "persisted": persisted,
            }))
        }
        RunOutcome::Cancelled { processed, total } => print_json(&serde_json::json!({
            "status": "cancelled",
            "processed": processed,
            "total": total,
        })),
    }
}

fn log_progress(event: &PipelineEvent, every: usize) {
    match event {
        PipelineEvent::Started { total } => info!(total, "processing data"),
        PipelineEvent::Progress { processed, total } => {
            if processed % every == 0 || processed == total {
                info!("processed {processed} of {total}");
            }
        }
        _ => {}
    }
}

async fn predict(cfg: &Config, address: &str, features: &[(String, f64)]) -> Result<()> {
    let classifier = HttpClassifier::new(cfg)?;
    let entry = record_prediction(&classifier, &open_store(cfg), address, features).await?;
    print_json(&entry)
}

/// Scores one manually entered account and prepends it to the history. A history write
/// failure is logged, not returned.
async fn record_prediction<C: Classifier, K: KeyValueStore>(
    classifier: &C,
    store: &ResultStore<K>,
    address: &str,
    features: &[(String, f64)],
) -> Result<HistoryEntry> {
    let mut req = ClassificationRequest::default();
    for (key, value) in features {
        req.set(key, *value)?;
    }

    let result = classifier
        .score(&req, &CancellationToken::new())
        .await
        .with_context(|| format!("classifying {address}"))?;

    let entry = HistoryEntry::new(address, req, result);
    if let Err(err) = store.append_history(&entry) {
        warn!("prediction not saved to history: {err}");
    }
    Ok(entry)
}

fn explore(cfg: &Config, input: &Path, sort: Option<ExplorerField>, args: &ViewArgs) -> Result<()> {
    let records = dataset::load(cfg, input)
        .with_context(|| format!("loading dataset: {}", input.display()))?;
    let stats = DerivedStats::from_records(&records);
    let rows = ExplorerRow::from_records(&records);
    let query = build_query(cfg, args, sort);

    print_json(&serde_json::json!({
        "input": input,
        "stats": stats,
        "legitimate": stats.legitimate(),
        "view": render(&rows, query)?,
    }))
}

fn results(cfg: &Config, cmd: &ResultsCommand) -> Result<()> {
    let store = open_store(cfg);
    match cmd {
        ResultsCommand::List {} => {
            let sets = store.list()?;
            let summaries: Vec<_> = sets
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "summary": s.summary(),
                        "created": millis_to_rfc3339(s.created_at),
                    })
                })
                .collect();
            print_json(&summaries)
        }
        ResultsCommand::Show { id, sort, view } => {
            let set = store
                .get(*id)?
                .ok_or_else(|| anyhow!("no result set with id {id}"))?;
            let query = build_query(cfg, view, *sort);
            print_json(&serde_json::json!({
                "summary": set.summary(),
                "created": millis_to_rfc3339(set.created_at),
                "legitimate": set.stats.legitimate(),
                "source_digest": set.source_digest,
                "view": render(&set.rows, query)?,
            }))
        }
        ResultsCommand::Delete { id } => {
            let deleted = store.delete(*id)?;
            if !deleted {
                warn!("no result set with id {id}");
            }
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        }
        ResultsCommand::Clear {} => {
            store.clear()?;
            print_json(&serde_json::json!({ "cleared": "results" }))
        }
    }
}

fn history(cfg: &Config, cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(cfg);
    match cmd {
        HistoryCommand::List { sort, view } => {
            let entries = store.history()?;
            let query = build_query(cfg, view, *sort);
            print_json(&render(&entries, query)?)
        }
        HistoryCommand::Remove { timestamp } => {
            let removed = store.remove_history(*timestamp)?;
            print_json(&serde_json::json!({ "timestamp": timestamp, "removed": removed }))
        }
        HistoryCommand::Clear {} => {
            store.clear_history()?;
            print_json(&serde_json::json!({ "cleared": "history" }))
        }
    }
}

fn build_query<F: Copy + PartialEq>(cfg: &Config, args: &ViewArgs, sort: Option<F>) -> Query<F> {
    let mut query = Query::new(args.page_size.unwrap_or(cfg.view.page_size));
    query.status = args.status.parse::<StatusFilter>().unwrap_or_default();
    query.search = args.search.clone();
    query.sort = sort
        .map(|field| SortState::by(field, args.order))
        .unwrap_or_default();
    query.page = args.page;
    query
}

/// Clamps the page the way the table controls do, then renders it.
fn render<T: ViewRow + Serialize>(rows: &[T], mut query: Query<T::Field>) -> Result<serde_json::Value> {
    let matching = view::select(rows, &query).len();
    query.page = view::clamp_page(query.page, view::total_pages(matching, query.page_size));
    let page = view::view(rows, &query);
    Ok(serde_json::to_value(&page)?)
}

fn parse_feature(raw: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {key}: {e}"))?;
    Ok((key.trim().to_string(), value))
}
