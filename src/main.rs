//! Enrichment pipeline — binary entrypoint.
//! Wires the HTTP source, the CSV intermediate store and the Redis cache into the
//! fetch and refresh pipelines. `--dry-run` swaps both stores for a `MemoryStore`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use enrichment_pipeline::config::PipelineConfig;
use enrichment_pipeline::pipeline::types::RecordGetter;
use enrichment_pipeline::providers::HttpApi;
use enrichment_pipeline::store::{CsvStore, MemoryStore, RedisCache};
use enrichment_pipeline::{logging, metrics, ExecContext, Fetcher, KeyRange, Refresher};

#[derive(Parser)]
#[command(
    name = "enrichment-pipeline",
    version,
    about = "Fetch records in parallel, enrich them and persist them in batches"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Pipeline config file (TOML or JSON); falls back to the default lookup
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a key range from the remote API into the CSV store
    Fetch {
        /// First key (inclusive)
        #[arg(long)]
        from: Option<i64>,
        /// Last key (inclusive)
        #[arg(long)]
        to: Option<i64>,
        /// Keep fetched records in memory, enrich them there and print the result
        #[arg(long)]
        dry_run: bool,
    },
    /// Enrich the CSV store and save it to the cache in batches
    Refresh {
        /// Save batches in memory and print them instead of writing to Redis
        #[arg(long)]
        dry_run: bool,
    },
    /// Print cached records as JSON
    List,
}

/// Context cancelled on Ctrl-C.
fn interruptible(ctx: ExecContext) -> ExecContext {
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            token.cancel();
        }
    });
    ctx
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let cfg = match &cli.config {
        Some(path) => PipelineConfig::load_from(path)?.with_env_overrides()?,
        None => PipelineConfig::load_default()?,
    };
    if let Some(addr) = metrics::init_from_env()? {
        info!(%addr, "prometheus exporter listening");
    }

    match cli.command {
        Commands::Fetch { from, to, dry_run } => {
            let range = KeyRange::new(
                from.unwrap_or(cfg.default_from),
                to.unwrap_or(cfg.default_to),
            );
            let api = Arc::new(HttpApi::new(&cfg.api_base_url, cfg.request_timeout())?);
            let ctx = interruptible(ExecContext::with_timeout(cfg.fetch_timeout()));
            if dry_run {
                return dry_run_fetch(&cfg, api, &ctx, range).await;
            }
            let fetcher = Fetcher::new(api, CsvStore::new(&cfg.csv_path))
                .with_max_in_flight(cfg.max_in_flight);
            fetcher.fetch(&ctx, range).await
        }
        Commands::Refresh { dry_run } => {
            let api = Arc::new(HttpApi::new(&cfg.api_base_url, cfg.request_timeout())?);
            let ctx = interruptible(ExecContext::new());
            if dry_run {
                let store = Arc::new(MemoryStore::new());
                Refresher::new(CsvStore::new(&cfg.csv_path), Arc::clone(&store), api)
                    .with_workers(cfg.workers)
                    .with_batch_size(cfg.batch_size)
                    .refresh(&ctx)
                    .await?;
                return print_records(store.as_ref()).await;
            }
            let refresher = Refresher::new(
                CsvStore::new(&cfg.csv_path),
                RedisCache::new(&cfg.redis_url, &cfg.cache_key)?,
                api,
            )
            .with_workers(cfg.workers)
            .with_batch_size(cfg.batch_size);
            refresher.refresh(&ctx).await
        }
        Commands::List => {
            let cache = RedisCache::new(&cfg.redis_url, &cfg.cache_key)?;
            print_records(&cache).await
        }
    }
}

/// Fetch into memory, then refresh from that same store; neither the CSV file nor
/// Redis is touched.
async fn dry_run_fetch(
    cfg: &PipelineConfig,
    api: Arc<HttpApi>,
    ctx: &ExecContext,
    range: KeyRange,
) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    Fetcher::new(Arc::clone(&api), Arc::clone(&store))
        .with_max_in_flight(cfg.max_in_flight)
        .fetch(ctx, range)
        .await?;
    let fetched = store.written().last().map_or(0, Vec::len);
    info!(fetched, "dry run: fetched into memory");

    Refresher::new(Arc::clone(&store), Arc::clone(&store), api)
        .with_workers(cfg.workers)
        .with_batch_size(cfg.batch_size)
        .refresh(ctx)
        .await?;
    print_records(store.as_ref()).await
}

async fn print_records(getter: &impl RecordGetter) -> Result<()> {
    let records = getter.records().await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
