// Shard task entrypoint: processes one slice of the facility work list.

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use collector::{
    assign_items, load_template, parse_work_list, run_shard, ExtractionClient, FileLedger,
    GeminiBackend, HttpFetcher, LocalStore, RateLimitedBackend, RetryPolicy, RunParams, TaskStore,
    TsvSink,
};
use gemini_client::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,collector=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let params = RunParams::from_env().context("Failed to load run parameters")?;
    tracing::info!(
        mode = %params.mode,
        shard = params.shard_index,
        shard_count = params.shard_count,
        data_dir = %params.data_dir.display(),
        "collect task starting"
    );

    let store = LocalStore::new(&params.data_dir);
    let csv = store
        .read_work_list(params.mode)
        .await
        .context("Failed to read work list")?;
    let items = parse_work_list(&csv).context("Failed to parse work list")?;
    let shard_items = assign_items(&items, params.shard_index, params.shard_count)
        .context("Failed to assign shard items")?;

    let api_key = params
        .api_key
        .as_ref()
        .context("GEMINI_API_KEY is not set")?;
    let gemini = GeminiClient::new(api_key.expose_secret()).with_timeout(params.backend_timeout);
    let backend = GeminiBackend::new(gemini, params.model.clone());

    let template = load_template(&store, params.mode)
        .await
        .context("Failed to load extraction template")?;
    let fetcher = HttpFetcher::new(&params);
    let ledger = FileLedger::open(&params.data_dir, params.mode, params.shard_index)
        .context("Failed to open progress ledger")?;
    tracing::info!(ledger = %ledger.path().display(), "progress ledger ready");
    let sink = TsvSink::new(&params.data_dir, params.mode, params.shard_index);

    // Ctrl-C winds down like a deadline: in-flight items finish, the rest
    // stay pending for the next run
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received shutdown signal, finishing in-flight items");
            cancel.cancel();
        });
    }

    let policy = RetryPolicy::from_params(&params);
    let report = match params.backend_rps {
        Some(rps) => {
            let client = ExtractionClient::new(RateLimitedBackend::new(backend, rps), template)
                .with_policy(policy);
            run_shard(shard_items, &fetcher, &client, &ledger, &sink, &params, cancel).await?
        }
        None => {
            let client = ExtractionClient::new(backend, template).with_policy(policy);
            run_shard(shard_items, &fetcher, &client, &ledger, &sink, &params, cancel).await?
        }
    };

    if !report.is_complete() {
        tracing::warn!(
            not_started = report.not_started,
            "stopped before all items were attempted; rerun the task to resume"
        );
    }

    Ok(())
}
