//! Shard runner - drives assigned items through fetch, extract, and write.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ItemError, RunError};
use crate::extract::ExtractionClient;
use crate::stats::{RunStats, ShardReport};
use crate::traits::{ExtractionBackend, Fetcher, ProgressLedger, RecordSink};
use crate::types::{ExtractionResult, ProgressEntry, RunParams, WorkItem};

/// What happened to one assigned item this run.
enum ItemOutcome {
    /// Fetched, extracted, ready to write
    Done(ExtractionResult),

    /// Terminally failed; goes to the ledger, never aborts the shard
    Failed(WorkItem, ItemError),

    /// Deadline arrived before the item started; no ledger entry, a later
    /// run picks it up
    NotStarted,
}

/// Run one shard's items to completion.
///
/// Items already present in the ledger are skipped. The rest run with at
/// most `params.max_concurrency` in flight; each item fetches, extracts,
/// writes its rows, and records a ledger entry. Item-level failures are
/// recorded and counted but never abort the shard. Ledger and sink I/O
/// failures are fatal and propagate immediately.
///
/// When `params.deadline` elapses, no further items start; items already
/// in flight run to completion and the rest are reported as not started.
pub async fn run_shard<F, B, L, S>(
    items: Vec<WorkItem>,
    fetcher: &F,
    client: &ExtractionClient<B>,
    ledger: &L,
    sink: &S,
    params: &RunParams,
    cancel: CancellationToken,
) -> Result<ShardReport, RunError>
where
    F: Fetcher,
    B: ExtractionBackend,
    L: ProgressLedger,
    S: RecordSink,
{
    let assigned = items.len();
    let processed = ledger.processed_set().await?;

    let mut stats = RunStats::new(assigned);
    let mut pending = Vec::with_capacity(assigned);
    for item in items {
        if processed.contains(&item) {
            stats.record_skipped();
        } else {
            pending.push(item);
        }
    }

    info!(
        mode = %params.mode,
        shard = params.shard_index,
        shard_count = params.shard_count,
        assigned,
        already_attempted = assigned - pending.len(),
        to_run = pending.len(),
        "shard starting"
    );

    let deadline_task = params.deadline.map(|deadline| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!(
                deadline_secs = deadline.as_secs(),
                "deadline reached, not starting further items"
            );
            cancel.cancel();
        })
    });

    let futures: Vec<_> = pending
        .into_iter()
        .map(|item| {
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return ItemOutcome::NotStarted;
                }
                match process_item(&item, fetcher, client).await {
                    Ok(result) => ItemOutcome::Done(result),
                    Err(error) => ItemOutcome::Failed(item, error),
                }
            }
        })
        .collect();

    let mut outcomes = stream::iter(futures).buffer_unordered(params.max_concurrency.max(1));
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            ItemOutcome::Done(result) => {
                // Rows land in the sink before the ledger entry: a crash in
                // between re-attempts the item rather than losing its rows
                sink.write(&result.rows).await?;
                ledger.record(&ProgressEntry::success(&result.item)).await?;
                stats.record_success(result.rows.len());
            }
            ItemOutcome::Failed(item, error) => {
                warn!(url = %item.source_url, error = %error, "item failed");
                ledger.record(&ProgressEntry::failure(&item, &error)).await?;
                stats.record_failure(error.failure_kind());
            }
            ItemOutcome::NotStarted => {
                stats.record_not_started();
            }
        }
    }

    if let Some(task) = deadline_task {
        task.abort();
    }

    let report = stats.finish(params.mode, params.shard_index, params.shard_count);
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        not_started = report.not_started,
        rows = report.rows_written,
        elapsed_secs = report.elapsed.as_secs(),
        "shard complete"
    );
    if report.failure_rate() > params.failure_alert_threshold {
        warn!(
            failure_rate_pct = format!("{:.1}", report.failure_rate() * 100.0),
            threshold_pct = format!("{:.1}", params.failure_alert_threshold * 100.0),
            "failure rate above alert threshold"
        );
    }

    Ok(report)
}

async fn process_item<F, B>(
    item: &WorkItem,
    fetcher: &F,
    client: &ExtractionClient<B>,
) -> Result<ExtractionResult, ItemError>
where
    F: Fetcher,
    B: ExtractionBackend,
{
    let content = fetcher.fetch(item).await?;
    let result = client.extract(&content).await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{FailureKind, SinkError};
    use crate::extract::ExtractionTemplate;
    use crate::ledgers::MemoryLedger;
    use crate::sinks::MemorySink;
    use crate::testing::{MockBackend, MockFetcher};
    use crate::types::JobMode;

    const DOCTOR_ROW: &str = "内科\t山田太郎\t部長\t\t\t";

    fn url(n: u32) -> String {
        format!("https://example.com/{n}")
    }

    fn item(n: u32) -> WorkItem {
        WorkItem::new(format!("F{n:04}"), url(n))
    }

    fn doctor_client(backend: MockBackend) -> ExtractionClient<MockBackend> {
        ExtractionClient::new(backend, ExtractionTemplate::fallback(JobMode::DoctorInfo))
    }

    fn params() -> RunParams {
        RunParams {
            max_concurrency: 3,
            ..RunParams::new(JobMode::DoctorInfo)
        }
    }

    #[tokio::test]
    async fn test_all_items_succeed() {
        let items = vec![item(1), item(2), item(3)];
        let fetcher = MockFetcher::new()
            .with_page(url(1), "staff page 1")
            .with_page(url(2), "staff page 2")
            .with_page(url(3), "staff page 3");
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));
        let ledger = MemoryLedger::new();
        let sink = MemorySink::new();

        let report = run_shard(
            items,
            &fetcher,
            &client,
            &ledger,
            &sink,
            &params(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.rows_written, 3);
        assert!(report.is_complete());
        assert_eq!(ledger.success_count(), 3);
        assert_eq!(sink.row_count(), 3);
        assert_eq!(sink.rows()[0].len(), JobMode::DoctorInfo.columns().len());
    }

    #[tokio::test]
    async fn test_item_failure_does_not_abort_shard() {
        // item 2 has no page, so its fetch is unsupported
        let items = vec![item(1), item(2), item(3)];
        let fetcher = MockFetcher::new()
            .with_page(url(1), "staff page 1")
            .with_page(url(3), "staff page 3");
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));
        let ledger = MemoryLedger::new();
        let sink = MemorySink::new();

        let report = run_shard(
            items,
            &fetcher,
            &client,
            &ledger,
            &sink,
            &params(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failure_breakdown[&FailureKind::Unsupported], 1);
        assert_eq!(ledger.entry_count(), 3);
        assert_eq!(ledger.failure_count(), 1);
        assert_eq!(sink.row_count(), 2);
    }

    #[tokio::test]
    async fn test_resume_skips_attempted_items() {
        let ledger = MemoryLedger::new();
        ledger
            .record(&ProgressEntry::success(&item(1)))
            .await
            .unwrap();

        let fetcher = MockFetcher::new().with_page(url(2), "staff page 2");
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));
        let sink = MemorySink::new();

        let report = run_shard(
            vec![item(1), item(2)],
            &fetcher,
            &client,
            &ledger,
            &sink,
            &params(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.succeeded, 1);
        assert!(!fetcher.calls().contains(&url(1)));
        assert_eq!(sink.row_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_leaves_items_pending() {
        let items = vec![item(1), item(2), item(3)];
        let fetcher = MockFetcher::new();
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));
        let ledger = MemoryLedger::new();
        let sink = MemorySink::new();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = run_shard(items, &fetcher, &client, &ledger, &sink, &params(), cancel)
            .await
            .unwrap();

        assert_eq!(report.not_started, 3);
        assert_eq!(report.succeeded, 0);
        assert!(!report.is_complete());
        assert_eq!(ledger.entry_count(), 0, "pending items get no ledger entry");
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(sink.row_count(), 0);
    }

    #[tokio::test]
    async fn test_deadline_finishes_in_flight_then_stops() {
        let items = vec![item(1), item(2), item(3)];
        let fetcher = MockFetcher::new()
            .with_delay(Duration::from_millis(80))
            .with_page(url(1), "staff page 1")
            .with_page(url(2), "staff page 2")
            .with_page(url(3), "staff page 3");
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));
        let ledger = MemoryLedger::new();
        let sink = MemorySink::new();

        let run_params = RunParams {
            max_concurrency: 1,
            deadline: Some(Duration::from_millis(10)),
            ..RunParams::new(JobMode::DoctorInfo)
        };

        let report = run_shard(
            items,
            &fetcher,
            &client,
            &ledger,
            &sink,
            &run_params,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        // The first item was in flight when the deadline hit and must finish
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.not_started, 2);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(ledger.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_shard() {
        let fetcher = MockFetcher::new();
        let client = doctor_client(MockBackend::new());
        let ledger = MemoryLedger::new();
        let sink = MemorySink::new();

        let report = run_shard(
            Vec::new(),
            &fetcher,
            &client,
            &ledger,
            &sink,
            &params(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.total, 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_seven_items_across_three_shards() {
        let all_items: Vec<WorkItem> = (1..=7).map(item).collect();
        // item 4 serves something unrecognizable, everything else extracts
        let mut fetcher = MockFetcher::new();
        for n in [1, 2, 3, 5, 6, 7] {
            fetcher = fetcher.with_page(url(n), format!("staff page {n}"));
        }
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));

        let mut sizes = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut rows = 0;
        for shard_index in 0..3 {
            let shard_items = crate::shard::assign_items(&all_items, shard_index, 3).unwrap();
            sizes.push(shard_items.len());

            let ledger = MemoryLedger::new();
            let sink = MemorySink::new();
            let run_params = RunParams {
                shard_index,
                shard_count: 3,
                ..params()
            };
            let report = run_shard(
                shard_items,
                &fetcher,
                &client,
                &ledger,
                &sink,
                &run_params,
                CancellationToken::new(),
            )
            .await
            .unwrap();

            assert!(report.is_complete());
            assert_eq!(ledger.entry_count(), report.succeeded + report.failed);
            assert_eq!(sink.row_count(), report.rows_written);
            succeeded += report.succeeded;
            failed += report.failed;
            rows += report.rows_written;
        }

        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(succeeded, 6);
        assert_eq!(failed, 1);
        assert_eq!(rows, 6);
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn write(&self, _rows: &[Vec<String>]) -> Result<(), SinkError> {
            Err(SinkError::Write(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let items = vec![item(1), item(2)];
        let fetcher = MockFetcher::new()
            .with_page(url(1), "staff page 1")
            .with_page(url(2), "staff page 2");
        let client = doctor_client(MockBackend::new().with_response(DOCTOR_ROW));
        let ledger = MemoryLedger::new();

        let err = run_shard(
            items,
            &fetcher,
            &client,
            &ledger,
            &FailingSink,
            &params(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RunError::Sink(_)));
        assert_eq!(ledger.success_count(), 0, "no success entry without rows");
    }
}
