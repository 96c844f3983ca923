//! Bounded concurrent dispatcher with per-item retry.
//!
//! Given N work items and a [`FetchTask`], [`run_all`] produces exactly N
//! [`ItemResult`]s: one per item, collected in completion order, with no
//! item fetched more than `1 + max_retries` times. A failure local to one
//! item never aborts the run; an item that exhausts its retries is kept in
//! the output as [`ItemOutcome::GaveUp`] so the caller can still emit an
//! empty-but-present record for it.
//!
//! # Pool strategies
//!
//! The same contract is offered by two pool shapes, selected by
//! [`PoolStrategy`]:
//! - `InFlight`: a `buffer_unordered` stream polls up to `workers` fetches
//!   inside the calling task.
//! - `Spawned`: every item runs as its own spawned task, gated by a
//!   semaphore with `workers` permits.
//!
//! Results surface through the stream/join collection only; workers never
//! write to shared state.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::fetch::{FetchTask, Fetched, RetryPolicy};

/// A work item the dispatcher can name in logs and observer events.
pub trait WorkItem {
    /// Short identity string for this item.
    fn label(&self) -> String;
}

impl WorkItem for String {
    fn label(&self) -> String {
        self.clone()
    }
}

/// How the worker pool is shaped. External contract is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStrategy {
    /// Bounded concurrent polling within the calling task.
    InFlight,
    /// One spawned task per item behind a semaphore.
    Spawned,
}

/// Dispatcher configuration, built per stage from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Concurrent fetches in flight.
    pub workers: usize,
    pub strategy: PoolStrategy,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            strategy: PoolStrategy::InFlight,
            retry: RetryPolicy::default(),
        }
    }
}

/// Final outcome for one item after retries are spent.
#[derive(Debug)]
pub enum ItemOutcome<R> {
    /// Content fetched and parsed.
    Fetched(R),
    /// The source has no data for this item. Not an error.
    NoContent,
    /// Every attempt failed transiently; the item keeps an empty result.
    GaveUp,
}

impl<R> ItemOutcome<R> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ItemOutcome::Fetched(_) => OutcomeKind::Fetched,
            ItemOutcome::NoContent => OutcomeKind::NoContent,
            ItemOutcome::GaveUp => OutcomeKind::GaveUp,
        }
    }

    /// Collapse to the fetched content, or an empty default for the
    /// no-content and gave-up cases.
    pub fn into_rows(self) -> R
    where
        R: Default,
    {
        match self {
            ItemOutcome::Fetched(rows) => rows,
            ItemOutcome::NoContent | ItemOutcome::GaveUp => R::default(),
        }
    }
}

/// Outcome discriminant passed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Fetched,
    NoContent,
    GaveUp,
}

/// One dispatched item with its outcome and total attempt count.
#[derive(Debug)]
pub struct ItemResult<I, R> {
    pub item: I,
    pub outcome: ItemOutcome<R>,
    /// Fetch calls made for this item, including the successful one.
    pub attempts: usize,
}

/// Structured progress events, decoupled from console output.
///
/// Injected into [`run_all`]; the default methods are no-ops so test
/// observers only implement what they assert on.
pub trait ProgressObserver: Send + Sync {
    fn started(&self, _label: &str) {}
    fn retrying(&self, _label: &str, _attempt: usize, _delay: Duration) {}
    fn finished(&self, _label: &str, _outcome: OutcomeKind, _attempts: usize) {}
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn started(&self, label: &str) {
        debug!(item = %label, "Fetch started");
    }

    fn retrying(&self, label: &str, attempt: usize, delay: Duration) {
        info!(item = %label, attempt, ?delay, "Retrying after backoff");
    }

    fn finished(&self, label: &str, outcome: OutcomeKind, attempts: usize) {
        match outcome {
            OutcomeKind::Fetched => info!(item = %label, attempts, "Fetched"),
            OutcomeKind::NoContent => info!(item = %label, attempts, "No data found"),
            OutcomeKind::GaveUp => warn!(item = %label, attempts, "Gave up; keeping empty result"),
        }
    }
}

/// Run the fetcher over every item with a bounded worker pool.
///
/// Returns exactly one [`ItemResult`] per input item, in completion order.
/// Callers must not assume result order matches input order.
pub async fn run_all<F>(
    fetcher: Arc<F>,
    items: Vec<F::Item>,
    config: &DispatcherConfig,
    observer: Arc<dyn ProgressObserver>,
) -> Vec<ItemResult<F::Item, F::Output>>
where
    F: FetchTask + Send + Sync + 'static,
    F::Item: WorkItem + Send + 'static,
    F::Output: Send + 'static,
{
    let total = items.len();
    info!(
        total,
        workers = config.workers,
        strategy = ?config.strategy,
        max_retries = config.retry.max_retries,
        "Dispatching fetches"
    );

    let results = match config.strategy {
        PoolStrategy::InFlight => run_in_flight(fetcher, items, config, observer).await,
        PoolStrategy::Spawned => run_spawned(fetcher, items, config, observer).await,
    };

    info!(total, collected = results.len(), "Dispatch complete");
    results
}

async fn run_in_flight<F>(
    fetcher: Arc<F>,
    items: Vec<F::Item>,
    config: &DispatcherConfig,
    observer: Arc<dyn ProgressObserver>,
) -> Vec<ItemResult<F::Item, F::Output>>
where
    F: FetchTask + Send + Sync,
    F::Item: WorkItem + Send,
    F::Output: Send,
{
    let retry = config.retry;
    stream::iter(items)
        .map(|item| {
            let fetcher = Arc::clone(&fetcher);
            let observer = Arc::clone(&observer);
            async move { fetch_one(fetcher.as_ref(), item, retry, observer.as_ref()).await }
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await
}

async fn run_spawned<F>(
    fetcher: Arc<F>,
    items: Vec<F::Item>,
    config: &DispatcherConfig,
    observer: Arc<dyn ProgressObserver>,
) -> Vec<ItemResult<F::Item, F::Output>>
where
    F: FetchTask + Send + Sync + 'static,
    F::Item: WorkItem + Send + 'static,
    F::Output: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let retry = config.retry;

    let mut pool = JoinSet::new();
    for item in items {
        let fetcher = Arc::clone(&fetcher);
        let observer = Arc::clone(&observer);
        let semaphore = Arc::clone(&semaphore);
        pool.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("dispatcher semaphore closed");
            fetch_one(fetcher.as_ref(), item, retry, observer.as_ref()).await
        });
    }

    let mut results = Vec::with_capacity(pool.len());
    while let Some(joined) = pool.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            // Fetch implementations report failure through Err, not panics;
            // a join error here is a bug in the fetcher.
            Err(e) => error!(error = %e, "Dispatcher worker task failed"),
        }
    }
    results
}

/// Fetch one item, retrying transient failures per the policy.
async fn fetch_one<F>(
    fetcher: &F,
    item: F::Item,
    retry: RetryPolicy,
    observer: &dyn ProgressObserver,
) -> ItemResult<F::Item, F::Output>
where
    F: FetchTask,
    F::Item: WorkItem,
{
    let label = item.label();
    observer.started(&label);

    let mut attempts = 0usize;
    loop {
        attempts += 1;
        match fetcher.fetch(&item).await {
            Ok(Fetched::Rows(rows)) => {
                observer.finished(&label, OutcomeKind::Fetched, attempts);
                return ItemResult {
                    item,
                    outcome: ItemOutcome::Fetched(rows),
                    attempts,
                };
            }
            Ok(Fetched::NoContent) => {
                observer.finished(&label, OutcomeKind::NoContent, attempts);
                return ItemResult {
                    item,
                    outcome: ItemOutcome::NoContent,
                    attempts,
                };
            }
            Err(e) => {
                let retries_used = attempts - 1;
                if retries_used >= retry.max_retries {
                    warn!(item = %label, attempts, error = %e, "Fetch exhausted retries");
                    observer.finished(&label, OutcomeKind::GaveUp, attempts);
                    return ItemResult {
                        item,
                        outcome: ItemOutcome::GaveUp,
                        attempts,
                    };
                }

                let delay = retry.backoff_delay(retries_used);
                warn!(item = %label, attempt = attempts, ?delay, error = %e, "Fetch attempt failed; backing off");
                observer.retrying(&label, attempts, delay);
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::error::Error;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted fetcher: behavior is keyed off the item's name prefix.
    /// `ok:` yields one row, `empty:` yields no content, `flaky<k>:` fails
    /// k times then yields a row, `dead:` always fails.
    struct ScriptedFetcher {
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedFetcher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls_for(&self, item: &str) -> usize {
            *self.calls.lock().unwrap().get(item).unwrap_or(&0)
        }
    }

    impl FetchTask for ScriptedFetcher {
        type Item = String;
        type Output = Vec<String>;

        async fn fetch(
            &self,
            item: &String,
        ) -> Result<Fetched<Vec<String>>, Box<dyn Error + Send + Sync>> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(item.clone()).or_insert(0);
                *entry += 1;
                *entry
            };

            if item.starts_with("ok:") {
                Ok(Fetched::Rows(vec![item.clone()]))
            } else if item.starts_with("empty:") {
                Ok(Fetched::NoContent)
            } else if let Some(rest) = item.strip_prefix("flaky") {
                let failures: usize = rest.split(':').next().unwrap().parse().unwrap();
                if call <= failures {
                    Err("transient".into())
                } else {
                    Ok(Fetched::Rows(vec![item.clone()]))
                }
            } else {
                Err("permanently down".into())
            }
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        finished: Mutex<Vec<(String, OutcomeKind, usize)>>,
        retries: Mutex<usize>,
    }

    impl ProgressObserver for RecordingObserver {
        fn retrying(&self, _label: &str, _attempt: usize, _delay: Duration) {
            *self.retries.lock().unwrap() += 1;
        }

        fn finished(&self, label: &str, outcome: OutcomeKind, attempts: usize) {
            self.finished
                .lock()
                .unwrap()
                .push((label.to_string(), outcome, attempts));
        }
    }

    fn config(strategy: PoolStrategy) -> DispatcherConfig {
        DispatcherConfig {
            workers: 3,
            strategy,
            retry: RetryPolicy::default(),
        }
    }

    async fn run_mixed(strategy: PoolStrategy) {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let observer = Arc::new(RecordingObserver::default());
        let items: Vec<String> = vec![
            "ok:alpha".into(),
            "ok:bravo".into(),
            "empty:charlie".into(),
            "flaky2:delta".into(),
            "dead:echo".into(),
        ];

        let results = run_all(
            Arc::clone(&fetcher),
            items.clone(),
            &config(strategy),
            observer.clone(),
        )
        .await;

        // Exactly N results, each input item present exactly once.
        assert_eq!(results.len(), items.len());
        let mut labels: Vec<&str> = results.iter().map(|r| r.item.as_str()).collect();
        labels.sort();
        let mut expected: Vec<&str> = items.iter().map(|s| s.as_str()).collect();
        expected.sort();
        assert_eq!(labels, expected);

        for result in &results {
            match result.item.as_str() {
                "ok:alpha" | "ok:bravo" => {
                    assert_eq!(result.outcome.kind(), OutcomeKind::Fetched);
                    assert_eq!(result.attempts, 1);
                }
                "empty:charlie" => {
                    assert_eq!(result.outcome.kind(), OutcomeKind::NoContent);
                    // No-content is terminal: one call, zero retries.
                    assert_eq!(result.attempts, 1);
                    assert_eq!(fetcher.calls_for("empty:charlie"), 1);
                }
                "flaky2:delta" => {
                    assert_eq!(result.outcome.kind(), OutcomeKind::Fetched);
                    assert_eq!(result.attempts, 3);
                }
                "dead:echo" => {
                    assert_eq!(result.outcome.kind(), OutcomeKind::GaveUp);
                    assert_eq!(result.attempts, 6);
                    assert_eq!(fetcher.calls_for("dead:echo"), 6);
                }
                other => panic!("unexpected item {other}"),
            }
        }

        assert_eq!(observer.finished.lock().unwrap().len(), items.len());
        // flaky2 retried twice, dead retried five times.
        assert_eq!(*observer.retries.lock().unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_outcomes_in_flight() {
        run_mixed(PoolStrategy::InFlight).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_outcomes_spawned() {
        run_mixed(PoolStrategy::Spawned).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_backoff_total() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let items = vec!["dead:solo".to_string()];

        let t0 = tokio::time::Instant::now();
        let results = run_all(
            fetcher,
            items,
            &config(PoolStrategy::InFlight),
            Arc::new(TracingObserver),
        )
        .await;
        let elapsed = t0.elapsed();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome.kind(), OutcomeKind::GaveUp);
        // Five backoffs of 1+2+4+8+16 seconds, plus up to 1s jitter each.
        assert!(elapsed >= Duration::from_secs(31), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(36), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_yields_empty_output() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let results = run_all(
            fetcher,
            Vec::<String>::new(),
            &DispatcherConfig::default(),
            Arc::new(TracingObserver),
        )
        .await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_into_rows_collapses_empty_outcomes() {
        assert_eq!(ItemOutcome::Fetched(vec![1]).into_rows(), vec![1]);
        assert_eq!(ItemOutcome::<Vec<i32>>::NoContent.into_rows(), Vec::<i32>::new());
        assert_eq!(ItemOutcome::<Vec<i32>>::GaveUp.into_rows(), Vec::<i32>::new());
    }
}
