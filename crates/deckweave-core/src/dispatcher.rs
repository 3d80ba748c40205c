//! Concurrent dispatch of generation requests with partial-failure tolerance.
//!
//! Every request runs in its own task. An optional semaphore bounds how many
//! generator calls are in flight. Failures, timeouts and generator panics are
//! converted into [`GenerationOutcome::Failure`] at this boundary, so one bad
//! request never aborts its siblings. Outcomes are collected at a single point
//! (the `JoinSet`), which is also where progress is reported, in completion
//! order.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::config::{DispatchConfig, RetryPolicy};
use crate::domain::{
    ContentType, DispatchedOutcome, FailureKind, GenerationError, GenerationOutcome,
    GenerationRequest,
};
use crate::metrics::METRICS;
use crate::obs::emit_item_completed;
use crate::port::{GeneratorPort, GeneratorRegistry, PortResult};
use crate::progress::{report_safely, ProgressSink};

/// Outcomes of one dispatch, in submission order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Exactly one outcome per submitted request.
    pub outcomes: Vec<DispatchedOutcome>,
    /// True when the run was cancelled before every request finished.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct ConcurrentDispatcher {
    registry: Arc<GeneratorRegistry>,
    config: DispatchConfig,
}

impl ConcurrentDispatcher {
    pub fn new(registry: GeneratorRegistry, config: DispatchConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run every request to completion.
    pub async fn dispatch(
        &self,
        requests: Vec<GenerationRequest>,
        progress: Arc<dyn ProgressSink>,
    ) -> Vec<DispatchedOutcome> {
        let (_never_cancel, cancel) = watch::channel(false);
        self.dispatch_until(requests, progress, cancel).await.outcomes
    }

    /// Run requests until they finish or `cancel` flips to `true`.
    ///
    /// On cancellation in-flight tasks are aborted; outcomes that already
    /// arrived are kept and every unfinished request is recorded as a
    /// [`FailureKind::Cancelled`] failure.
    #[instrument(skip_all, fields(total = requests.len()))]
    pub async fn dispatch_until(
        &self,
        requests: Vec<GenerationRequest>,
        progress: Arc<dyn ProgressSink>,
        mut cancel: watch::Receiver<bool>,
    ) -> DispatchReport {
        let mut collector = Collector::new(&requests, progress);
        let semaphore = self
            .config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        info!(
            requests = collector.total,
            max_concurrency = ?self.config.max_concurrency,
            "dispatching generation requests"
        );

        let mut join_set = JoinSet::new();
        let mut task_ids = HashMap::with_capacity(collector.total);
        for (idx, request) in requests.into_iter().enumerate() {
            let port = self.registry.get(request.content_type());
            let semaphore = semaphore.clone();
            let timeout = self.config.request_timeout();
            let retry = self.config.retry.clone();

            METRICS.inc_requests_dispatched();
            let handle = join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = match port {
                    Some(port) => run_request(port, &request, timeout, &retry).await,
                    None => GenerationOutcome::Failure(
                        GenerationError::no_generator(request.content_type()).into(),
                    ),
                };
                (idx, outcome)
            });
            task_ids.insert(handle.id(), idx);
        }

        let mut cancelled = *cancel.borrow();
        let mut watching = true;
        while !cancelled {
            tokio::select! {
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((idx, outcome)) => collector.settle(idx, outcome),
                        Err(e) => collector.settle_lost(&task_ids, e),
                    }
                }
                changed = cancel.changed(), if watching => {
                    match changed {
                        Ok(()) => cancelled = *cancel.borrow(),
                        Err(_) => watching = false,
                    }
                }
            }
        }

        if cancelled {
            warn!(
                completed = collector.completed,
                total = collector.total,
                "dispatch cancelled, aborting in-flight requests"
            );
            join_set.abort_all();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((idx, outcome)) => collector.settle(idx, outcome),
                    Err(e) => collector.settle_lost(&task_ids, e),
                }
            }
        }

        DispatchReport {
            outcomes: collector.finish(cancelled),
            cancelled,
        }
    }
}

/// Single aggregation point for outcomes arriving in completion order.
struct Collector {
    keys: Vec<(String, ContentType)>,
    slots: Vec<Option<GenerationOutcome>>,
    completed: usize,
    total: usize,
    progress: Arc<dyn ProgressSink>,
}

impl Collector {
    fn new(requests: &[GenerationRequest], progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            keys: requests
                .iter()
                .map(|r| (r.slide_id.clone(), r.content_type()))
                .collect(),
            slots: vec![None; requests.len()],
            completed: 0,
            total: requests.len(),
            progress,
        }
    }

    fn settle(&mut self, idx: usize, outcome: GenerationOutcome) {
        let Some(slot) = self.slots.get_mut(idx) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        let (slide_id, content_type) = &self.keys[idx];
        emit_item_completed(slide_id, *content_type, &outcome);
        if !outcome.is_success() {
            METRICS.inc_generation_failures();
        }

        let message = match &outcome {
            GenerationOutcome::Success(_) => format!("{content_type} for {slide_id} ready"),
            GenerationOutcome::Failure(f) => {
                format!("{content_type} for {slide_id} failed ({})", f.kind)
            }
        };
        *slot = Some(outcome);
        self.completed += 1;
        report_safely(self.progress.as_ref(), &message, self.completed, self.total);
    }

    /// Settle the request behind a task that ended without an outcome.
    fn settle_lost(&mut self, task_ids: &HashMap<tokio::task::Id, usize>, err: JoinError) {
        let Some(&idx) = task_ids.get(&err.id()) else {
            warn!(error = %err, "unknown generation task did not complete");
            return;
        };
        let outcome = if err.is_cancelled() {
            GenerationOutcome::failure(FailureKind::Cancelled, "enrichment cancelled")
        } else {
            warn!(error = %err, "generation task did not complete");
            GenerationOutcome::failure(FailureKind::Internal, "generation task was lost")
        };
        self.settle(idx, outcome);
    }

    fn finish(self, cancelled: bool) -> Vec<DispatchedOutcome> {
        self.keys
            .into_iter()
            .zip(self.slots)
            .map(|((slide_id, content_type), slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    if cancelled {
                        GenerationOutcome::failure(FailureKind::Cancelled, "enrichment cancelled")
                    } else {
                        GenerationOutcome::failure(FailureKind::Internal, "generation task was lost")
                    }
                });
                DispatchedOutcome {
                    slide_id,
                    content_type,
                    outcome,
                }
            })
            .collect()
    }
}

async fn run_request(
    port: Arc<dyn GeneratorPort>,
    request: &GenerationRequest,
    timeout: Option<Duration>,
    retry: &RetryPolicy,
) -> GenerationOutcome {
    let started = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match call_once(port.as_ref(), request, timeout).await {
            Ok(mut result) => {
                if result.metadata.elapsed_ms == 0 {
                    result.metadata.elapsed_ms = started.elapsed().as_millis() as u64;
                }
                return GenerationOutcome::Success(result);
            }
            Err(err) if err.is_retryable() && attempt <= retry.max_retries => {
                let delay = retry.backoff(attempt);
                debug!(
                    slide_id = %request.slide_id,
                    content_type = %request.content_type(),
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying generation request"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return GenerationOutcome::Failure(err.into()),
        }
    }
}

async fn call_once(
    port: &dyn GeneratorPort,
    request: &GenerationRequest,
    timeout: Option<Duration>,
) -> PortResult {
    let call = AssertUnwindSafe(port.generate(request)).catch_unwind();
    let caught = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => {
                return Err(GenerationError::timeout(format!(
                    "no response within {} ms",
                    limit.as_millis()
                )))
            }
        },
        None => call.await,
    };
    caught.unwrap_or_else(|panic| {
        let detail = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "generator panicked".to_string());
        Err(GenerationError::new(FailureKind::Internal, detail))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Guidance, PresentationContext, RequestPayload, TextConstraints, TextFormat, TextRequest};
    use crate::fakes::{FailingGenerator, StubGenerator};
    use crate::progress::NoopProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn text_request(slide_id: &str) -> GenerationRequest {
        GenerationRequest {
            slide_id: slide_id.to_string(),
            slide_number: 1,
            payload: RequestPayload::Text(TextRequest {
                topics: vec!["Revenue growth".to_string()],
                narrative: String::new(),
                slide_title: "Revenue".to_string(),
                context: PresentationContext::default(),
                table: None,
                constraints: TextConstraints {
                    word_count: 150,
                    tone: "professional".to_string(),
                    format: TextFormat::Paragraph,
                    max_characters: None,
                },
            }),
        }
    }

    fn chart_request(slide_id: &str) -> GenerationRequest {
        GenerationRequest {
            slide_id: slide_id.to_string(),
            slide_number: 2,
            payload: RequestPayload::Chart(crate::domain::ChartRequest {
                guidance: Guidance::default(),
                title: "Trend".to_string(),
                chart_type: crate::domain::ChartType::Line,
                data: None,
                theme: String::new(),
                width: 800,
                height: 400,
            }),
        }
    }

    /// Tracks the peak number of concurrent `generate` calls.
    struct GaugeGenerator {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        inner: StubGenerator,
    }

    #[async_trait]
    impl GeneratorPort for GaugeGenerator {
        fn content_type(&self) -> ContentType {
            ContentType::Text
        }

        async fn generate(&self, request: &GenerationRequest) -> PortResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.generate(request).await
        }
    }

    struct PanickingGenerator;

    #[async_trait]
    impl GeneratorPort for PanickingGenerator {
        fn content_type(&self) -> ContentType {
            ContentType::Chart
        }

        async fn generate(&self, _request: &GenerationRequest) -> PortResult {
            panic!("chart renderer exploded")
        }
    }

    /// Fails with a transport error until `succeed_after` calls were made.
    struct FlakyGenerator {
        calls: AtomicUsize,
        succeed_after: usize,
    }

    #[async_trait]
    impl GeneratorPort for FlakyGenerator {
        fn content_type(&self) -> ContentType {
            ContentType::Text
        }

        async fn generate(&self, request: &GenerationRequest) -> PortResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_after {
                return Err(GenerationError::transport("connection reset"));
            }
            StubGenerator::new(ContentType::Text).generate(request).await
        }
    }

    #[tokio::test]
    async fn test_every_request_gets_exactly_one_tagged_outcome() {
        let registry = GeneratorRegistry::new()
            .with(Arc::new(StubGenerator::new(ContentType::Text)))
            .with(Arc::new(FailingGenerator::new(
                ContentType::Chart,
                FailureKind::UpstreamRejected,
            )));
        let dispatcher = ConcurrentDispatcher::new(registry, DispatchConfig::default());

        let outcomes = dispatcher
            .dispatch(
                vec![text_request("s1"), chart_request("s1"), text_request("s2")],
                Arc::new(NoopProgress),
            )
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].slide_id, "s1");
        assert_eq!(outcomes[0].content_type, ContentType::Text);
        assert!(outcomes[0].outcome.is_success());
        assert_eq!(outcomes[1].content_type, ContentType::Chart);
        assert!(matches!(
            &outcomes[1].outcome,
            GenerationOutcome::Failure(f) if f.kind == FailureKind::UpstreamRejected
        ));
        assert_eq!(outcomes[2].slide_id, "s2");
        assert!(outcomes[2].outcome.is_success());
    }

    #[tokio::test]
    async fn test_missing_generator_becomes_failure_outcome() {
        let dispatcher = ConcurrentDispatcher::new(GeneratorRegistry::new(), DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(vec![chart_request("s1")], Arc::new(NoopProgress))
            .await;
        assert!(matches!(
            &outcomes[0].outcome,
            GenerationOutcome::Failure(f) if f.kind == FailureKind::NoGenerator
        ));
    }

    #[tokio::test]
    async fn test_panicking_generator_does_not_abort_siblings() {
        let registry = GeneratorRegistry::new()
            .with(Arc::new(StubGenerator::new(ContentType::Text)))
            .with(Arc::new(PanickingGenerator));
        let dispatcher = ConcurrentDispatcher::new(registry, DispatchConfig::default());

        let outcomes = dispatcher
            .dispatch(vec![chart_request("s1"), text_request("s1")], Arc::new(NoopProgress))
            .await;

        match &outcomes[0].outcome {
            GenerationOutcome::Failure(f) => {
                assert_eq!(f.kind, FailureKind::Internal);
                assert!(f.message.contains("exploded"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(outcomes[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let gauge = Arc::new(GaugeGenerator {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            inner: StubGenerator::new(ContentType::Text),
        });
        let registry = GeneratorRegistry::new().with(gauge.clone());
        let config = DispatchConfig {
            max_concurrency: Some(2),
            ..DispatchConfig::default()
        };
        let dispatcher = ConcurrentDispatcher::new(registry, config);

        let requests = (0..8).map(|i| text_request(&format!("s{i}"))).collect();
        let outcomes = dispatcher.dispatch(requests, Arc::new(NoopProgress)).await;

        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|o| o.outcome.is_success()));
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generator_times_out() {
        let slow = StubGenerator::new(ContentType::Text).with_latency(Duration::from_secs(5));
        let registry = GeneratorRegistry::new().with(Arc::new(slow));
        let config = DispatchConfig {
            request_timeout_ms: Some(100),
            ..DispatchConfig::default()
        };
        let dispatcher = ConcurrentDispatcher::new(registry, config);

        let outcomes = dispatcher
            .dispatch(vec![text_request("s1")], Arc::new(NoopProgress))
            .await;
        assert!(matches!(
            &outcomes[0].outcome,
            GenerationOutcome::Failure(f) if f.kind == FailureKind::Timeout
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_recovers_transient_failures() {
        let flaky = Arc::new(FlakyGenerator {
            calls: AtomicUsize::new(0),
            succeed_after: 3,
        });
        let registry = GeneratorRegistry::new().with(flaky.clone());
        let config = DispatchConfig {
            retry: RetryPolicy {
                max_retries: 2,
                backoff_base_ms: 10,
            },
            ..DispatchConfig::default()
        };
        let dispatcher = ConcurrentDispatcher::new(registry, config);

        let outcomes = dispatcher
            .dispatch(vec![text_request("s1")], Arc::new(NoopProgress))
            .await;
        assert!(outcomes[0].outcome.is_success());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let flaky = Arc::new(FlakyGenerator {
            calls: AtomicUsize::new(0),
            succeed_after: 2,
        });
        let registry = GeneratorRegistry::new().with(flaky.clone());
        let dispatcher = ConcurrentDispatcher::new(registry, DispatchConfig::default());

        let outcomes = dispatcher
            .dispatch(vec![text_request("s1")], Arc::new(NoopProgress))
            .await;
        assert!(!outcomes[0].outcome.is_success());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_reported_once_per_completion() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let reports_clone = Arc::clone(&reports);
        let sink: Arc<dyn ProgressSink> = Arc::new(move |msg: &str, done: usize, total: usize| {
            reports_clone.lock().unwrap().push((msg.to_string(), done, total));
        });
        let registry = GeneratorRegistry::stubbed();
        let dispatcher = ConcurrentDispatcher::new(registry, DispatchConfig::default());

        dispatcher
            .dispatch(vec![text_request("s1"), chart_request("s2")], sink)
            .await;

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        let counts: Vec<_> = reports.iter().map(|(_, done, total)| (*done, *total)).collect();
        assert_eq!(counts, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_progress_counts_failed_requests() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let reports_clone = Arc::clone(&reports);
        let sink: Arc<dyn ProgressSink> = Arc::new(move |msg: &str, done: usize, total: usize| {
            reports_clone.lock().unwrap().push((msg.to_string(), done, total));
        });
        let registry = GeneratorRegistry::stubbed().with(Arc::new(FailingGenerator::new(
            ContentType::Chart,
            FailureKind::Transport,
        )));
        let dispatcher = ConcurrentDispatcher::new(registry, DispatchConfig::default());

        let outcomes = dispatcher
            .dispatch(
                vec![text_request("s1"), chart_request("s1"), chart_request("s2")],
                sink,
            )
            .await;
        assert_eq!(outcomes.iter().filter(|o| !o.outcome.is_success()).count(), 2);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 3);
        let (_, done, total) = reports.last().unwrap();
        assert_eq!((*done, *total), (3, 3));
        let failed: Vec<_> = reports
            .iter()
            .filter(|(msg, _, _)| msg.contains("failed (transport)"))
            .collect();
        assert_eq!(failed.len(), 2);
    }

    #[tokio::test]
    async fn test_lost_task_is_settled_and_reported() {
        let mut tasks = JoinSet::<()>::new();
        let handle = tasks.spawn(async { panic!("worker died") });
        let lost = tasks.join_next().await.unwrap().unwrap_err();
        let task_ids = HashMap::from([(handle.id(), 1)]);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let reports_clone = Arc::clone(&reports);
        let sink: Arc<dyn ProgressSink> = Arc::new(move |msg: &str, done: usize, total: usize| {
            reports_clone.lock().unwrap().push((msg.to_string(), done, total));
        });
        let requests = vec![text_request("s1"), chart_request("s1")];
        let mut collector = Collector::new(&requests, sink);

        collector.settle(0, GenerationOutcome::failure(FailureKind::Transport, "reset"));
        collector.settle_lost(&task_ids, lost);

        {
            let reports = reports.lock().unwrap();
            let counts: Vec<_> = reports.iter().map(|(_, done, total)| (*done, *total)).collect();
            assert_eq!(counts, vec![(1, 2), (2, 2)]);
            assert!(reports[1].0.contains("chart for s1 failed (internal)"));
        }
        let outcomes = collector.finish(false);
        assert!(matches!(
            &outcomes[1].outcome,
            GenerationOutcome::Failure(f) if f.kind == FailureKind::Internal
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_finished_outcomes() {
        let slow_chart = StubGenerator::new(ContentType::Chart).with_latency(Duration::from_secs(30));
        let registry = GeneratorRegistry::new()
            .with(Arc::new(StubGenerator::new(ContentType::Text)))
            .with(Arc::new(slow_chart));
        let config = DispatchConfig {
            request_timeout_ms: None,
            ..DispatchConfig::default()
        };
        let dispatcher = ConcurrentDispatcher::new(registry, config);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            dispatcher
                .dispatch_until(
                    vec![text_request("s1"), chart_request("s1")],
                    Arc::new(NoopProgress),
                    cancel_rx,
                )
                .await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel_tx.send(true).unwrap();

        let report = handle.await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].outcome.is_success());
        assert!(matches!(
            &report.outcomes[1].outcome,
            GenerationOutcome::Failure(f) if f.kind == FailureKind::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_empty_dispatch_returns_nothing() {
        let dispatcher = ConcurrentDispatcher::new(GeneratorRegistry::stubbed(), DispatchConfig::default());
        let outcomes = dispatcher.dispatch(Vec::new(), Arc::new(NoopProgress)).await;
        assert!(outcomes.is_empty());
    }
}
