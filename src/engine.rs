// Analytics Engine
//
// One engine value per application lifetime. It validates interactions from
// the map, buffers them, mirrors them to the sink, flushes them to the store
// on a timer or on page lifecycle changes, and builds reports on demand.
//
// Nothing in here returns an error to the caller: analytics is a side
// channel and failures only show up in logs and metrics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::{EventBuffer, EventLog};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::database::EventStore;
use crate::metrics::AppMetrics;
use crate::models::{
    EngagementReport, InteractionCandidate, InteractionEvent, PageContext, StatePopularity,
};
use crate::popularity::aggregate_popularity;
use crate::report::build_report;
use crate::sink::AnalyticsSink;
use crate::validation::EventValidator;

/// Collaborators the engine is built with
pub struct EngineDeps {
    pub store: Arc<dyn EventStore>,
    pub sink: Arc<dyn AnalyticsSink>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<AppMetrics>,
}

/// What a flush did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; the store was not called
    Empty,
    /// This many events were written and removed from the buffer
    Flushed(usize),
    /// Writing this many events failed; they stay buffered
    Failed(usize),
}

/// Page visibility signals that drive opportunistic flushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLifecycle {
    Visible,
    Hidden,
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowSource {
    Store,
    Retained,
}

impl WindowSource {
    fn as_str(&self) -> &'static str {
        match self {
            WindowSource::Store => "store",
            WindowSource::Retained => "retained",
        }
    }
}

struct EngineCore {
    config: EngineConfig,
    page: PageContext,
    validator: EventValidator,
    buffer: EventBuffer,
    retained: EventLog,
    store: Arc<dyn EventStore>,
    sink: Arc<dyn AnalyticsSink>,
    clock: Arc<dyn Clock>,
    metrics: Arc<AppMetrics>,
    /// Serializes flushes so only one of them removes from the buffer at a time
    flush_lock: tokio::sync::Mutex<()>,
}

impl EngineCore {
    async fn flush(&self) -> FlushOutcome {
        let _guard = self.flush_lock.lock().await;

        let snapshot = self.buffer.snapshot();
        if snapshot.is_empty() {
            self.metrics.record_flush("empty", 0, 0.0, 0);
            return FlushOutcome::Empty;
        }

        let batch_size = snapshot.len();
        let start = Instant::now();
        match self.store.insert_batch(&snapshot).await {
            Ok(rows) => {
                let removed = self.buffer.remove_flushed(&snapshot);
                let remaining = self.buffer.len();
                self.metrics
                    .record_flush("flushed", removed, start.elapsed().as_secs_f64(), remaining);
                debug!(
                    "Flushed {} events ({} rows written, {} still buffered) in {:.3}s",
                    removed,
                    rows,
                    remaining,
                    start.elapsed().as_secs_f64()
                );
                FlushOutcome::Flushed(removed)
            }
            Err(e) => {
                self.metrics.record_flush(
                    "failed",
                    batch_size,
                    start.elapsed().as_secs_f64(),
                    self.buffer.len(),
                );
                warn!("Flush of {} events failed, keeping them buffered: {:#}", batch_size, e);
                FlushOutcome::Failed(batch_size)
            }
        }
    }

    fn mirror(&self, event: InteractionEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.metrics.record_sink_notification("skipped");
            debug!("No async runtime, skipping sink mirror for {}", event.id);
            return;
        };

        let sink = self.sink.clone();
        let metrics = self.metrics.clone();
        runtime.spawn(async move {
            match sink.notify(&event).await {
                Ok(()) => metrics.record_sink_notification("success"),
                Err(e) => {
                    metrics.record_sink_notification("error");
                    debug!("Sink mirror failed for {}: {:#}", event.id, e);
                }
            }
        });
    }

    async fn load_window(
        &self,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<(Vec<InteractionEvent>, WindowSource)> {
        let since = window_start(now, window_days);
        match self.store.fetch_since(since).await? {
            Some(events) => Ok((events, WindowSource::Store)),
            None => Ok((
                self.retained.collect_where(|event| event.timestamp >= since),
                WindowSource::Retained,
            )),
        }
    }
}

/// Earliest timestamp inside a trailing window. Windows reaching past the
/// Unix epoch start there.
fn window_start(now: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(window_days))
        .and_then(|window| now.checked_sub_signed(window))
        .map_or(DateTime::UNIX_EPOCH, |since| since.max(DateTime::UNIX_EPOCH))
}

struct FlushScheduler {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    fn spawn(core: Arc<EngineCore>, period: StdDuration) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        core.flush().await;
                    }
                    _ = &mut stopped => break,
                }
            }
            debug!("Flush scheduler stopped");
        });

        Self { stop, handle }
    }

    /// Signal the task without waiting for it
    fn cancel(self) {
        let _ = self.stop.send(());
    }

    async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            warn!("Flush scheduler ended abnormally: {}", e);
        }
    }
}

/// AnalyticsEngine is the embedded entry point used by the map surface
pub struct AnalyticsEngine {
    core: Arc<EngineCore>,
    scheduler: Mutex<Option<FlushScheduler>>,
    shut_down: AtomicBool,
}

impl AnalyticsEngine {
    /// Build an engine without a background flush. Call
    /// `start_flush_scheduler` from inside a tokio runtime to add one.
    pub fn new(config: EngineConfig, page: PageContext, deps: EngineDeps) -> Self {
        let validator = EventValidator::new(config.max_metadata_bytes, deps.metrics.clone());
        let retained = EventLog::new(config.max_retained_events);

        let core = EngineCore {
            config,
            page,
            validator,
            buffer: EventBuffer::new(),
            retained,
            store: deps.store,
            sink: deps.sink,
            clock: deps.clock,
            metrics: deps.metrics,
            flush_lock: tokio::sync::Mutex::new(()),
        };

        Self {
            core: Arc::new(core),
            scheduler: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build an engine and start its periodic flush. Must run inside a tokio runtime.
    pub fn start(config: EngineConfig, page: PageContext, deps: EngineDeps) -> Self {
        let engine = Self::new(config, page, deps);
        engine.start_flush_scheduler();
        engine
    }

    /// Start the periodic flush. Returns false if it was already running or
    /// the engine has been shut down.
    pub fn start_flush_scheduler(&self) -> bool {
        if self.is_shut_down() {
            return false;
        }
        let mut scheduler = self.scheduler.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if scheduler.is_some() {
            return false;
        }

        let period = self.core.config.flush_interval;
        *scheduler = Some(FlushScheduler::spawn(self.core.clone(), period));
        info!(
            "Analytics engine flushing every {:?} for session {}",
            period, self.core.page.session_id
        );
        true
    }

    /// Validate and enqueue one interaction for this page
    pub fn record_interaction(
        &self,
        entity_code: &str,
        action: &str,
        metadata: Option<serde_json::Value>,
    ) {
        self.record(InteractionCandidate {
            entity_code: Some(entity_code.to_string()),
            action: Some(action.to_string()),
            metadata,
            ..Default::default()
        });
    }

    /// Validate and enqueue one interaction. Session, signature and timestamp
    /// default to this page and the engine clock.
    pub fn record(&self, candidate: InteractionCandidate) {
        if self.is_shut_down() {
            debug!("Ignoring interaction recorded after shutdown");
            return;
        }

        let core = &self.core;
        let Some(validated) = core.validator.check(&candidate) else {
            return;
        };

        let event = InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: validated.entity_code,
            action: validated.action,
            timestamp: candidate.timestamp.unwrap_or_else(|| core.clock.now()),
            client_signature: candidate
                .client_signature
                .unwrap_or_else(|| core.page.client_signature.clone()),
            session_id: candidate.session_id.unwrap_or(core.page.session_id),
            metadata: validated.metadata,
        };

        core.retained.push(event.clone());
        let buffered = core.buffer.push(event.clone());
        core.metrics
            .record_interaction(event.action.as_str(), buffered, core.retained.len());

        core.mirror(event);
    }

    /// Forward everything buffered to the store in one batch
    pub async fn flush(&self) -> FlushOutcome {
        self.core.flush().await
    }

    pub async fn handle_lifecycle(&self, signal: PageLifecycle) {
        match signal {
            PageLifecycle::Visible => {}
            PageLifecycle::Hidden => {
                self.flush().await;
            }
            PageLifecycle::Teardown => self.shutdown().await,
        }
    }

    /// Entities ranked by interactions over the trailing window
    pub async fn get_popular_entities(&self, window_days: Option<u32>) -> Vec<StatePopularity> {
        let core = &self.core;
        let window_days = window_days.unwrap_or(core.config.default_window_days);

        match core.load_window(window_days, core.clock.now()).await {
            Ok((events, _)) => aggregate_popularity(&events, core.config.top_entities),
            Err(e) => {
                warn!("Popularity query failed for {} day window: {:#}", window_days, e);
                Vec::new()
            }
        }
    }

    /// Engagement report over the trailing window. Always structurally valid:
    /// a failed query yields the all-zero report.
    pub async fn get_engagement_report(&self, window_days: Option<u32>) -> EngagementReport {
        let core = &self.core;
        let window_days = window_days.unwrap_or(core.config.default_window_days);
        let now = core.clock.now();
        let start = Instant::now();

        match core.load_window(window_days, now).await {
            Ok((events, source)) => {
                let report = build_report(&events, window_days, core.config.top_entities, now);
                core.metrics
                    .record_report(source.as_str(), start.elapsed().as_secs_f64());
                core.metrics.update_report_gauges(
                    report.total_sessions,
                    report.total_interactions,
                    report.funnel.click_to_navigation,
                );
                report
            }
            Err(e) => {
                core.metrics.record_report("empty", start.elapsed().as_secs_f64());
                warn!("Report query failed for {} day window: {:#}", window_days, e);
                EngagementReport::empty(window_days, now)
            }
        }
    }

    /// Stop the periodic flush and flush what is left. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }

        let outcome = self.core.flush().await;
        info!("Analytics engine shut down, final flush: {:?}", outcome);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn page(&self) -> &PageContext {
        &self.core.page
    }

    pub fn buffered_len(&self) -> usize {
        self.core.buffer.len()
    }

    pub fn retained_len(&self) -> usize {
        self.core.retained.len()
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.core.metrics
    }
}

impl Drop for AnalyticsEngine {
    fn drop(&mut self) {
        // Stop the flush task so it releases the core
        let scheduler = self
            .scheduler
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.cancel();
        }
    }
}
