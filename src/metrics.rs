// Prometheus Metrics Collection
//
// This module defines the Prometheus metrics the engine reports about itself:
// interactions accepted and rejected, buffer depth, flush outcomes, sink
// mirroring and report building. The demo binary exposes them on /metrics.

use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

/// AppMetrics contains all Prometheus metrics for the analytics engine
/// Organized by stage: intake, buffer, flush, sink and reports
pub struct AppMetrics {
    pub registry: Registry,

    // Intake
    pub interactions_recorded_total: IntCounterVec,
    pub interactions_rejected_total: IntCounterVec,
    pub metadata_dropped_total: IntCounter,

    // Buffer and retained log
    pub buffered_events: IntGauge,
    pub retained_events: IntGauge,

    // Flush
    pub flushes_total: IntCounterVec,
    pub events_flushed_total: IntCounter,
    pub flush_duration: Histogram,

    // Sink mirror
    pub sink_notifications_total: IntCounterVec,

    // Reports
    pub reports_built_total: IntCounterVec,
    pub report_duration: Histogram,
    pub report_sessions: IntGauge,
    pub report_interactions: IntGauge,
    pub report_click_to_navigation: Gauge,
}

impl AppMetrics {
    /// Create a new metrics registry with all engine metrics registered
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let interactions_recorded_total = IntCounterVec::new(
            Opts::new("interactions_recorded_total", "Accepted map interactions by action"),
            &["action"],
        )?;

        let interactions_rejected_total = IntCounterVec::new(
            Opts::new("interactions_rejected_total", "Rejected map interactions by reason"),
            &["reason"],
        )?;

        let metadata_dropped_total = IntCounter::new(
            "interaction_metadata_dropped_total",
            "Oversized metadata objects discarded at intake",
        )?;

        let buffered_events =
            IntGauge::new("buffered_events", "Events waiting for the next flush")?;

        let retained_events =
            IntGauge::new("retained_events", "Events held in the bounded in-memory log")?;

        let flushes_total = IntCounterVec::new(
            Opts::new("flushes_total", "Flush attempts by result"),
            &["result"], // flushed/failed/empty
        )?;

        let events_flushed_total =
            IntCounter::new("events_flushed_total", "Events handed to the persistent store")?;

        let flush_duration = Histogram::with_opts(HistogramOpts::new(
            "flush_duration_seconds",
            "Time spent writing a batch to the persistent store",
        ))?;

        let sink_notifications_total = IntCounterVec::new(
            Opts::new("sink_notifications_total", "Mirror notifications by result"),
            &["result"], // success/error/skipped
        )?;

        let reports_built_total = IntCounterVec::new(
            Opts::new("reports_built_total", "Reports built by data source"),
            &["source"], // store/retained/empty
        )?;

        let report_duration = Histogram::with_opts(HistogramOpts::new(
            "report_build_duration_seconds",
            "Time spent loading a window and building a report",
        ))?;

        let report_sessions =
            IntGauge::new("report_sessions", "Sessions in the last built report")?;

        let report_interactions =
            IntGauge::new("report_interactions", "Interactions in the last built report")?;

        let report_click_to_navigation = Gauge::new(
            "report_click_to_navigation_percent",
            "Click to navigation conversion in the last built report",
        )?;

        registry.register(Box::new(interactions_recorded_total.clone()))?;
        registry.register(Box::new(interactions_rejected_total.clone()))?;
        registry.register(Box::new(metadata_dropped_total.clone()))?;
        registry.register(Box::new(buffered_events.clone()))?;
        registry.register(Box::new(retained_events.clone()))?;
        registry.register(Box::new(flushes_total.clone()))?;
        registry.register(Box::new(events_flushed_total.clone()))?;
        registry.register(Box::new(flush_duration.clone()))?;
        registry.register(Box::new(sink_notifications_total.clone()))?;
        registry.register(Box::new(reports_built_total.clone()))?;
        registry.register(Box::new(report_duration.clone()))?;
        registry.register(Box::new(report_sessions.clone()))?;
        registry.register(Box::new(report_interactions.clone()))?;
        registry.register(Box::new(report_click_to_navigation.clone()))?;

        Ok(Self {
            registry,
            interactions_recorded_total,
            interactions_rejected_total,
            metadata_dropped_total,
            buffered_events,
            retained_events,
            flushes_total,
            events_flushed_total,
            flush_duration,
            sink_notifications_total,
            reports_built_total,
            report_duration,
            report_sessions,
            report_interactions,
            report_click_to_navigation,
        })
    }

    /// Record an accepted interaction and the resulting queue depths
    pub fn record_interaction(&self, action: &str, buffered: usize, retained: usize) {
        self.interactions_recorded_total.with_label_values(&[action]).inc();
        self.buffered_events.set(buffered as i64);
        self.retained_events.set(retained as i64);
    }

    pub fn record_rejection(&self, reason: &str) {
        self.interactions_rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn record_metadata_dropped(&self) {
        self.metadata_dropped_total.inc();
    }

    pub fn record_flush(&self, result: &str, events: usize, duration: f64, buffered_after: usize) {
        self.flushes_total.with_label_values(&[result]).inc();
        if result == "flushed" {
            self.events_flushed_total.inc_by(events as u64);
        }
        if result != "empty" {
            self.flush_duration.observe(duration);
        }
        self.buffered_events.set(buffered_after as i64);
    }

    pub fn record_sink_notification(&self, result: &str) {
        self.sink_notifications_total.with_label_values(&[result]).inc();
    }

    pub fn record_report(&self, source: &str, duration: f64) {
        self.reports_built_total.with_label_values(&[source]).inc();
        self.report_duration.observe(duration);
    }

    /// Publish headline numbers from the latest report
    pub fn update_report_gauges(&self, sessions: u64, interactions: u64, click_to_navigation: f64) {
        self.report_sessions.set(sessions as i64);
        self.report_interactions.set(interactions as i64);
        self.report_click_to_navigation.set(click_to_navigation);
    }
}
