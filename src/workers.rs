// Background Workers
//
// Load and reporting loops for the demo service. The simulator replays
// generated map visits through the engine; the report worker rebuilds the
// engagement report on an interval so the Prometheus gauges stay current.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::engine::AnalyticsEngine;
use crate::generators::VisitGenerator;
use crate::models::EngagementReport;

/// InteractionSimulatorWorker feeds simulated visits into the engine
pub struct InteractionSimulatorWorker {
    engine: Arc<AnalyticsEngine>,
    generator: Arc<VisitGenerator>,
}

impl InteractionSimulatorWorker {
    pub fn new(engine: Arc<AnalyticsEngine>, generator: Arc<VisitGenerator>) -> Self {
        Self { engine, generator }
    }

    /// Generate and record `visits` visits. Returns the number of interactions offered.
    pub fn run_batch(&self, visits: u32) -> usize {
        let start = Instant::now();
        let now = Utc::now();
        let mut offered = 0;

        for _ in 0..visits {
            let visit = self.generator.generate_visit(now);
            offered += visit.interactions.len();
            for candidate in visit.interactions {
                self.engine.record(candidate);
            }
        }

        debug!(
            "Simulated {} visits ({} interactions) in {:.3}s, {} buffered",
            visits,
            offered,
            start.elapsed().as_secs_f64(),
            self.engine.buffered_len()
        );
        offered
    }
}

/// ReportRefreshWorker periodically rebuilds the engagement report
pub struct ReportRefreshWorker {
    engine: Arc<AnalyticsEngine>,
}

impl ReportRefreshWorker {
    pub fn new(engine: Arc<AnalyticsEngine>) -> Self {
        Self { engine }
    }

    pub async fn refresh(&self, window_days: Option<u32>) -> EngagementReport {
        let report = self.engine.get_engagement_report(window_days).await;

        let leader = report
            .popular_entities
            .first()
            .map(|p| p.entity_code.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "Report: {} sessions, {} interactions, top entity {}, click->navigation {:.1}%",
            report.total_sessions,
            report.total_interactions,
            leader,
            report.funnel.click_to_navigation
        );
        report
    }
}
