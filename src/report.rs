// Engagement Report
//
// Composes sessions, popularity, journeys, funnel and device mix over one
// window snapshot into a single report.

use chrono::{DateTime, Utc};

use crate::device::classify_device;
use crate::funnel::compute_funnel;
use crate::journeys::mine_journeys;
use crate::models::{DeviceBreakdown, EngagementReport, InteractionEvent, Session};
use crate::popularity::aggregate_popularity;
use crate::sessions::reconstruct_sessions;

pub fn device_breakdown(events: &[InteractionEvent]) -> DeviceBreakdown {
    let mut breakdown = DeviceBreakdown::default();
    for event in events {
        breakdown.record(classify_device(&event.client_signature));
    }
    breakdown
}

fn average_duration_seconds(sessions: &[Session]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    sessions.iter().map(Session::duration_seconds).sum::<f64>() / sessions.len() as f64
}

pub fn build_report(
    events: &[InteractionEvent],
    window_days: u32,
    top_n: usize,
    generated_at: DateTime<Utc>,
) -> EngagementReport {
    if events.is_empty() {
        return EngagementReport::empty(window_days, generated_at);
    }

    let sessions = reconstruct_sessions(events);

    EngagementReport {
        generated_at,
        window_days,
        total_sessions: sessions.len() as u64,
        average_session_duration_seconds: average_duration_seconds(&sessions),
        total_interactions: events.len() as u64,
        popular_entities: aggregate_popularity(events, top_n),
        device_breakdown: device_breakdown(events),
        journey_flow: mine_journeys(&sessions),
        funnel: compute_funnel(events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityCode, InteractionAction};
    use chrono::Duration;
    use uuid::Uuid;

    const PHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0";

    fn event(
        session: Uuid,
        agent: &str,
        code: &str,
        action: InteractionAction,
        secs: i64,
    ) -> InteractionEvent {
        InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: EntityCode::parse(code).unwrap(),
            action,
            timestamp: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs),
            client_signature: agent.to_string(),
            session_id: session,
            metadata: None,
        }
    }

    #[test]
    fn report_composes_all_aggregates() {
        use InteractionAction::*;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let events = vec![
            event(a, PHONE, "TX", Hover, 0),
            event(a, PHONE, "CA", Click, 10),
            event(b, DESKTOP, "TX", Hover, 100),
            event(a, PHONE, "CA", Navigation, 20),
            event(b, DESKTOP, "CA", Hover, 140),
        ];

        let now = Utc::now();
        let report = build_report(&events, 30, 10, now);

        assert_eq!(report.generated_at, now);
        assert_eq!(report.total_sessions, 2);
        assert_eq!(report.total_interactions, 5);
        assert_eq!(report.average_session_duration_seconds, 30.0);
        assert_eq!(report.device_breakdown, DeviceBreakdown { mobile: 3, tablet: 0, desktop: 2 });
        assert_eq!(report.popular_entities[0].entity_code.as_str(), "CA");
        assert_eq!(report.journey_flow.top_paths[0].count, 2);
        assert_eq!(report.funnel.hover_to_click, (1.0 / 3.0) * 100.0);
        assert_eq!(report.funnel.click_to_navigation, 100.0);
    }

    #[test]
    fn no_events_is_the_empty_report() {
        let now = Utc::now();
        assert_eq!(build_report(&[], 7, 10, now), EngagementReport::empty(7, now));
    }
}
