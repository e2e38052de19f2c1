// Session Reconstruction
//
// Groups a window of events by session id into ordered session summaries.
// Sessions come out in the order their first event arrived, and
// `visited_entities` follows arrival order too, not timestamp order.

use std::collections::HashMap;

use uuid::Uuid;

use crate::device::classify_device;
use crate::models::{InteractionAction, InteractionEvent, Session};

pub fn reconstruct_sessions(events: &[InteractionEvent]) -> Vec<Session> {
    let mut sessions: Vec<Session> = Vec::new();
    let mut index_by_id: HashMap<Uuid, usize> = HashMap::new();

    for event in events {
        let converted = event.action == InteractionAction::Navigation;

        match index_by_id.get(&event.session_id) {
            Some(&idx) => {
                let session = &mut sessions[idx];
                session.start_time = session.start_time.min(event.timestamp);
                session.end_time = session.end_time.max(event.timestamp);
                if !session.visited_entities.contains(&event.entity_code) {
                    session.visited_entities.push(event.entity_code.clone());
                }
                session.converted |= converted;
                session.event_count += 1;
            }
            None => {
                index_by_id.insert(event.session_id, sessions.len());
                sessions.push(Session {
                    session_id: event.session_id,
                    start_time: event.timestamp,
                    end_time: event.timestamp,
                    visited_entities: vec![event.entity_code.clone()],
                    device_category: classify_device(&event.client_signature),
                    converted,
                    event_count: 1,
                });
            }
        }
    }

    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceCategory, EntityCode};
    use chrono::{Duration, TimeZone, Utc};

    fn event(
        session: Uuid,
        code: &str,
        action: InteractionAction,
        offset_secs: i64,
    ) -> InteractionEvent {
        InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: EntityCode::parse(code).unwrap(),
            action,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            client_signature: "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X)".into(),
            session_id: session,
            metadata: None,
        }
    }

    #[test]
    fn single_session_with_navigation_converts() {
        let s1 = Uuid::new_v4();
        let events = vec![
            event(s1, "CA", InteractionAction::Hover, 0),
            event(s1, "CA", InteractionAction::Click, 2),
            event(s1, "CA", InteractionAction::Navigation, 3),
        ];

        let sessions = reconstruct_sessions(&events);
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.visited_entities, vec![EntityCode::parse("CA").unwrap()]);
        assert!(session.converted);
        assert_eq!(session.event_count, 3);
        assert_eq!(session.duration_seconds(), 3.0);
        assert_eq!(session.device_category, DeviceCategory::Tablet);
    }

    #[test]
    fn revisits_do_not_reappend_and_order_follows_arrival() {
        let s1 = Uuid::new_v4();
        // Arrival order TX, CA, TX, NV while timestamps run backwards
        let events = vec![
            event(s1, "TX", InteractionAction::Hover, 30),
            event(s1, "CA", InteractionAction::Hover, 20),
            event(s1, "TX", InteractionAction::Click, 10),
            event(s1, "NV", InteractionAction::Hover, 0),
        ];

        let sessions = reconstruct_sessions(&events);
        let codes: Vec<&str> = sessions[0].visited_entities.iter().map(|c| c.as_str()).collect();
        assert_eq!(codes, ["TX", "CA", "NV"]);
        assert!(!sessions[0].converted);
        assert_eq!(sessions[0].start_time, events[3].timestamp);
        assert_eq!(sessions[0].end_time, events[0].timestamp);
    }

    #[test]
    fn sessions_keep_first_arrival_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let events = vec![
            event(b, "OR", InteractionAction::Hover, 0),
            event(a, "WA", InteractionAction::Hover, 1),
            event(b, "ID", InteractionAction::Hover, 2),
        ];

        let sessions = reconstruct_sessions(&events);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, b);
        assert_eq!(sessions[1].session_id, a);
        for session in &sessions {
            assert!(!session.visited_entities.is_empty());
        }
    }

    #[test]
    fn no_events_no_sessions() {
        assert!(reconstruct_sessions(&[]).is_empty());
    }
}
