// Entity Popularity
//
// Per-entity interaction rollups ranked by total interactions.

use std::collections::HashMap;

use crate::models::{EntityCode, InteractionAction, InteractionEvent, StatePopularity};

/// Navigations per click as a percentage; 0 when nothing was clicked
pub fn conversion_rate(navigations: u64, clicks: u64) -> f64 {
    if clicks > 0 {
        (navigations as f64 / clicks as f64) * 100.0
    } else {
        0.0
    }
}

pub fn aggregate_popularity(events: &[InteractionEvent], top_n: usize) -> Vec<StatePopularity> {
    let mut by_entity: HashMap<&EntityCode, StatePopularity> = HashMap::new();

    for event in events {
        let entry = by_entity
            .entry(&event.entity_code)
            .or_insert_with(|| StatePopularity {
                entity_code: event.entity_code.clone(),
                total_interactions: 0,
                hover_count: 0,
                click_count: 0,
                navigation_count: 0,
                tooltip_view_count: 0,
                completion_count: 0,
                conversion_rate: 0.0,
            });

        entry.total_interactions += 1;
        match event.action {
            InteractionAction::Hover => entry.hover_count += 1,
            InteractionAction::Click => entry.click_count += 1,
            InteractionAction::Navigation => entry.navigation_count += 1,
            InteractionAction::TooltipView => entry.tooltip_view_count += 1,
            InteractionAction::CompletionCelebration => entry.completion_count += 1,
        }
    }

    let mut ranked: Vec<StatePopularity> = by_entity
        .into_values()
        .map(|mut entry| {
            entry.conversion_rate = conversion_rate(entry.navigation_count, entry.click_count);
            entry
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.total_interactions
            .cmp(&a.total_interactions)
            .then_with(|| a.entity_code.cmp(&b.entity_code))
    });
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(code: &str, action: InteractionAction) -> InteractionEvent {
        InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: EntityCode::parse(code).unwrap(),
            action,
            timestamp: Utc::now(),
            client_signature: String::new(),
            session_id: Uuid::nil(),
            metadata: None,
        }
    }

    #[test]
    fn hover_click_navigation_converts_fully() {
        let events = vec![
            event("CA", InteractionAction::Hover),
            event("CA", InteractionAction::Click),
            event("CA", InteractionAction::Navigation),
        ];

        let popular = aggregate_popularity(&events, 10);
        assert_eq!(popular.len(), 1);
        let ca = &popular[0];
        assert_eq!(ca.total_interactions, 3);
        assert_eq!(ca.hover_count, 1);
        assert_eq!(ca.click_count, 1);
        assert_eq!(ca.navigation_count, 1);
        assert_eq!(ca.conversion_rate, 100.0);
    }

    #[test]
    fn zero_clicks_means_zero_conversion() {
        let events = vec![
            event("NV", InteractionAction::Navigation),
            event("NV", InteractionAction::Hover),
            event("AZ", InteractionAction::TooltipView),
        ];

        for entry in aggregate_popularity(&events, 10) {
            assert_eq!(entry.click_count, 0);
            assert_eq!(entry.conversion_rate, 0.0);
            assert!(entry.conversion_rate.is_finite());
        }
    }

    #[test]
    fn ranked_descending_and_truncated() {
        let mut events = Vec::new();
        for _ in 0..3 {
            events.push(event("TX", InteractionAction::Hover));
        }
        for _ in 0..5 {
            events.push(event("FL", InteractionAction::Click));
        }
        events.push(event("OH", InteractionAction::Hover));
        events.push(event("AK", InteractionAction::Hover));

        let popular = aggregate_popularity(&events, 3);
        let codes: Vec<&str> = popular.iter().map(|p| p.entity_code.as_str()).collect();
        // AK and OH tie on one interaction; code order breaks the tie
        assert_eq!(codes, ["FL", "TX", "AK"]);
    }

    #[test]
    fn conversion_rate_guards_division() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(5, 0), 0.0);
        assert_eq!(conversion_rate(1, 4), 25.0);
    }
}
