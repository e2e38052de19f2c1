// Conversion Funnel
//
// Step-to-step conversion percentages across the interaction taxonomy.
// There is no dedicated "view" action, so the view step reuses hovers.

use crate::models::{FunnelRatios, InteractionAction, InteractionEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub hovers: u64,
    pub clicks: u64,
    pub navigations: u64,
    pub tooltip_views: u64,
    pub completions: u64,
}

impl ActionCounts {
    pub fn from_events(events: &[InteractionEvent]) -> Self {
        let mut counts = Self::default();
        for event in events {
            match event.action {
                InteractionAction::Hover => counts.hovers += 1,
                InteractionAction::Click => counts.clicks += 1,
                InteractionAction::Navigation => counts.navigations += 1,
                InteractionAction::TooltipView => counts.tooltip_views += 1,
                InteractionAction::CompletionCelebration => counts.completions += 1,
            }
        }
        counts
    }

    pub fn views(&self) -> u64 {
        self.hovers
    }
}

fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        (numerator as f64 / denominator as f64) * 100.0
    } else {
        0.0
    }
}

pub fn compute_funnel(events: &[InteractionEvent]) -> FunnelRatios {
    let counts = ActionCounts::from_events(events);
    FunnelRatios {
        hover_to_click: percentage(counts.clicks, counts.hovers),
        click_to_navigation: percentage(counts.navigations, counts.clicks),
        view_to_click: percentage(counts.clicks, counts.views()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityCode;
    use chrono::Utc;
    use uuid::Uuid;

    fn events(actions: &[InteractionAction]) -> Vec<InteractionEvent> {
        actions
            .iter()
            .map(|&action| InteractionEvent {
                id: Uuid::new_v4(),
                entity_code: EntityCode::parse("GA").unwrap(),
                action,
                timestamp: Utc::now(),
                client_signature: String::new(),
                session_id: Uuid::nil(),
                metadata: None,
            })
            .collect()
    }

    #[test]
    fn ratios_are_percentages() {
        use InteractionAction::*;
        let funnel =
            compute_funnel(&events(&[Hover, Hover, Hover, Hover, Click, Click, Navigation]));
        assert_eq!(funnel.hover_to_click, 50.0);
        assert_eq!(funnel.click_to_navigation, 50.0);
        assert_eq!(funnel.view_to_click, 50.0);
    }

    #[test]
    fn empty_steps_yield_zero() {
        use InteractionAction::*;
        let funnel = compute_funnel(&events(&[Navigation, TooltipView]));
        assert_eq!(funnel, FunnelRatios::default());

        let clicks_only = compute_funnel(&events(&[Click, Click]));
        assert_eq!(clicks_only.hover_to_click, 0.0);
        assert_eq!(clicks_only.click_to_navigation, 0.0);
    }
}
