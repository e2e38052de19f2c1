// Simulated Visitor Data
//
// Generates believable map visits for the demo service: a visitor with a
// random browser signature wanders across a few states, hovering, opening
// tooltips, clicking and sometimes navigating through. A small share of
// interactions is deliberately malformed so validation has work to do.

use chrono::{DateTime, Duration, Utc};
use fake::{faker::internet::en::UserAgent, Fake};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use uuid::Uuid;

use crate::models::InteractionCandidate;

pub const STATE_CODES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY",
];

/// Heavily visited states get picked more often
const POPULAR_STATES: [&str; 6] = ["CA", "TX", "NY", "FL", "CO", "WA"];

/// A simulated page lifetime and the interactions it produced, in order
#[derive(Debug, Clone)]
pub struct SimulatedVisit {
    pub session_id: Uuid,
    pub client_signature: String,
    pub interactions: Vec<InteractionCandidate>,
}

/// VisitGenerator creates realistic map visits with weighted behaviour
pub struct VisitGenerator {
    /// Share of interactions replaced with malformed ones (0.0 to 1.0)
    malformed_rate: f64,
}

impl VisitGenerator {
    pub fn new(malformed_rate: f64) -> Self {
        Self {
            malformed_rate: malformed_rate.clamp(0.0, 1.0),
        }
    }

    /// Generate one visit starting at `start`
    /// Behaviour per visited state:
    /// - always a hover
    /// - 50% a tooltip view
    /// - 40% a click, and 35% of clicks navigate through
    ///
    /// Visits covering four or more states end with a completion celebration 30% of the time.
    pub fn generate_visit(&self, start: DateTime<Utc>) -> SimulatedVisit {
        let mut rng = StdRng::from_entropy();
        let session_id = Uuid::new_v4();
        let client_signature: String = UserAgent().fake();

        let stops = rng.gen_range(1..=5);
        let mut at = start;
        let mut interactions = Vec::new();

        for _ in 0..stops {
            let code = self.random_state(&mut rng);
            let mut step = |action: &str, rng: &mut StdRng| {
                at += Duration::milliseconds(rng.gen_range(300..8000));
                let candidate = InteractionCandidate::new(code, action)
                    .in_session(session_id, client_signature.clone())
                    .at(at);
                interactions.push(self.maybe_corrupt(candidate, rng));
            };

            step("hover", &mut rng);
            if rng.gen_bool(0.5) {
                step("tooltip_view", &mut rng);
            }
            if rng.gen_bool(0.4) {
                step("click", &mut rng);
                if rng.gen_bool(0.35) {
                    step("navigation", &mut rng);
                }
            }
        }

        if stops >= 4 && rng.gen_bool(0.3) {
            at += Duration::seconds(2);
            let code = self.random_state(&mut rng);
            interactions.push(
                InteractionCandidate::new(code, "completion_celebration")
                    .in_session(session_id, client_signature.clone())
                    .at(at)
                    .with_metadata(json!({"states_visited": stops})),
            );
        }

        SimulatedVisit {
            session_id,
            client_signature,
            interactions,
        }
    }

    fn random_state(&self, rng: &mut StdRng) -> &'static str {
        if rng.gen_bool(0.5) {
            POPULAR_STATES[rng.gen_range(0..POPULAR_STATES.len())]
        } else {
            STATE_CODES[rng.gen_range(0..STATE_CODES.len())]
        }
    }

    fn maybe_corrupt(
        &self,
        mut candidate: InteractionCandidate,
        rng: &mut StdRng,
    ) -> InteractionCandidate {
        if self.malformed_rate <= 0.0 || !rng.gen_bool(self.malformed_rate) {
            return candidate;
        }
        match rng.gen_range(0..3) {
            0 => candidate.entity_code = Some("California".to_string()),
            1 => candidate.action = Some("scroll".to_string()),
            _ => candidate.metadata = Some(json!(["not", "a", "record"])),
        }
        candidate
    }
}
