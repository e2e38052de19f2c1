// Data Models and Types
//
// This module defines the data structures shared by the analytics engine:
// the raw interaction candidate coming from the map surface, the validated
// interaction event that flows through the buffer and the store, and the
// derived aggregates (sessions, popularity, journeys, funnel, report).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationError;

/// EntityCode is the two-letter identifier of a map region ("CA", "TX").
/// Always exactly two ASCII uppercase letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityCode(String);

impl EntityCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let bytes = raw.as_bytes();
        if bytes.len() == 2 && bytes.iter().all(u8::is_ascii_uppercase) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(ValidationError::InvalidEntityCode(value))
    }
}

impl From<EntityCode> for String {
    fn from(code: EntityCode) -> Self {
        code.0
    }
}

/// InteractionAction is the closed set of things a visitor can do on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    /// Pointer resting over a region
    Hover,
    /// Region selected
    Click,
    /// Visitor followed through to the region's page (the conversion)
    Navigation,
    /// Region tooltip displayed
    TooltipView,
    /// Visitor completed the map and the celebration played
    CompletionCelebration,
}

impl InteractionAction {
    pub const ALL: [InteractionAction; 5] = [
        InteractionAction::Hover,
        InteractionAction::Click,
        InteractionAction::Navigation,
        InteractionAction::TooltipView,
        InteractionAction::CompletionCelebration,
    ];

    /// Convert enum to its stored string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::Hover => "hover",
            InteractionAction::Click => "click",
            InteractionAction::Navigation => "navigation",
            InteractionAction::TooltipView => "tooltip_view",
            InteractionAction::CompletionCelebration => "completion_celebration",
        }
    }

    /// Parse a stored string back to the enum
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hover" => Some(InteractionAction::Hover),
            "click" => Some(InteractionAction::Click),
            "navigation" => Some(InteractionAction::Navigation),
            "tooltip_view" => Some(InteractionAction::TooltipView),
            "completion_celebration" => Some(InteractionAction::CompletionCelebration),
            _ => None,
        }
    }
}

/// DeviceCategory is the coarse, best-effort device class of a visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Mobile => "mobile",
            DeviceCategory::Tablet => "tablet",
            DeviceCategory::Desktop => "desktop",
        }
    }
}

/// InteractionCandidate is an untrusted interaction as reported by the UI.
/// Nothing here has been checked yet; see `validation::validate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionCandidate {
    pub entity_code: Option<String>,
    pub action: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// Overrides the engine's page session id
    pub session_id: Option<Uuid>,
    /// Overrides the engine's page client signature
    pub client_signature: Option<String>,
    /// Overrides the engine clock
    pub timestamp: Option<DateTime<Utc>>,
}

impl InteractionCandidate {
    pub fn new(entity_code: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            entity_code: Some(entity_code.into()),
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn in_session(mut self, session_id: Uuid, client_signature: impl Into<String>) -> Self {
        self.session_id = Some(session_id);
        self.client_signature = Some(client_signature.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// InteractionEvent is one validated, observed action on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: Uuid,
    pub entity_code: EntityCode,
    pub action: InteractionAction,
    pub timestamp: DateTime<Utc>,
    /// Browser user agent string, only ever used for device classification
    pub client_signature: String,
    pub session_id: Uuid,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// PageContext identifies one page lifetime: its session and client signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub session_id: Uuid,
    pub client_signature: String,
}

impl PageContext {
    pub fn new(client_signature: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            client_signature: client_signature.into(),
        }
    }
}

/// Session is one continuous visit reconstructed from events sharing a session id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Distinct entity codes in first-seen order
    pub visited_entities: Vec<EntityCode>,
    pub device_category: DeviceCategory,
    pub converted: bool,
    pub event_count: u64,
}

impl Session {
    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// StatePopularity is the per-entity interaction rollup over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePopularity {
    pub entity_code: EntityCode,
    pub total_interactions: u64,
    pub hover_count: u64,
    pub click_count: u64,
    pub navigation_count: u64,
    pub tooltip_view_count: u64,
    pub completion_count: u64,
    /// navigations per click as a percentage, 0 when there were no clicks
    pub conversion_rate: f64,
}

/// JourneyPath is one distinct visitation sequence and how many sessions took it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyPath {
    pub path: Vec<EntityCode>,
    pub count: u64,
}

/// JourneyFlow summarises where visitors enter, leave and which routes they take
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyFlow {
    pub entry_points: Vec<EntityCode>,
    pub exit_points: Vec<EntityCode>,
    pub top_paths: Vec<JourneyPath>,
}

/// FunnelRatios are step-to-step conversion percentages across the action taxonomy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelRatios {
    pub hover_to_click: f64,
    pub click_to_navigation: f64,
    pub view_to_click: f64,
}

/// DeviceBreakdown counts events per classified device category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBreakdown {
    pub mobile: u64,
    pub tablet: u64,
    pub desktop: u64,
}

impl DeviceBreakdown {
    pub fn record(&mut self, category: DeviceCategory) {
        match category {
            DeviceCategory::Mobile => self.mobile += 1,
            DeviceCategory::Tablet => self.tablet += 1,
            DeviceCategory::Desktop => self.desktop += 1,
        }
    }
}

/// EngagementReport is one immutable snapshot of map engagement over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementReport {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub total_sessions: u64,
    pub average_session_duration_seconds: f64,
    pub total_interactions: u64,
    pub popular_entities: Vec<StatePopularity>,
    pub device_breakdown: DeviceBreakdown,
    pub journey_flow: JourneyFlow,
    pub funnel: FunnelRatios,
}

impl EngagementReport {
    /// The all-zero report handed out when no data could be read
    pub fn empty(window_days: u32, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            window_days,
            total_sessions: 0,
            average_session_duration_seconds: 0.0,
            total_interactions: 0,
            popular_entities: Vec::new(),
            device_breakdown: DeviceBreakdown::default(),
            journey_flow: JourneyFlow::default(),
            funnel: FunnelRatios::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_code_requires_two_uppercase_letters() {
        assert!(EntityCode::parse("CA").is_some());
        assert!(EntityCode::parse("ca").is_none());
        assert!(EntityCode::parse("C").is_none());
        assert!(EntityCode::parse("CAL").is_none());
        assert!(EntityCode::parse("C1").is_none());
        assert!(EntityCode::parse("California").is_none());
        assert!(EntityCode::parse("ÉÉ").is_none());
    }

    #[test]
    fn entity_code_deserialization_is_validated() {
        let ok: EntityCode = serde_json::from_str("\"TX\"").unwrap();
        assert_eq!(ok.as_str(), "TX");
        assert!(serde_json::from_str::<EntityCode>("\"Texas\"").is_err());
    }

    #[test]
    fn action_strings_match_serde_names() {
        for action in InteractionAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(InteractionAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(InteractionAction::parse("scroll"), None);
    }
}
