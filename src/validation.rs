// Interaction Validation
//
// Rejects malformed interaction candidates before they reach the buffer.
// The checks are pure and cheap; `EventValidator` adds logging and metrics
// around them for the engine's hot path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::AppMetrics;
use crate::models::{EntityCode, InteractionAction, InteractionCandidate};

/// Reasons a candidate can be turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("entity code is missing")]
    MissingEntityCode,
    #[error("entity code {0:?} is not two uppercase letters")]
    InvalidEntityCode(String),
    #[error("action is missing")]
    MissingAction,
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("metadata must be a key/value object")]
    MetadataNotObject,
}

impl ValidationError {
    /// Stable label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingEntityCode => "missing_entity_code",
            ValidationError::InvalidEntityCode(_) => "invalid_entity_code",
            ValidationError::MissingAction => "missing_action",
            ValidationError::UnknownAction(_) => "unknown_action",
            ValidationError::MetadataNotObject => "metadata_not_object",
        }
    }
}

/// The checked parts of a candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInteraction {
    pub entity_code: EntityCode,
    pub action: InteractionAction,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// True when an oversized metadata object was discarded
    pub metadata_dropped: bool,
}

/// Validate a candidate. Oversized metadata objects are dropped rather than
/// failing the whole interaction.
pub fn validate(
    candidate: &InteractionCandidate,
    max_metadata_bytes: usize,
) -> Result<ValidatedInteraction, ValidationError> {
    let raw_code = candidate
        .entity_code
        .as_deref()
        .ok_or(ValidationError::MissingEntityCode)?;
    let entity_code = EntityCode::parse(raw_code)
        .ok_or_else(|| ValidationError::InvalidEntityCode(raw_code.to_string()))?;

    let raw_action = candidate
        .action
        .as_deref()
        .ok_or(ValidationError::MissingAction)?;
    let action = InteractionAction::parse(raw_action)
        .ok_or_else(|| ValidationError::UnknownAction(raw_action.to_string()))?;

    let (metadata, metadata_dropped) = match &candidate.metadata {
        None | Some(serde_json::Value::Null) => (None, false),
        Some(serde_json::Value::Object(map)) => {
            if metadata_size(map) > max_metadata_bytes {
                (None, true)
            } else {
                (Some(map.clone()), false)
            }
        }
        Some(_) => return Err(ValidationError::MetadataNotObject),
    };

    Ok(ValidatedInteraction {
        entity_code,
        action,
        metadata,
        metadata_dropped,
    })
}

/// Predicate form of `validate`
pub fn is_valid(candidate: &InteractionCandidate, max_metadata_bytes: usize) -> bool {
    validate(candidate, max_metadata_bytes).is_ok()
}

fn metadata_size(map: &serde_json::Map<String, serde_json::Value>) -> usize {
    serde_json::to_vec(map).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}

/// EventValidator runs validation on every recorded interaction and reports
/// rejections to logs and metrics.
pub struct EventValidator {
    max_metadata_bytes: usize,
    metrics: Arc<AppMetrics>,
}

impl EventValidator {
    pub fn new(max_metadata_bytes: usize, metrics: Arc<AppMetrics>) -> Self {
        Self {
            max_metadata_bytes,
            metrics,
        }
    }

    /// Returns the validated interaction, or None if it was rejected
    pub fn check(&self, candidate: &InteractionCandidate) -> Option<ValidatedInteraction> {
        match validate(candidate, self.max_metadata_bytes) {
            Ok(validated) => {
                if validated.metadata_dropped {
                    self.metrics.record_metadata_dropped();
                    warn!(
                        "Dropped metadata over {} bytes for {} {}",
                        self.max_metadata_bytes,
                        validated.entity_code,
                        validated.action.as_str()
                    );
                }
                debug!(
                    "Accepted interaction {} {}",
                    validated.entity_code,
                    validated.action.as_str()
                );
                Some(validated)
            }
            Err(e) => {
                self.metrics.record_rejection(e.reason());
                warn!("Rejected interaction: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIMIT: usize = 2048;

    #[test]
    fn accepts_well_formed_candidate() {
        let candidate =
            InteractionCandidate::new("CA", "click").with_metadata(json!({"source": "map"}));
        let validated = validate(&candidate, LIMIT).unwrap();
        assert_eq!(validated.entity_code.as_str(), "CA");
        assert_eq!(validated.action, InteractionAction::Click);
        assert_eq!(validated.metadata.unwrap()["source"], "map");
        assert!(!validated.metadata_dropped);
    }

    #[test]
    fn rejects_bad_entity_codes() {
        for code in ["California", "ca", "C", "", "12", "C-"] {
            let candidate = InteractionCandidate::new(code, "hover");
            assert_eq!(
                validate(&candidate, LIMIT),
                Err(ValidationError::InvalidEntityCode(code.to_string())),
                "{code} should be rejected"
            );
        }

        let missing = InteractionCandidate {
            action: Some("hover".into()),
            ..Default::default()
        };
        assert_eq!(validate(&missing, LIMIT), Err(ValidationError::MissingEntityCode));
    }

    #[test]
    fn rejects_actions_outside_the_enumeration() {
        for action in ["scroll", "Click", "view", ""] {
            let candidate = InteractionCandidate::new("TX", action);
            assert!(!is_valid(&candidate, LIMIT), "{action} should be rejected");
        }

        let missing = InteractionCandidate {
            entity_code: Some("TX".into()),
            ..Default::default()
        };
        assert_eq!(validate(&missing, LIMIT), Err(ValidationError::MissingAction));
    }

    #[test]
    fn rejects_non_object_metadata() {
        for metadata in [json!([1, 2]), json!("text"), json!(3)] {
            let candidate = InteractionCandidate::new("NY", "hover").with_metadata(metadata);
            assert_eq!(validate(&candidate, LIMIT), Err(ValidationError::MetadataNotObject));
        }

        let null = InteractionCandidate::new("NY", "hover").with_metadata(serde_json::Value::Null);
        assert_eq!(validate(&null, LIMIT).unwrap().metadata, None);
    }

    #[test]
    fn drops_oversized_metadata_but_keeps_event() {
        let candidate = InteractionCandidate::new("NY", "hover")
            .with_metadata(json!({"blob": "x".repeat(64)}));
        let validated = validate(&candidate, 16).unwrap();
        assert!(validated.metadata.is_none());
        assert!(validated.metadata_dropped);
    }

    #[test]
    fn validator_counts_rejections() {
        let metrics = Arc::new(AppMetrics::new().unwrap());
        let validator = EventValidator::new(LIMIT, metrics.clone());

        assert!(validator.check(&InteractionCandidate::new("California", "click")).is_none());
        assert!(validator.check(&InteractionCandidate::new("CA", "click")).is_some());

        let rejected = metrics
            .interactions_rejected_total
            .with_label_values(&["invalid_entity_code"])
            .get();
        assert_eq!(rejected, 1);
    }
}
