// External Analytics Sink
//
// Every accepted interaction is mirrored, fire-and-forget, to a sink at the
// moment it is observed. Sink failures are never retried and never reach
// the caller.

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tracing::info;

use crate::models::InteractionEvent;

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn notify(&self, event: &InteractionEvent) -> Result<()>;
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn notify(&self, _event: &InteractionEvent) -> Result<()> {
        Ok(())
    }
}

/// RedisSink keeps live per-action and per-entity counters plus a capped list
/// of the most recent interactions.
///
/// Keys, with the default `map` prefix:
/// - `map:action:{action}` counter
/// - `map:entity:{code}` counter
/// - `map:entity:{code}:{action}` counter
/// - `map:recent` list of JSON events, newest first
pub struct RedisSink {
    conn: MultiplexedConnection,
    key_prefix: String,
    recent_limit: usize,
}

impl RedisSink {
    pub async fn new(
        redis_url: &str,
        key_prefix: impl Into<String>,
        recent_limit: usize,
    ) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis sink connected");
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
            recent_limit,
        })
    }

    fn recent_key(&self) -> String {
        format!("{}:recent", self.key_prefix)
    }
}

fn counter_keys(prefix: &str, event: &InteractionEvent) -> [String; 3] {
    let action = event.action.as_str();
    let code = event.entity_code.as_str();
    [
        format!("{prefix}:action:{action}"),
        format!("{prefix}:entity:{code}"),
        format!("{prefix}:entity:{code}:{action}"),
    ]
}

#[async_trait]
impl AnalyticsSink for RedisSink {
    async fn notify(&self, event: &InteractionEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let recent_key = self.recent_key();
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        for key in counter_keys(&self.key_prefix, event) {
            pipe.incr(key, 1i64).ignore();
        }
        pipe.lpush(&recent_key, json).ignore();
        pipe.ltrim(&recent_key, 0, self.recent_limit.saturating_sub(1) as isize).ignore();

        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityCode, InteractionAction};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn counter_keys_cover_action_and_entity() {
        let event = InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: EntityCode::parse("CO").unwrap(),
            action: InteractionAction::TooltipView,
            timestamp: Utc::now(),
            client_signature: String::new(),
            session_id: Uuid::nil(),
            metadata: None,
        };

        assert_eq!(
            counter_keys("map", &event),
            ["map:action:tooltip_view", "map:entity:CO", "map:entity:CO:tooltip_view"]
        );
    }

    #[tokio::test]
    async fn noop_sink_accepts_everything() {
        let event = InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: EntityCode::parse("CO").unwrap(),
            action: InteractionAction::Hover,
            timestamp: Utc::now(),
            client_signature: String::new(),
            session_id: Uuid::nil(),
            metadata: None,
        };
        assert!(NoopSink.notify(&event).await.is_ok());
    }
}
