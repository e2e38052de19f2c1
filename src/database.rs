// Persistent Event Store
//
// The engine hands flushed batches to an `EventStore` and reads report windows
// back from it. `PostgresEventStore` is the durable backend;
// `MemoryEventStore` keeps a bounded log in process for demos and tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::buffer::EventLog;
use crate::models::{EntityCode, InteractionAction, InteractionEvent};

/// Postgres caps bind parameters per statement; 7 columns per row keeps well under it
const INSERT_CHUNK_ROWS: usize = 1000;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a batch of validated events. Returns rows written.
    async fn insert_batch(&self, events: &[InteractionEvent]) -> Result<u64>;

    /// Events with a timestamp at or after `since`, in arrival order.
    /// `None` means this store cannot be queried.
    async fn fetch_since(&self, _since: DateTime<Utc>) -> Result<Option<Vec<InteractionEvent>>> {
        Ok(None)
    }
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    id: Uuid,
    entity_code: String,
    action: String,
    occurred_at: DateTime<Utc>,
    client_signature: String,
    session_id: Uuid,
    metadata: Option<serde_json::Value>,
}

impl InteractionRow {
    fn into_event(self) -> Option<InteractionEvent> {
        let entity_code = EntityCode::parse(self.entity_code.trim())?;
        let action = InteractionAction::parse(&self.action)?;
        let metadata = match self.metadata {
            Some(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        };
        Some(InteractionEvent {
            id: self.id,
            entity_code,
            action,
            timestamp: self.occurred_at,
            client_signature: self.client_signature,
            session_id: self.session_id,
            metadata,
        })
    }
}

/// PostgresEventStore persists interactions in the `map_interactions` table
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(pool_size)
            .min_connections(1)
            .acquire_timeout(StdDuration::from_secs(5))
            .idle_timeout(StdDuration::from_secs(600))
            .max_lifetime(StdDuration::from_secs(1800))
            .connect(database_url)
            .await
            .context("connecting to postgres")?;

        Ok(Self { pool })
    }

    /// Create the interactions table and its indexes. `seq` records arrival order.
    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
        CREATE TABLE IF NOT EXISTS map_interactions (
            seq BIGSERIAL PRIMARY KEY,
            id UUID UNIQUE NOT NULL,
            entity_code CHAR(2) NOT NULL,
            action VARCHAR NOT NULL,
            occurred_at TIMESTAMP WITH TIME ZONE NOT NULL,
            client_signature VARCHAR NOT NULL DEFAULT '',
            session_id UUID NOT NULL,
            metadata JSONB,
            received_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        );
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_map_interactions_occurred \
             ON map_interactions(occurred_at DESC);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_map_interactions_session \
             ON map_interactions(session_id);",
        )
        .execute(&self.pool)
        .await?;

        info!("Interaction schema setup complete");
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn insert_batch(&self, events: &[InteractionEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for chunk in events.chunks(INSERT_CHUNK_ROWS) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO map_interactions \
                 (id, entity_code, action, occurred_at, client_signature, session_id, metadata) ",
            );

            query_builder.push_values(chunk, |mut b, event| {
                b.push_bind(event.id)
                    .push_bind(event.entity_code.as_str().to_string())
                    .push_bind(event.action.as_str())
                    .push_bind(event.timestamp)
                    .push_bind(event.client_signature.clone())
                    .push_bind(event.session_id)
                    .push_bind(event.metadata.clone().map(serde_json::Value::Object));
            });
            // A retried batch may already be partly stored
            query_builder.push(" ON CONFLICT (id) DO NOTHING");

            let result = query_builder.build().execute(&mut *tx).await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Option<Vec<InteractionEvent>>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            r#"
            SELECT id, entity_code, action, occurred_at, client_signature, session_id, metadata
            FROM map_interactions
            WHERE occurred_at >= $1
            ORDER BY seq
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let total = rows.len();
        let events: Vec<InteractionEvent> = rows
            .into_iter()
            .filter_map(InteractionRow::into_event)
            .collect();
        if events.len() < total {
            warn!("Skipped {} unreadable interaction rows", total - events.len());
        }

        Ok(Some(events))
    }
}

/// MemoryEventStore keeps a bounded in-process log and answers window queries from it
pub struct MemoryEventStore {
    log: EventLog,
}

impl MemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: EventLog::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_batch(&self, events: &[InteractionEvent]) -> Result<u64> {
        self.log.extend(events);
        Ok(events.len() as u64)
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Option<Vec<InteractionEvent>>> {
        Ok(Some(self.log.collect_where(|event| event.timestamp >= since)))
    }
}
