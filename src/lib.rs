// Map Engagement Analytics Library
//
// Embedded analytics for a map-based navigation surface: interaction intake
// and validation, buffered flushing to a persistent store, and on-demand
// session, popularity, journey and funnel reporting.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod database;
pub mod device;
pub mod engine;
pub mod funnel;
pub mod generators;
pub mod http;
pub mod journeys;
pub mod metrics;
pub mod models;
pub mod popularity;
pub mod report;
pub mod sessions;
pub mod sink;
pub mod validation;
pub mod workers;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use config::{Config, EngineConfig};
pub use database::{EventStore, MemoryEventStore, PostgresEventStore};
pub use device::classify_device;
pub use engine::{AnalyticsEngine, EngineDeps, FlushOutcome, PageLifecycle};
pub use metrics::AppMetrics;
pub use models::*;
pub use sink::{AnalyticsSink, NoopSink, RedisSink};
pub use validation::{validate, ValidationError};
