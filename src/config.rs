// Configuration Management
//
// `EngineConfig` tunes the embedded analytics engine. `Config` is the command
// line / environment configuration of the demo service, which builds an
// `EngineConfig` from its flags.

use std::time::Duration;

use clap::Parser;

/// Tuning knobs for one `AnalyticsEngine`
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the background flush
    pub flush_interval: Duration,
    /// Cap on the in-memory event log used when the store cannot be queried
    pub max_retained_events: usize,
    /// Serialized metadata larger than this is dropped at intake
    pub max_metadata_bytes: usize,
    /// Report window when the caller does not give one
    pub default_window_days: u32,
    /// Entities kept in popularity rankings
    pub top_entities: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(10),
            max_retained_events: 1000,
            max_metadata_bytes: 2048,
            default_window_days: 30,
            top_entities: 10,
        }
    }
}

/// Command line and environment variable configuration for the demo service
#[derive(Parser, Debug, Clone)]
#[clap(name = "map-engagement-analytics")]
#[clap(about = "Map interaction analytics engine with a simulated visitor load")]
pub struct Config {
    /// PostgreSQL URL for the interaction store; in-memory store when unset
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis URL for the live analytics sink; sink disabled when unset
    #[clap(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Key prefix for Redis counters
    #[clap(long, env = "REDIS_KEY_PREFIX", default_value = "map")]
    pub redis_key_prefix: String,

    /// Length of the Redis recent-interactions list
    #[clap(long, env = "SINK_RECENT_EVENTS", default_value = "500")]
    pub sink_recent_events: usize,

    /// HTTP server bind address for report, metrics and health endpoints
    #[clap(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:3000")]
    pub bind_address: String,

    /// PostgreSQL connection pool size
    #[clap(long, env = "DB_POOL_SIZE", default_value = "5")]
    pub db_pool_size: u32,

    /// Seconds between background flushes
    #[clap(long, env = "FLUSH_INTERVAL_SECS", default_value = "10")]
    pub flush_interval_secs: u64,

    /// Maximum events kept in memory for reports
    #[clap(long, env = "MAX_RETAINED_EVENTS", default_value = "1000")]
    pub max_retained_events: usize,

    /// Maximum serialized metadata size in bytes
    #[clap(long, env = "MAX_METADATA_BYTES", default_value = "2048")]
    pub max_metadata_bytes: usize,

    /// Default trailing report window in days
    #[clap(long, env = "WINDOW_DAYS", default_value = "30")]
    pub window_days: u32,

    /// Number of entities in popularity rankings
    #[clap(long, env = "TOP_ENTITIES", default_value = "10")]
    pub top_entities: usize,

    /// Simulated map visits started per second (0 disables the simulator)
    #[clap(long, env = "SIMULATED_VISITS_PER_SECOND", default_value = "5")]
    pub simulated_visits_per_second: u32,

    /// Seconds between report gauge refreshes
    #[clap(long, env = "REPORT_REFRESH_SECS", default_value = "15")]
    pub report_refresh_secs: u64,
}

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            flush_interval: Duration::from_secs(self.flush_interval_secs.max(1)),
            max_retained_events: self.max_retained_events,
            max_metadata_bytes: self.max_metadata_bytes,
            default_window_days: self.window_days,
            top_entities: self.top_entities,
        }
    }
}
