//! Copy keys from one Redis instance into another.
//!
//! The source is only ever read. Each key is written to the destination in
//! its own `MULTI`/`EXEC` block, so a key is either fully copied or untouched
//! even if the run is interrupted.
//!
//! ```ignore
//! let config = SyncConfig::resolve(None, overrides)?;
//! let report = redis_sync::sync(&config).await?;
//! println!("{} copied, {} failed", report.copied, report.failed_count());
//! ```

pub mod config;
pub mod endpoint;
pub mod errors;
pub mod record;
pub mod report;
pub mod runner;
pub mod store;

pub use config::{ConfigFile, ConfigOverrides, EndpointOverrides, ErrorPolicy, ExistingKeyPolicy, SyncConfig, SyncOptions, TtlPolicy};
pub use endpoint::Endpoint;
pub use errors::{StoreRole, SyncError};
pub use record::{KeyKind, KeyRecord, KeyValue, StreamEntry};
pub use report::{CopyOutcome, KeyFailure, SyncReport};
pub use runner::{SyncRunner, connect, sync};
pub use store::{MemoryStore, RedisStore, SourceStore, TargetStore};

// Re-export redis so callers can build connections without pinning a version.
pub use redis;
