//! Homewatch: sensor reading store and threshold alerting
//!
//! Records temperature readings, well-pump current draw and device heartbeats,
//! and runs one-shot evaluation passes that notify an operator through a
//! Gotify-compatible push webhook when a location exceeds its threshold or
//! stops reporting.
//!
//! # Features
//!
//! - **Reading API**: CRUD endpoints for temperatures, pump run times and heartbeats
//! - **Storage Backends**: Postgres/TimescaleDB via sqlx, or an in-memory engine
//! - **Threshold Evaluation**: sustained temperature exceedance and pump fault detection
//! - **Liveness**: offline detection from heartbeats or recent readings
//! - **Alert Dispatch**: at most one notification per location and alert kind per pass
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use homewatch::alerts::{AlertChecker, LogNotifier, PassConfig};
//! use homewatch::storage::MemoryStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let checker = AlertChecker::new(
//!     store.clone(),
//!     store,
//!     Arc::new(LogNotifier),
//!     PassConfig::default(),
//! );
//!
//! let report = checker.run_pass(chrono::Utc::now()).await?;
//! println!("Dispatched {} alerts", report.dispatched.len());
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod data;
pub mod storage;

// Re-export commonly used types
pub use alerts::{AlertChecker, PassConfig, PassError, PassReport};
pub use data::{AlertPreference, LocationClass, LocationContext, Sample};
pub use storage::{MemoryStore, PgStore, StorageError};
