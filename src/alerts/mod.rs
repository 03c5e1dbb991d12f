//! Threshold and liveness alerting
//!
//! An [`AlertChecker`] pass loads every location's alert preference,
//! evaluates its readings against the configured threshold and offline
//! window, and hands the resulting alerts to a [`NotificationSink`].

pub mod checker;
pub mod config;
pub mod dispatcher;
pub mod evaluation;
pub mod liveness;
pub mod notifier;
pub mod threshold;

pub use checker::{build_contexts, AlertChecker, LocationEvaluation, PassError, PassReport};
pub use config::{AlertKind, AlertServiceConfig, PassConfig};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatchRecord};
pub use evaluation::{EvaluationResult, ThresholdOutcome};
pub use notifier::{
    DeliveryStatus, GotifyNotifier, LogNotifier, MemoryNotifier, Notification, NotificationSink,
    NotifierError,
};
