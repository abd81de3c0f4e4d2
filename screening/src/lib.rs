#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Online screening service: validates tabular questionnaire input,
//! aligns it to the trained feature schema, serves a probability, and
//! folds every accepted sample back into the persisted dataset,
//! retraining the classifier once enough data has accumulated.

/// Feature alignment against the trained schema.
pub mod align;
/// Filesystem configuration.
pub mod config;
/// Logistic classifier and label derivation.
pub mod model;
/// Static feature schema and sample records.
pub mod schema;
/// The service object and request handling.
pub mod service;
/// Dataset persistence with atomic rewrites.
pub mod store;
/// Structured logging and event emission.
pub mod telemetry;
/// Request validation and categorical normalization.
pub mod validate;

pub use align::align;
pub use config::ScreeningConfig;
pub use model::{derive_label, LogisticModel, PROBABILITY_THRESHOLD};
pub use schema::{Sample, Schema, FEATURE_COLUMNS, LABEL_COLUMN, SIGNAL_COLUMN};
pub use service::{
    ErrorClass, Prediction, ScreenError, ScreeningService, ServiceStatus, RETRAIN_THRESHOLD,
};
pub use store::{DatasetStore, StoreError};
pub use telemetry::{ScreeningTelemetry, ScreeningTelemetryBuilder};
pub use validate::{normalize_request, ValidationError};
