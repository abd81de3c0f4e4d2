use anyhow::Context;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use shared_logging::LogLevel;
use thiserror::Error;

use crate::{
    align::align,
    config::ScreeningConfig,
    model::{derive_label, LogisticModel},
    schema::{label_from_signal, Sample, Schema, FEATURE_COLUMNS, SIGNAL_COLUMN},
    telemetry::ScreeningTelemetry,
    store::DatasetStore,
    validate::{normalize_request, ValidationError},
};

/// Minimum dataset size before the model is fit and predictions served.
pub const RETRAIN_THRESHOLD: usize = 10;

const LEARNING_RATE: f64 = 0.5;
const EPOCHS: usize = 400;

/// Successful screening outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Positive-class probability in `[0, 100]`.
    pub probability: f64,
}

/// Snapshot of the service's readiness, for operators and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Accumulated samples.
    pub samples: usize,
    /// Samples required before predictions are served.
    pub threshold: usize,
    /// Whether the model has completed a fit.
    pub trained: bool,
}

/// Which side of the boundary an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller can fix the request.
    Client,
    /// A service-side fault or readiness gap.
    Server,
}

/// Errors surfaced at the request boundary.
#[derive(Debug, Error)]
pub enum ScreenError {
    /// The request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Fewer samples accumulated than the serving threshold requires.
    #[error("not enough data: {have} of {need} required samples accumulated, keep submitting labeled samples")]
    InsufficientData {
        /// Samples currently accumulated.
        have: usize,
        /// Samples required.
        need: usize,
    },
    /// The trained-model precondition is unmet.
    #[error("model is not trained yet")]
    ModelNotTrained,
    /// Any other fault; detail stays with the operators.
    #[error("internal error while processing the request")]
    Internal(#[source] anyhow::Error),
}

impl ScreenError {
    /// Classifies the error for the transport adapter.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::InsufficientData { .. } => ErrorClass::Client,
            Self::ModelNotTrained | Self::Internal(_) => ErrorClass::Server,
        }
    }
}

/// Service object owning the dataset and the model.
///
/// The full sequence validate, align, predict, label, append, retrain
/// runs as one critical section per request; the lock is held across
/// persistence.
#[derive(Debug)]
pub struct ScreeningService {
    config: ScreeningConfig,
    schema: Schema,
    telemetry: Option<ScreeningTelemetry>,
    state: Mutex<ServiceState>,
}

#[derive(Debug)]
struct ServiceState {
    store: DatasetStore,
    model: LogisticModel,
}

impl ScreeningService {
    /// Loads the persisted dataset, repairs it, and fits an initial model
    /// when enough data exists.
    ///
    /// A model snapshot from a previous run is ignored: the model is
    /// always refit from the dataset, so it reflects the current repair
    /// and label-derivation logic.
    pub fn bootstrap(config: ScreeningConfig) -> anyhow::Result<Self> {
        let schema = Schema::default();
        let store = DatasetStore::load(&config.dataset_path)
            .with_context(|| format!("loading dataset {:?}", config.dataset_path))?;
        let mut model = LogisticModel::new(schema.len());
        if store.len() >= RETRAIN_THRESHOLD {
            let (features, labels) = store.training_data(&schema);
            model.fit(&features, &labels, LEARNING_RATE, EPOCHS);
        }
        Ok(Self {
            config,
            schema,
            telemetry: None,
            state: Mutex::new(ServiceState { store, model }),
        })
    }

    /// Attaches telemetry sinks.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: ScreeningTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Handles one screening request end to end.
    pub fn screen(&self, request: &Map<String, Value>) -> Result<Prediction, ScreenError> {
        let record = match normalize_request(request, &FEATURE_COLUMNS) {
            Ok(record) => record,
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    "request rejected",
                    json!({ "reason": err.to_string() }),
                );
                self.event(
                    "screening.request.rejected",
                    json!({ "reason": err.to_string() }),
                );
                return Err(err.into());
            }
        };
        let features = align(&record, &self.schema);

        let mut state = self.state.lock();
        if state.store.len() < RETRAIN_THRESHOLD {
            // Below the threshold there is no model to label with; the
            // sample is still accepted, labeled by the signal rule.
            let class = label_from_signal(record.get(SIGNAL_COLUMN).copied().unwrap_or(0.0));
            state
                .store
                .append(Sample::from_record(&record, class))
                .map_err(|err| self.internal(err))?;
            let samples = state.store.len();
            self.log(
                LogLevel::Info,
                "sample accepted",
                json!({ "samples": samples, "predicted": false }),
            );
            self.event("screening.sample.accepted", json!({ "samples": samples }));
            self.retrain_if_ready(&mut state)?;
            if state.model.is_trained() {
                let probability = state.model.probability(&features);
                return Ok(Prediction { probability });
            }
            self.event(
                "screening.request.rejected",
                json!({ "reason": "insufficient data", "samples": samples }),
            );
            return Err(ScreenError::InsufficientData {
                have: samples,
                need: RETRAIN_THRESHOLD,
            });
        }

        if !state.model.is_trained() {
            return Err(ScreenError::ModelNotTrained);
        }
        let probability = state.model.probability(&features);
        let class = derive_label(probability);
        state
            .store
            .append(Sample::from_record(&record, class))
            .map_err(|err| self.internal(err))?;
        let samples = state.store.len();
        self.log(
            LogLevel::Info,
            "sample accepted",
            json!({ "samples": samples, "probability": probability, "class": class }),
        );
        self.event(
            "screening.sample.accepted",
            json!({ "samples": samples, "probability": probability }),
        );
        self.retrain_if_ready(&mut state)?;
        Ok(Prediction { probability })
    }

    /// Current readiness snapshot.
    pub fn status(&self) -> ServiceStatus {
        let state = self.state.lock();
        ServiceStatus {
            samples: state.store.len(),
            threshold: RETRAIN_THRESHOLD,
            trained: state.model.is_trained(),
        }
    }

    fn retrain_if_ready(&self, state: &mut ServiceState) -> Result<(), ScreenError> {
        if state.store.len() < RETRAIN_THRESHOLD {
            return Ok(());
        }
        let (features, labels) = state.store.training_data(&self.schema);
        let loss = state.model.fit(&features, &labels, LEARNING_RATE, EPOCHS);
        state
            .model
            .save(&self.config.model_path)
            .map_err(|err| self.internal(err))?;
        let samples = state.store.len();
        self.log(
            LogLevel::Info,
            "model retrained",
            json!({ "samples": samples, "loss": loss }),
        );
        self.event(
            "screening.model.retrained",
            json!({ "samples": samples, "loss": loss }),
        );
        Ok(())
    }

    fn internal(&self, err: impl Into<anyhow::Error>) -> ScreenError {
        let err = err.into();
        self.log(
            LogLevel::Error,
            "request processing failed",
            json!({ "detail": format!("{err:?}") }),
        );
        ScreenError::Internal(err)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.event(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn valid_request(age: f64, q1: f64) -> Map<String, Value> {
        let mut map = Map::new();
        for column in FEATURE_COLUMNS {
            map.insert(column.to_string(), json!(0));
        }
        map.insert("age".to_string(), json!(age));
        map.insert("q1".to_string(), json!(q1));
        map
    }

    fn service_in(dir: &std::path::Path) -> ScreeningService {
        ScreeningService::bootstrap(ScreeningConfig::in_dir(dir)).unwrap()
    }

    #[test]
    fn nine_samples_are_withheld_and_the_tenth_is_answered() {
        let dir = tempdir().unwrap();
        let service = service_in(dir.path());
        for idx in 0..9 {
            let err = service
                .screen(&valid_request(20.0 + f64::from(idx), f64::from(idx % 2)))
                .unwrap_err();
            assert_eq!(err.class(), ErrorClass::Client);
            match err {
                ScreenError::InsufficientData { have, need } => {
                    assert_eq!(have, usize::try_from(idx).unwrap() + 1);
                    assert_eq!(need, RETRAIN_THRESHOLD);
                }
                other => panic!("expected insufficient data, got {other:?}"),
            }
        }
        let prediction = service.screen(&valid_request(30.0, 1.0)).unwrap();
        assert!((0.0..=100.0).contains(&prediction.probability));
        let status = service.status();
        assert_eq!(status.samples, 10);
        assert!(status.trained);
    }

    #[test]
    fn retrain_fires_only_at_threshold() {
        let dir = tempdir().unwrap();
        let config = ScreeningConfig::in_dir(dir.path());
        let model_path = config.model_path.clone();
        let service = ScreeningService::bootstrap(config).unwrap();
        for idx in 0..9 {
            let _ = service.screen(&valid_request(20.0, f64::from(idx % 2)));
            assert!(!model_path.exists(), "no retrain below the threshold");
        }
        let _ = service.screen(&valid_request(25.0, 1.0)).unwrap();
        assert!(model_path.exists(), "threshold append persists a snapshot");
    }

    #[test]
    fn missing_fields_are_all_reported_as_client_errors() {
        let dir = tempdir().unwrap();
        let service = service_in(dir.path());
        let mut request = valid_request(20.0, 1.0);
        request.remove("gender");
        request.remove("q7");
        let err = service.screen(&request).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Client);
        let message = err.to_string();
        assert!(message.contains("gender"));
        assert!(message.contains("q7"));
    }

    #[test]
    fn below_threshold_samples_are_labeled_by_the_signal_rule() {
        let dir = tempdir().unwrap();
        let config = ScreeningConfig::in_dir(dir.path());
        let dataset_path = config.dataset_path.clone();
        let service = ScreeningService::bootstrap(config).unwrap();
        let _ = service.screen(&valid_request(20.0, 1.0));
        let _ = service.screen(&valid_request(21.0, 0.0));
        let contents = fs::read_to_string(&dataset_path).unwrap();
        let rows: Vec<&str> = contents.lines().skip(1).collect();
        assert!(rows[0].ends_with(",1"));
        assert!(rows[1].ends_with(",0"));
    }

    #[test]
    fn categorical_tokens_match_numeric_input_downstream() {
        let dir = tempdir().unwrap();
        let config = ScreeningConfig::in_dir(dir.path());
        let dataset_path = config.dataset_path.clone();
        let service = ScreeningService::bootstrap(config).unwrap();
        let mut categorical = valid_request(20.0, 1.0);
        categorical.insert("gender".to_string(), json!("female"));
        categorical.insert("jaundice".to_string(), json!("yes"));
        let _ = service.screen(&categorical);
        let contents = fs::read_to_string(&dataset_path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        // gender and jaundice columns hold the numeric codes.
        assert_eq!(fields[1], "1");
        assert_eq!(fields[2], "1");
    }

    #[test]
    fn bootstrap_trains_from_an_existing_dataset() {
        let dir = tempdir().unwrap();
        let config = ScreeningConfig::in_dir(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        let mut rows = String::from(
            "age,gender,jaundice,relation,q1,q2,q3,q4,q5,q6,q7,q8,q9,q10,class\n",
        );
        for idx in 0..12 {
            let class = idx % 2;
            rows.push_str(&format!(
                "{},0,0,0,{class},{class},0,0,0,0,0,0,0,0,{class}\n",
                20 + idx
            ));
        }
        fs::write(&config.dataset_path, rows).unwrap();
        let service = ScreeningService::bootstrap(config).unwrap();
        let status = service.status();
        assert_eq!(status.samples, 12);
        assert!(status.trained);
        let prediction = service.screen(&valid_request(33.0, 1.0)).unwrap();
        assert!((0.0..=100.0).contains(&prediction.probability));
        assert_eq!(service.status().samples, 13);
    }

    #[test]
    fn persistence_faults_surface_as_server_errors() {
        let dir = tempdir().unwrap();
        // The dataset parent is a regular file, so the append-time
        // directory creation fails.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "not a directory").unwrap();
        let config = ScreeningConfig::in_dir(dir.path())
            .with_dataset_path(blocker.join("dataset.csv"));
        let service = ScreeningService::bootstrap(config).unwrap();
        let err = service.screen(&valid_request(20.0, 1.0)).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Server);
        assert_eq!(err.to_string(), "internal error while processing the request");
    }
}
