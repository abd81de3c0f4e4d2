use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filesystem locations consumed by bootstrap and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Canonical dataset file.
    pub dataset_path: PathBuf,
    /// Model snapshot written after each retrain.
    pub model_path: PathBuf,
    /// Optional JSON-lines log sink.
    pub log_path: Option<PathBuf>,
    /// Optional durable event log.
    pub event_log_path: Option<PathBuf>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self::in_dir("data")
    }
}

impl ScreeningConfig {
    /// Conventional file layout rooted at `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            dataset_path: dir.join("screening_dataset.csv"),
            model_path: dir.join("screening_model.json"),
            log_path: None,
            event_log_path: None,
        }
    }

    /// Overrides the dataset path.
    #[must_use]
    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    /// Overrides the model snapshot path.
    #[must_use]
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Enables the JSON log sink.
    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Enables the durable event log.
    #[must_use]
    pub fn with_event_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_log_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_dir_places_conventional_files() {
        let config = ScreeningConfig::in_dir("/var/lib/screening");
        assert_eq!(
            config.dataset_path,
            PathBuf::from("/var/lib/screening/screening_dataset.csv")
        );
        assert_eq!(
            config.model_path,
            PathBuf::from("/var/lib/screening/screening_model.json")
        );
        assert!(config.log_path.is_none());
    }
}
