use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use thiserror::Error;

use crate::schema::{label_from_signal, Sample, Schema, FEATURE_COLUMNS, LABEL_COLUMN, SIGNAL_COLUMN};

/// Errors raised by dataset persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Tabular encoding/decoding failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// The authoritative, ordered collection of historical samples.
///
/// Append order is arrival order. Every append rewrites the canonical
/// file through a same-volume temporary plus atomic rename, so a crash
/// mid-write leaves the previous file intact.
#[derive(Debug)]
pub struct DatasetStore {
    path: PathBuf,
    samples: Vec<Sample>,
}

impl DatasetStore {
    /// Loads the canonical dataset file, starting empty when it is absent.
    ///
    /// Loaded rows are repaired: absent schema columns are zero-filled,
    /// unknown columns are dropped, and when the file carries no label
    /// column at all, labels are derived from the signal column. This is
    /// a one-time migration path for legacy data.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                samples: Vec::new(),
            });
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let has_label = headers.iter().any(|header| header == LABEL_COLUMN);
        let mut samples = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut record = IndexMap::with_capacity(headers.len());
            for (idx, header) in headers.iter().enumerate() {
                let value = row
                    .get(idx)
                    .and_then(|cell| cell.trim().parse::<f64>().ok())
                    .unwrap_or(0.0);
                record.insert(header.clone(), value);
            }
            let class = if has_label {
                label_from_signal(record.get(LABEL_COLUMN).copied().unwrap_or(0.0))
            } else {
                label_from_signal(record.get(SIGNAL_COLUMN).copied().unwrap_or(0.0))
            };
            samples.push(Sample::from_record(&record, class));
        }
        Ok(Self { path, samples })
    }

    /// Appends a sample and persists the full dataset atomically.
    pub fn append(&mut self, sample: Sample) -> Result<(), StoreError> {
        self.samples.push(sample);
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp = temp_path(&self.path);
        {
            let mut writer = csv::Writer::from_path(&temp)?;
            let mut header: Vec<&str> = FEATURE_COLUMNS.to_vec();
            header.push(LABEL_COLUMN);
            writer.write_record(&header)?;
            for sample in &self.samples {
                let mut row: Vec<String> = FEATURE_COLUMNS
                    .iter()
                    .map(|column| sample.feature(column).unwrap_or(0.0).to_string())
                    .collect();
                row.push(sample.class.to_string());
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        // The atomic publish step: the canonical file is either the old
        // or the new dataset, never a partial write.
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in arrival order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The canonical file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full-batch training matrices in schema order.
    #[must_use]
    pub fn training_data(&self, schema: &Schema) -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = self
            .samples
            .iter()
            .map(|sample| sample.features(schema))
            .collect();
        let labels = self
            .samples
            .iter()
            .map(|sample| f64::from(sample.class))
            .collect();
        (features, labels)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| "dataset.csv".into(), std::ffi::OsStr::to_os_string);
    name.push(".tmp");
    path.with_file_name(name)
}
