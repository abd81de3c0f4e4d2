use std::{fs, path::Path};

use anyhow::Context;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Probability cut point separating predicted label 0 from 1.
pub const PROBABILITY_THRESHOLD: f64 = 50.0;

/// Derives the binary label from a percentage probability.
///
/// Strict inequality: exactly the threshold maps to 0.
#[must_use]
pub fn derive_label(probability: f64) -> u8 {
    u8::from(probability > PROBABILITY_THRESHOLD)
}

/// Logistic classifier with per-feature standardization baked into the
/// trained parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    deviations: Vec<f64>,
    trained: bool,
}

impl LogisticModel {
    /// Creates an untrained model with small random weights.
    #[must_use]
    pub fn new(feature_dim: usize) -> Self {
        let mut rng = SmallRng::from_entropy();
        Self {
            weights: (0..feature_dim)
                .map(|_| rng.gen_range(-0.05..0.05))
                .collect(),
            bias: rng.gen_range(-0.05..0.05),
            means: vec![0.0; feature_dim],
            deviations: vec![1.0; feature_dim],
            trained: false,
        }
    }

    /// Loads a model snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {:?}", path.as_ref()))?;
        serde_json::from_str(&contents).context("parsing model snapshot")
    }

    /// Persists the model snapshot as JSON, overwriting any previous one.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating snapshot directory {parent:?}"))?;
        }
        let contents = serde_json::to_string_pretty(self).context("encoding model snapshot")?;
        fs::write(path, contents).with_context(|| format!("writing {path:?}"))
    }

    /// Whether the model has completed at least one fit.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Positive-class probability for a feature vector, scaled to `[0, 100]`.
    #[must_use]
    pub fn probability(&self, features: &[f64]) -> f64 {
        let z = features
            .iter()
            .zip(self.weights.iter())
            .zip(self.means.iter().zip(self.deviations.iter()))
            .map(|((feature, weight), (mean, deviation))| (feature - mean) / deviation * weight)
            .sum::<f64>()
            + self.bias;
        sigmoid(z) * 100.0
    }

    /// Fits the model from scratch on the full batch using gradient descent.
    ///
    /// Every call replaces all parameters. Returns the final mean log loss.
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[f64], lr: f64, epochs: usize) -> f64 {
        if features.is_empty() {
            return 0.0;
        }
        let feature_dim = features[0].len();
        let count = features.len() as f64;
        let mut rng = SmallRng::from_entropy();
        self.weights = (0..feature_dim)
            .map(|_| rng.gen_range(-0.05..0.05))
            .collect();
        self.bias = rng.gen_range(-0.05..0.05);
        let (means, deviations) = standardization(features);
        self.means = means;
        self.deviations = deviations;

        let scaled: Vec<Vec<f64>> = features
            .iter()
            .map(|sample| {
                sample
                    .iter()
                    .zip(self.means.iter().zip(self.deviations.iter()))
                    .map(|(value, (mean, deviation))| (value - mean) / deviation)
                    .collect()
            })
            .collect();

        for _ in 0..epochs {
            let errors: Vec<f64> = scaled
                .iter()
                .zip(labels.iter())
                .map(|(sample, label)| {
                    let z = sample
                        .iter()
                        .zip(self.weights.iter())
                        .map(|(value, weight)| value * weight)
                        .sum::<f64>()
                        + self.bias;
                    sigmoid(z) - label
                })
                .collect();

            for (idx, weight) in self.weights.iter_mut().enumerate() {
                let grad = errors
                    .iter()
                    .zip(scaled.iter())
                    .map(|(error, sample)| error * sample[idx])
                    .sum::<f64>()
                    / count;
                *weight -= lr * grad;
            }
            let bias_grad = errors.iter().sum::<f64>() / count;
            self.bias -= lr * bias_grad;
        }

        self.trained = true;
        scaled
            .iter()
            .zip(labels.iter())
            .map(|(sample, label)| {
                let z = sample
                    .iter()
                    .zip(self.weights.iter())
                    .map(|(value, weight)| value * weight)
                    .sum::<f64>()
                    + self.bias;
                log_loss(sigmoid(z), *label)
            })
            .sum::<f64>()
            / count
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn log_loss(probability: f64, label: f64) -> f64 {
    let clamped = probability.clamp(1e-12, 1.0 - 1e-12);
    -(label * clamped.ln() + (1.0 - label) * (1.0 - clamped).ln())
}

fn standardization(features: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let feature_dim = features[0].len();
    let count = features.len() as f64;
    let mut means = vec![0.0; feature_dim];
    for sample in features {
        for (idx, value) in sample.iter().enumerate() {
            means[idx] += value;
        }
    }
    for mean in &mut means {
        *mean /= count;
    }
    let mut deviations = vec![0.0; feature_dim];
    for sample in features {
        for (idx, value) in sample.iter().enumerate() {
            deviations[idx] += (value - means[idx]).powi(2);
        }
    }
    for deviation in &mut deviations {
        *deviation = (*deviation / count).sqrt().max(1e-6);
    }
    (means, deviations)
}
