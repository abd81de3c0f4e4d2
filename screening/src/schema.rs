use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered feature columns the model consumes.
pub const FEATURE_COLUMNS: [&str; 14] = [
    "age", "gender", "jaundice", "relation", "q1", "q2", "q3", "q4", "q5", "q6", "q7", "q8", "q9",
    "q10",
];

/// Name of the label column in the persisted dataset.
pub const LABEL_COLUMN: &str = "class";

/// Column whose value stands in for the label when a legacy file carries none.
pub const SIGNAL_COLUMN: &str = "q1";

/// Derives a binary label from the signal column value.
#[must_use]
pub fn label_from_signal(value: f64) -> u8 {
    u8::from(value > 0.0)
}

/// The fixed, ordered set of feature columns embodied by the trained model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            columns: FEATURE_COLUMNS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Schema {
    /// Feature column names in model order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of feature columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema is empty (never the case for the declared schema).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether `name` is one of the schema's feature columns.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }
}

/// One labeled record of the fixed feature schema.
///
/// Field order matches the persisted header order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Age in years.
    pub age: f64,
    /// Gender code (0/1).
    pub gender: f64,
    /// Jaundice history (0/1).
    pub jaundice: f64,
    /// Family relation flag (0/1).
    pub relation: f64,
    /// Questionnaire answer 1.
    pub q1: f64,
    /// Questionnaire answer 2.
    pub q2: f64,
    /// Questionnaire answer 3.
    pub q3: f64,
    /// Questionnaire answer 4.
    pub q4: f64,
    /// Questionnaire answer 5.
    pub q5: f64,
    /// Questionnaire answer 6.
    pub q6: f64,
    /// Questionnaire answer 7.
    pub q7: f64,
    /// Questionnaire answer 8.
    pub q8: f64,
    /// Questionnaire answer 9.
    pub q9: f64,
    /// Questionnaire answer 10.
    pub q10: f64,
    /// Binary label.
    pub class: u8,
}

impl Sample {
    /// Builds a sample from a normalized record, zero-filling absent columns.
    #[must_use]
    pub fn from_record(record: &IndexMap<String, f64>, class: u8) -> Self {
        let get = |column: &str| record.get(column).copied().unwrap_or(0.0);
        Self {
            age: get("age"),
            gender: get("gender"),
            jaundice: get("jaundice"),
            relation: get("relation"),
            q1: get("q1"),
            q2: get("q2"),
            q3: get("q3"),
            q4: get("q4"),
            q5: get("q5"),
            q6: get("q6"),
            q7: get("q7"),
            q8: get("q8"),
            q9: get("q9"),
            q10: get("q10"),
            class,
        }
    }

    /// Returns the value of a feature column, if it is part of the schema.
    #[must_use]
    pub fn feature(&self, column: &str) -> Option<f64> {
        match column {
            "age" => Some(self.age),
            "gender" => Some(self.gender),
            "jaundice" => Some(self.jaundice),
            "relation" => Some(self.relation),
            "q1" => Some(self.q1),
            "q2" => Some(self.q2),
            "q3" => Some(self.q3),
            "q4" => Some(self.q4),
            "q5" => Some(self.q5),
            "q6" => Some(self.q6),
            "q7" => Some(self.q7),
            "q8" => Some(self.q8),
            "q9" => Some(self.q9),
            "q10" => Some(self.q10),
            _ => None,
        }
    }

    /// Feature vector in schema order.
    #[must_use]
    pub fn features(&self, schema: &Schema) -> Vec<f64> {
        schema
            .columns()
            .iter()
            .map(|column| self.feature(column).unwrap_or(0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_all_feature_columns_in_order() {
        let schema = Schema::default();
        assert_eq!(schema.len(), 14);
        assert_eq!(schema.columns()[0], "age");
        assert_eq!(schema.columns()[13], "q10");
        assert!(schema.contains("jaundice"));
        assert!(!schema.contains(LABEL_COLUMN));
    }

    #[test]
    fn sample_from_record_zero_fills_absent_columns() {
        let mut record = IndexMap::new();
        record.insert("age".to_string(), 30.0);
        record.insert("q1".to_string(), 1.0);
        let sample = Sample::from_record(&record, 1);
        assert_eq!(sample.age, 30.0);
        assert_eq!(sample.q1, 1.0);
        assert_eq!(sample.gender, 0.0);
        assert_eq!(sample.q10, 0.0);
        assert_eq!(sample.class, 1);
    }

    #[test]
    fn signal_label_is_positive_only_above_zero() {
        assert_eq!(label_from_signal(1.0), 1);
        assert_eq!(label_from_signal(0.0), 0);
        assert_eq!(label_from_signal(-1.0), 0);
    }
}
