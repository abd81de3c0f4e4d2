use indexmap::IndexMap;

use crate::schema::Schema;

/// Reshapes a normalized record into the schema's column set and order.
///
/// Columns present in both are copied, schema columns absent from the
/// record are zero-filled, record columns outside the schema are
/// dropped. Total and idempotent: absent data means absent signal, not
/// an error.
#[must_use]
pub fn align(record: &IndexMap<String, f64>, schema: &Schema) -> Vec<f64> {
    schema
        .columns()
        .iter()
        .map(|column| record.get(column.as_str()).copied().unwrap_or(0.0))
        .collect()
}
