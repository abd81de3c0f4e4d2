use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while validating a raw request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are absent. Every missing name is listed.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    /// One or more values could not be coerced to a number.
    #[error("malformed values for fields: {}", .0.join(", "))]
    MalformedFields(Vec<String>),
}

/// Translates a recognized categorical token into its numeric code.
///
/// Tokens outside the table are not an error; numeric strings pass
/// through via parsing.
fn categorical_code(token: &str) -> Option<f64> {
    match token.trim().to_ascii_lowercase().as_str() {
        "yes" | "female" => Some(1.0),
        "no" | "male" => Some(0.0),
        _ => None,
    }
}

fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(token) => {
            categorical_code(token).or_else(|| token.trim().parse::<f64>().ok())
        }
        _ => None,
    }
}

/// Checks a raw field map against the required field names and normalizes
/// every value to a number.
///
/// All missing fields are collected before failing, and likewise all
/// malformed values. Fields outside the required set are normalized and
/// passed through; alignment decides their fate later.
pub fn normalize_request(
    input: &Map<String, Value>,
    required: &[&str],
) -> Result<IndexMap<String, f64>, ValidationError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|field| !input.contains_key(**field))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let mut record = IndexMap::with_capacity(input.len());
    let mut malformed = Vec::new();
    for (field, value) in input {
        match coerce(value) {
            Some(number) => {
                record.insert(field.clone(), number);
            }
            None => malformed.push(field.clone()),
        }
    }
    if malformed.is_empty() {
        Ok(record)
    } else {
        Err(ValidationError::MalformedFields(malformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FEATURE_COLUMNS;
    use serde_json::json;

    fn full_request() -> Map<String, Value> {
        let mut map = Map::new();
        for column in FEATURE_COLUMNS {
            map.insert(column.to_string(), json!(1));
        }
        map
    }

    #[test]
    fn lists_every_missing_field() {
        let mut map = full_request();
        map.remove("age");
        map.remove("q3");
        map.remove("q10");
        let err = normalize_request(&map, &FEATURE_COLUMNS).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec![
                "age".to_string(),
                "q3".to_string(),
                "q10".to_string()
            ])
        );
    }

    #[test]
    fn normalizes_categorical_tokens() {
        let mut map = full_request();
        map.insert("gender".to_string(), json!("female"));
        map.insert("jaundice".to_string(), json!("no"));
        let record = normalize_request(&map, &FEATURE_COLUMNS).unwrap();
        assert_eq!(record["gender"], 1.0);
        assert_eq!(record["jaundice"], 0.0);
    }

    #[test]
    fn numeric_strings_pass_through() {
        let mut map = full_request();
        map.insert("age".to_string(), json!("42.5"));
        let record = normalize_request(&map, &FEATURE_COLUMNS).unwrap();
        assert_eq!(record["age"], 42.5);
    }

    #[test]
    fn collects_all_malformed_values() {
        let mut map = full_request();
        map.insert("age".to_string(), json!("not-a-number"));
        map.insert("relation".to_string(), json!(null));
        let err = normalize_request(&map, &FEATURE_COLUMNS).unwrap_err();
        match err {
            ValidationError::MalformedFields(fields) => {
                assert!(fields.contains(&"age".to_string()));
                assert!(fields.contains(&"relation".to_string()));
                assert_eq!(fields.len(), 2);
            }
            ValidationError::MissingFields(_) => panic!("expected malformed fields"),
        }
    }

    #[test]
    fn extra_fields_are_kept_for_alignment_to_drop() {
        let mut map = full_request();
        map.insert("color".to_string(), json!(3));
        let record = normalize_request(&map, &FEATURE_COLUMNS).unwrap();
        assert_eq!(record["color"], 3.0);
    }
}
