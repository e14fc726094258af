//! Structured results for `--json`
//!
//! Every command prints exactly one JSON document on stdout:
//! `{"success": true, ...}` or `{"success": false, "error_code": 1, ...}`.

use serde_json::{Map, Value, json};
use std::fmt;

/// Marker error: the failure was already shown to the user
///
/// `run` exits with status 1 without printing anything else.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("command failed")
    }
}

impl std::error::Error for Reported {}

/// Build the result document; object fields in `data` are inlined
pub fn result_document(success: bool, data: Value) -> Value {
    let mut doc = Map::new();
    doc.insert("success".to_string(), Value::Bool(success));
    if !success {
        doc.insert("error_code".to_string(), json!(1));
    }
    match data {
        Value::Object(fields) => doc.extend(fields),
        Value::Null => {}
        other => {
            doc.insert("data".to_string(), other);
        }
    }
    Value::Object(doc)
}

pub fn print_result(success: bool, data: Value) {
    println!("{}", result_document(success, data));
}

/// Error document for failures that escaped a command as `Err`
pub fn error_document(message: &str) -> Value {
    result_document(false, json!({ "error": message }))
}
