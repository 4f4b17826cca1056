use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("malformed recognition payload: {0}")]
    Malformed(String),
}

/// Request body sent for every sampled frame.
#[derive(Debug, Serialize)]
pub struct FrameRequest<'a> {
    pub frame: &'a str,
}

/// Serializes back to the service's own field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedFace {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Whatever else the service attached to the face.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecognizedFace {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            student_id: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Sequence of the frame this result answers.
    pub sequence: u64,
    pub faces: Vec<RecognizedFace>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Recognized(RecognitionResult),
    /// The service answered `success: false`. Carries its error text if any.
    Rejected { error: Option<String> },
}

/// Validate a service response body.
///
/// `success` must be `true` for anything to be forwarded. A `recognized_faces`
/// field that is not a list rejects the whole payload; entries that are not
/// objects are logged and skipped.
pub fn parse_response(sequence: u64, body: &Value) -> Result<SubmitOutcome, RecognitionError> {
    let Some(object) = body.as_object() else {
        return Err(RecognitionError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(body)
        )));
    };

    let success = object.get("success").and_then(Value::as_bool).unwrap_or(false);
    if !success {
        let error = object
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_owned);
        return Ok(SubmitOutcome::Rejected { error });
    }

    let faces = match object.get("recognized_faces") {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(RecognitionError::Malformed(format!(
                "recognized_faces is {}, not a list",
                json_kind(other)
            )))
        }
        None => {
            return Err(RecognitionError::Malformed(
                "recognized_faces missing".into(),
            ))
        }
    };

    let faces = faces
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| parse_face(index, entry))
        .collect();

    Ok(SubmitOutcome::Recognized(RecognitionResult { sequence, faces }))
}

fn parse_face(index: usize, entry: &Value) -> Option<RecognizedFace> {
    let Some(fields) = entry.as_object() else {
        log_warn!("skipping face #{index}: {}, not an object", json_kind(entry));
        return None;
    };

    let mut extra = fields.clone();
    let name = match extra.remove("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => UNKNOWN_NAME.to_string(),
    };
    let student_id = match extra.remove("student_id") {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };

    Some(RecognizedFace {
        name,
        student_id,
        extra,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recognized(outcome: SubmitOutcome) -> RecognitionResult {
        match outcome {
            SubmitOutcome::Recognized(result) => result,
            other => panic!("expected recognized outcome, got {other:?}"),
        }
    }

    #[test]
    fn parses_faces_and_keeps_service_fields() {
        let body = json!({
            "success": true,
            "recognized_faces": [
                { "name": "Alice", "student_id": "S-001", "confidence": 0.93 },
                { "name": "Bob", "student_id": 42 }
            ]
        });

        let result = recognized(parse_response(3, &body).unwrap());
        assert_eq!(result.sequence, 3);
        assert_eq!(result.faces.len(), 2);
        assert_eq!(result.faces[0].name, "Alice");
        assert_eq!(result.faces[0].student_id.as_deref(), Some("S-001"));
        assert_eq!(result.faces[0].extra.get("confidence"), Some(&json!(0.93)));
        assert_eq!(result.faces[1].student_id.as_deref(), Some("42"));
    }

    #[test]
    fn missing_or_empty_name_becomes_unknown() {
        let body = json!({
            "success": true,
            "recognized_faces": [ {}, { "name": "" }, { "name": 7 } ]
        });

        let result = recognized(parse_response(1, &body).unwrap());
        assert!(result.faces.iter().all(|face| face.name == UNKNOWN_NAME));
    }

    #[test]
    fn empty_face_list_is_a_valid_result() {
        let body = json!({ "success": true, "recognized_faces": [] });
        let result = recognized(parse_response(9, &body).unwrap());
        assert!(result.faces.is_empty());
    }

    #[test]
    fn unsuccessful_response_is_rejected_with_error_text() {
        let outcome = parse_response(1, &json!({ "success": false, "error": "No frame data provided" })).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                error: Some("No frame data provided".into())
            }
        );

        let outcome = parse_response(1, &json!({ "success": false })).unwrap();
        assert_eq!(outcome, SubmitOutcome::Rejected { error: None });
    }

    #[test]
    fn missing_success_flag_counts_as_rejection() {
        let outcome = parse_response(1, &json!({ "recognized_faces": [] })).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    }

    #[test]
    fn non_list_faces_are_malformed() {
        let err = parse_response(1, &json!({ "success": true, "recognized_faces": { "name": "Alice" } }))
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Malformed(_)));

        let err = parse_response(1, &json!({ "success": true })).unwrap_err();
        assert!(matches!(err, RecognitionError::Malformed(_)));
    }

    #[test]
    fn non_object_entries_are_skipped_and_valid_faces_kept() {
        let body = json!({
            "success": true,
            "recognized_faces": [ null, { "name": "Alice" }, "Bob", 3 ]
        });

        let result = recognized(parse_response(1, &body).unwrap());
        assert_eq!(result.faces, vec![RecognizedFace::named("Alice")]);
    }

    #[test]
    fn only_non_object_entries_leave_an_empty_result() {
        let body = json!({ "success": true, "recognized_faces": [ null, "Bob" ] });
        let result = recognized(parse_response(4, &body).unwrap());
        assert!(result.faces.is_empty());
    }

    #[test]
    fn faces_serialize_with_service_field_names() {
        let body = json!({
            "success": true,
            "recognized_faces": [ { "name": "Alice", "student_id": "S-001", "confidence": 0.93 } ]
        });
        let result = recognized(parse_response(1, &body).unwrap());

        assert_eq!(
            serde_json::to_value(&result.faces[0]).unwrap(),
            json!({ "name": "Alice", "student_id": "S-001", "confidence": 0.93 })
        );
        assert_eq!(
            serde_json::to_value(RecognizedFace::named("Bob")).unwrap(),
            json!({ "name": "Bob" })
        );
    }

    #[test]
    fn non_object_body_is_malformed() {
        assert!(matches!(
            parse_response(1, &json!([1, 2])),
            Err(RecognitionError::Malformed(_))
        ));
    }
}
