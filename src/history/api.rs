//! Request handling for the analyses collection, independent of any transport.
//!
//! `GET /api/analyses` lists records, `POST /api/analyses` with a
//! `{ "fileName", "bpm" }` body appends one.

use log::{debug, error};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::store::{HistoryError, HistoryStore};
use super::NewAnalysis;

pub const ANALYSES_PATH: &str = "/api/analyses";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: String, message: String },
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] HistoryError),
}

impl ApiError {
    fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound => 404,
            Self::Store(_) => 500,
        }
    }

    fn into_response(self) -> ApiResponse {
        let status = self.status();
        let body = match &self {
            Self::Validation { field, message } => json!({ "message": message, "field": field }),
            Self::NotFound => json!({ "message": self.to_string() }),
            Self::Store(e) => {
                error!("History store failed: {}", e);
                json!({ "message": "Internal server error" })
            }
        };
        ApiResponse { status, body }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

pub fn handle(
    store: &mut dyn HistoryStore,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> ApiResponse {
    debug!("{} {}", method, path);
    let path = path.trim_end_matches('/');
    let result = match (method.to_ascii_uppercase().as_str(), path) {
        ("GET", ANALYSES_PATH) => list(store),
        ("POST", ANALYSES_PATH) => create(store, body),
        _ => Err(ApiError::NotFound),
    };
    result.unwrap_or_else(ApiError::into_response)
}

fn list(store: &dyn HistoryStore) -> Result<ApiResponse, ApiError> {
    let records = store.list_all();
    Ok(ApiResponse {
        status: 200,
        body: serde_json::to_value(records).map_err(HistoryError::from)?,
    })
}

fn create(store: &mut dyn HistoryStore, body: Option<&str>) -> Result<ApiResponse, ApiError> {
    let input = parse_new_analysis(body.unwrap_or(""))?;
    let record = store.append(input)?;
    Ok(ApiResponse {
        status: 201,
        body: serde_json::to_value(record).map_err(HistoryError::from)?,
    })
}

fn parse_new_analysis(body: &str) -> Result<NewAnalysis, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| ApiError::validation("", "Invalid JSON body"))?;
    let fields = value
        .as_object()
        .ok_or_else(|| ApiError::validation("", "Expected object"))?;

    let file_name = required_string(fields, "fileName")?;

    let bpm = required_string(fields, "bpm")?;
    match bpm.trim().parse::<f32>() {
        Ok(v) if v.is_finite() && v > 0.0 => {}
        _ => return Err(ApiError::validation("bpm", "BPM must be a positive number")),
    }

    Ok(NewAnalysis::new(file_name, bpm))
}

fn required_string(fields: &Map<String, Value>, name: &str) -> Result<String, ApiError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(ApiError::validation(name, "Required")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ApiError::validation(
            name,
            format!("Expected string, received {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{AnalysisRecord, MemoryHistoryStore};

    struct BrokenStore;

    impl HistoryStore for BrokenStore {
        fn append(&mut self, _: NewAnalysis) -> Result<AnalysisRecord, HistoryError> {
            Err(HistoryError::Io {
                path: "history.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn list_all(&self) -> Vec<AnalysisRecord> {
            Vec::new()
        }
    }

    #[test]
    fn create_then_list() {
        let mut store = MemoryHistoryStore::new();
        let created = handle(
            &mut store,
            "POST",
            ANALYSES_PATH,
            Some(r#"{"fileName":"track.mp3","bpm":"128"}"#),
        );
        assert_eq!(created.status, 201);
        assert_eq!(created.body["fileName"], "track.mp3");
        assert_eq!(created.body["bpm"], "128");

        let listed = handle(&mut store, "GET", ANALYSES_PATH, None);
        assert_eq!(listed.status, 200);
        let items = listed.body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], created.body);
    }

    #[test]
    fn empty_file_name_is_accepted() {
        let mut store = MemoryHistoryStore::new();
        let res = handle(
            &mut store,
            "POST",
            ANALYSES_PATH,
            Some(r#"{"fileName":"","bpm":"120"}"#),
        );
        assert_eq!(res.status, 201);
        assert_eq!(store.list_all()[0].file_name, "");
    }

    #[test]
    fn missing_field_is_reported() {
        let mut store = MemoryHistoryStore::new();
        let res = handle(&mut store, "POST", ANALYSES_PATH, Some(r#"{"bpm":"120"}"#));
        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "fileName");
        assert_eq!(res.body["message"], "Required");
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn wrong_types_are_reported() {
        let mut store = MemoryHistoryStore::new();
        let res = handle(
            &mut store,
            "POST",
            ANALYSES_PATH,
            Some(r#"{"fileName":"a.mp3","bpm":120}"#),
        );
        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "bpm");
        assert_eq!(res.body["message"], "Expected string, received number");

        let res = handle(
            &mut store,
            "POST",
            ANALYSES_PATH,
            Some(r#"{"fileName":"a.mp3","bpm":"fast"}"#),
        );
        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "bpm");
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let mut store = MemoryHistoryStore::new();
        assert_eq!(handle(&mut store, "POST", ANALYSES_PATH, Some("nope")).status, 400);
        assert_eq!(handle(&mut store, "POST", ANALYSES_PATH, None).status, 400);
        assert_eq!(handle(&mut store, "POST", ANALYSES_PATH, Some("[1]")).status, 400);
    }

    #[test]
    fn unknown_routes_are_not_found() {
        let mut store = MemoryHistoryStore::new();
        let res = handle(&mut store, "DELETE", ANALYSES_PATH, None);
        assert_eq!(res.status, 404);
        assert_eq!(res.body, json!({ "message": "Not found" }));
        assert_eq!(handle(&mut store, "GET", "/api/other", None).status, 404);
    }

    #[test]
    fn trailing_slash_and_lowercase_method_are_accepted() {
        let mut store = MemoryHistoryStore::new();
        assert_eq!(handle(&mut store, "get", "/api/analyses/", None).status, 200);
    }

    #[test]
    fn store_failure_is_internal_error() {
        let res = handle(
            &mut BrokenStore,
            "POST",
            ANALYSES_PATH,
            Some(r#"{"fileName":"a.mp3","bpm":"90"}"#),
        );
        assert_eq!(res.status, 500);
        assert!(res.body["message"].is_string());
    }
}
