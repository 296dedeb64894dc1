//! JSON response envelope shared by the read/write/list/delete endpoints.
//!
//! Handlers produce a typed [`Outcome`]; it is turned into an [`Envelope`]
//! only at the HTTP boundary. Serialization always goes through
//! [`Envelope::normalized`], which forces `status` to "error" whenever an
//! `error` field is present.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<usize>,
}

impl Envelope {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            result: None,
            info: None,
            error: None,
            rows_affected: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            error: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn with_rows_affected(mut self, rows: usize) -> Self {
        self.rows_affected = Some(rows);
        self
    }

    /// Final step before serialization: an error field implies status "error".
    pub fn normalized(mut self) -> Self {
        if self.error.is_some() {
            self.status = Status::Error;
        }
        self
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.normalized())).into_response()
    }
}

/// An envelope sent with a non-200 status code (rejected request input).
#[derive(Debug)]
pub struct Rejected(pub StatusCode, pub Envelope);

impl IntoResponse for Rejected {
    fn into_response(self) -> Response {
        (self.0, Json(self.1.normalized())).into_response()
    }
}

/// Typed result of one store-backed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    /// Absence of data; reported as success with an informational note.
    NotFound(&'static str),
    Failed(String),
}

impl<T> Outcome<T> {
    /// Convert to the wire envelope, building the success case with `on_ok`.
    pub fn into_envelope(self, on_ok: impl FnOnce(T) -> Envelope) -> Envelope {
        match self {
            Outcome::Ok(value) => on_ok(value),
            Outcome::NotFound(note) => Envelope::ok().with_info(note),
            Outcome::Failed(message) => Envelope::error(message),
        }
    }
}
