//! REST endpoints for the domain settings history.
//!
//! GET /read — newest blob of the authenticated user
//! POST /write — append a new blob (form field `data`)
//! GET /list — metadata of every stored version
//! GET|POST /delete — remove the whole history

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::domains::envelope::{Envelope, Outcome, Rejected};
use crate::domains::store::{format_timestamp, BlobStore, StoreError};
use crate::state::AppState;

/// Informational note for users that never stored anything.
pub const NO_DATA_NOTE: &str = "no data for this user";

#[derive(Debug, Deserialize)]
pub struct WriteForm {
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VersionEntry {
    pub id: i64,
    pub created: String,
    pub size: i64,
}

/// Run a store call on the blocking pool, bounded by the configured timeout.
async fn run_store<T, F>(state: &AppState, op: F) -> Result<T, String>
where
    F: FnOnce(BlobStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    let task = tokio::task::spawn_blocking(move || op(store));

    let joined = match state.store_timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| "store operation timed out".to_string())?,
        None => task.await,
    };

    joined
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| e.to_string())
}

fn failed<T>(op: &str, user: &str, error: String) -> Outcome<T> {
    tracing::error!("{} failed for {}: {}", op, user, error);
    Outcome::Failed(error)
}

/// GET /read
///
/// Returns the newest blob as `result`. A user without data gets status "ok"
/// and an `info` note instead.
pub async fn read_domains(State(state): State<AppState>, user: AuthUser) -> Envelope {
    let user_id = user.username.clone();
    let outcome = match run_store(&state, move |store| store.read_latest(&user_id)).await {
        Ok(Some(data)) => Outcome::Ok(data),
        Ok(None) => Outcome::NotFound(NO_DATA_NOTE),
        Err(e) => failed("read", &user.username, e),
    };

    outcome.into_envelope(|data| {
        Envelope::ok().with_result(serde_json::Value::String(
            String::from_utf8_lossy(&data).into_owned(),
        ))
    })
}

/// POST /write
///
/// Appends the `data` form field as a new version. Literal spaces are turned
/// back into `+`: older clients post base64 without form-encoding it.
/// Bodies that are not urlencoded forms (including multipart) get a 400
/// error envelope.
pub async fn write_domains(
    State(state): State<AppState>,
    user: AuthUser,
    form: Result<Form<WriteForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            tracing::warn!("write from {} rejected: {}", user.username, rejection);
            return Rejected(StatusCode::BAD_REQUEST, Envelope::error(rejection.body_text()))
                .into_response();
        }
    };
    let Some(data) = form.data else {
        return Rejected(
            StatusCode::BAD_REQUEST,
            Envelope::error("missing form field 'data'"),
        )
        .into_response();
    };

    let data = data.replace(' ', "+");
    if data.len() > state.max_blob_bytes {
        return Rejected(
            StatusCode::PAYLOAD_TOO_LARGE,
            Envelope::error(format!(
                "data is {} bytes, maximum is {} bytes",
                data.len(),
                state.max_blob_bytes
            )),
        )
        .into_response();
    }

    let user_id = user.username.clone();
    let outcome = match run_store(&state, move |store| store.write(&user_id, data.as_bytes())).await {
        Ok(id) => Outcome::Ok(id),
        Err(e) => failed("write", &user.username, e),
    };

    outcome
        .into_envelope(|id| {
            tracing::debug!("{} wrote version {}", user.username, id);
            Envelope::ok()
        })
        .into_response()
}

/// GET /list
///
/// Returns `[{id, created, size}]` for every stored version, oldest first.
pub async fn list_domains(State(state): State<AppState>, user: AuthUser) -> Envelope {
    let user_id = user.username.clone();
    let outcome = match run_store(&state, move |store| store.list_versions(&user_id)).await {
        Ok(rows) => Outcome::Ok(rows),
        Err(e) => failed("list", &user.username, e),
    };

    outcome.into_envelope(|rows| {
        let entries: Vec<VersionEntry> = rows
            .into_iter()
            .map(|row| VersionEntry {
                id: row.id,
                created: format_timestamp(row.created_at),
                size: row.size,
            })
            .collect();
        Envelope::ok().with_result(serde_json::json!(entries))
    })
}

/// GET|POST /delete
///
/// Removes every stored version and reports the count as `rowsAffected`.
pub async fn delete_domains(State(state): State<AppState>, user: AuthUser) -> Envelope {
    let user_id = user.username.clone();
    let outcome = match run_store(&state, move |store| store.delete_all(&user_id)).await {
        Ok(count) => Outcome::Ok(count),
        Err(e) => failed("delete", &user.username, e),
    };

    outcome.into_envelope(|count| {
        tracing::info!("Deleted {} versions of {}", count, user.username);
        Envelope::ok().with_rows_affected(count)
    })
}
