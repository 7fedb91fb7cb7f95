/*!
Interoperation between the client and the service.

(Not the service and the record store; that's covered by `store` and
`auth`.) Every endpoint answers with the same JSON envelope:

```json
{ "success": true, "data": { ... }, "message": "..." }
```

and failures map onto it through `ApiError`.
*/
use std::sync::Arc;

use axum::{
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::DateTime;
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthResult;
use crate::config::Glob;
use crate::store::DbError;

pub mod auth;
pub mod students;

/// Headers carrying the session issued at login.
pub const UNAME_HEADER: &str = "x-rollbook-uname";
pub const KEY_HEADER: &str = "x-rollbook-key";

static TEXT_500: &str =
    "Something went wrong on our end; no more helpful information is available.";

/// What a request can die of, and the status each maps to.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or out-of-range fields, malformed ids, unknown login
    /// types.
    Validation(String),
    /// Bad credentials or a missing/invalid session key.
    Auth(String),
    /// Registration without prior enrollment.
    Forbidden(String),
    /// Unknown record id.
    NotFound(String),
    /// Duplicate studentId or uname.
    Conflict(String),
    /// The record store misbehaved; details go to the log, not the
    /// client.
    Db(DbError),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> ApiError { ApiError::Db(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Auth(m) => (StatusCode::UNAUTHORIZED, m),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Db(e) => {
                log::error!("Record store error: {}", e.display());
                (StatusCode::INTERNAL_SERVER_ERROR, TEXT_500.to_owned())
            },
        };

        (
            code,
            Json(json!({ "success": false, "message": message }))
        ).into_response()
    }
}

/// The success side of the envelope. `data` is omitted (not null) when
/// there's nothing to carry.
pub fn respond_ok<S: Serialize>(
    code: StatusCode,
    data: Option<S>,
    message: &str,
) -> Response {
    let body = match data {
        Some(data) => json!({
            "success": true,
            "data": data,
            "message": message,
        }),
        None => json!({
            "success": true,
            "message": message,
        }),
    };

    (code, Json(body)).into_response()
}

/**
Middleware over the student routes: the request must carry the uname
and session-key headers issued at login, and the key must still be the
account's live one.
*/
pub async fn key_authenticate<B>(
    req: Request<B>,
    next: Next<B>,
) -> Response {
    let glob: Arc<Glob> = match req.extensions().get::<Arc<Glob>>() {
        Some(glob) => glob.clone(),
        None => {
            log::error!("key_authenticate(): no Glob in request extensions.");
            return ApiError::Db(DbError::from(
                "Global state missing from request.".to_owned()
            )).into_response();
        },
    };

    let uname = match req.headers().get(UNAME_HEADER) {
        Some(u_val) => match u_val.to_str() {
            Ok(s) => s.to_owned(),
            Err(e) => {
                log::error!(
                    "Failed converting uname value {:?} to &str: {}",
                    u_val, &e
                );
                return ApiError::Validation(format!(
                    "{} value unrecognizable.", UNAME_HEADER
                )).into_response();
            },
        },
        None => {
            return ApiError::Validation(format!(
                "Request must have a {} header.", UNAME_HEADER
            )).into_response();
        },
    };

    let key = match req.headers().get(KEY_HEADER) {
        Some(k_val) => match k_val.to_str() {
            Ok(s) => s.to_owned(),
            Err(e) => {
                log::error!(
                    "Failed converting key value {:?} to &str: {}",
                    k_val, &e
                );
                return ApiError::Validation(format!(
                    "{} value unrecognizable.", KEY_HEADER
                )).into_response();
            },
        },
        None => {
            return ApiError::Validation(format!(
                "Request must have a {} header.", KEY_HEADER
            )).into_response();
        },
    };

    match glob.auth.check_key(&uname, &key).await {
        Err(e) => {
            log::error!(
                "auth::Db::check_key( {:?}, [ key ] ) returned error: {}",
                &uname, e.display()
            );
            ApiError::Db(e).into_response()
        },
        Ok(AuthResult::InvalidKey) => {
            ApiError::Auth(
                "Invalid or expired session; please log in again.".to_owned()
            ).into_response()
        },
        Ok(AuthResult::Ok) => next.run(req).await,
        Ok(x) => {
            log::warn!(
                "auth::Db::check_key() returned {:?}, which should never happen.",
                &x
            );
            ApiError::Db(DbError::from(format!(
                "Unexpected auth result: {:?}", &x
            ))).into_response()
        },
    }
}

/// Liveness marker; the one endpoint outside the envelope.
pub async fn health() -> Response {
    let body = json!({
        "status": "ok",
        "message": "Service is running.",
        "timestamp": DateTime::now().try_to_rfc3339_string().ok(),
    });

    (StatusCode::OK, Json(body)).into_response()
}
