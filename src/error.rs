//! JSON error bodies shared by every route and catcher.

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Request, catch};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

pub type ErrorReply = status::Custom<Json<ErrorResponse>>;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Turn a domain or infrastructure failure into a reply, hiding whether a
/// presented token was expired or forged.
pub fn respond_error(err: AuthError) -> ErrorReply {
    if err.is_internal() {
        log::error!("request failed: {}", err);
    }
    let err = err.public();
    let status = err.status();
    let message = if err.is_internal() {
        "internal server error".to_string()
    } else {
        err.to_string()
    };
    respond_message(status, message)
}

pub fn respond_message(status: Status, message: impl Into<String>) -> ErrorReply {
    status::Custom(
        status,
        Json(ErrorResponse {
            status: status.code,
            message: message.into(),
        }),
    )
}

/// Fallback for guard and data failures (missing bearer header, bad JSON,
/// unknown routes) so clients always get the same error shape.
#[catch(default)]
pub fn json_catcher(status: Status, request: &Request<'_>) -> ErrorReply {
    log::debug!("{} {} -> {}", request.method(), request.uri(), status.code);
    let message = match status.code {
        401 => "invalid token".to_string(),
        _ => status.reason_lossy().to_lowercase(),
    };
    respond_message(status, message)
}
