use chrono::Utc;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, post};
use rocket_okapi::openapi;

use crate::auth::guards::BearerToken;
use crate::auth::{AuthState, LogoutOutcome};
use crate::error::{ErrorReply, respond_error, respond_message};
use crate::models::{Credentials, TokenResponse};

type AuthRouteResult<T> = Result<status::Custom<Json<T>>, ErrorReply>;

/// Create an account and open its first session.
#[openapi(tag = "Auth")]
#[post("/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    payload: Json<Credentials>,
) -> AuthRouteResult<TokenResponse> {
    require_credentials(&payload)?;

    let token = state
        .sessions
        .register(&payload.username, &payload.password, Utc::now())
        .await
        .map_err(respond_error)?;

    Ok(status::Custom(
        Status::Created,
        Json(TokenResponse { token: token.token }),
    ))
}

/// Return the live session token, issuing a fresh one if the last lapsed.
#[openapi(tag = "Auth")]
#[post("/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    payload: Json<Credentials>,
) -> AuthRouteResult<TokenResponse> {
    require_credentials(&payload)?;

    let outcome = state
        .sessions
        .login(&payload.username, &payload.password, Utc::now())
        .await
        .map_err(respond_error)?;

    Ok(status::Custom(
        Status::Accepted,
        Json(TokenResponse {
            token: outcome.token,
        }),
    ))
}

#[openapi(tag = "Auth")]
#[post("/logout", data = "<payload>")]
pub async fn logout(
    state: &State<AuthState>,
    token: BearerToken,
    payload: Json<Credentials>,
) -> Result<Status, ErrorReply> {
    require_credentials(&payload)?;

    let outcome = state
        .sessions
        .logout(&payload.username, &payload.password, &token.0, Utc::now())
        .await
        .map_err(respond_error)?;

    if outcome == LogoutOutcome::AlreadyLoggedOut {
        log::debug!("logout for {} had no live session", payload.username);
    }
    Ok(Status::Accepted)
}

pub(crate) fn require_credentials(credentials: &Credentials) -> Result<(), ErrorReply> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(respond_message(
            Status::BadRequest,
            "username and password are required",
        ));
    }
    Ok(())
}
