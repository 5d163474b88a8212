//! Protected file downloads.

use chrono::Utc;
use rocket::fs::NamedFile;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

use crate::assets::AssetStore;
use crate::auth::guards::BearerToken;
use crate::auth::routes::require_credentials;
use crate::auth::{AuthError, AuthState};
use crate::error::{ErrorReply, respond_error};
use crate::models::Credentials;

/// Stream a file from the assets directory.
///
/// The caller re-sends its credentials in the body and the live session
/// token as a bearer header.
#[openapi(tag = "Assets")]
#[get("/assets/<file>", data = "<payload>")]
pub async fn get_asset(
    file: String,
    state: &State<AuthState>,
    assets: &State<AssetStore>,
    token: BearerToken,
    payload: Json<Credentials>,
) -> Result<NamedFile, ErrorReply> {
    require_credentials(&payload)?;

    let handle = state
        .sessions
        .access(
            &payload.username,
            &payload.password,
            &token.0,
            &file,
            assets.inner(),
            Utc::now(),
        )
        .await
        .map_err(respond_error)?;

    NamedFile::open(&handle.path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            respond_error(AuthError::NotFound)
        } else {
            respond_error(AuthError::Io(err))
        }
    })
}
