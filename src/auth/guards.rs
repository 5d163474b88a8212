use rocket::Request;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::{AuthError, AuthResult};

/// Raw bearer token from the `Authorization` header.
///
/// Only the header shape is checked here; signature, expiry and the match
/// against the stored session are the session policy's job.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct BearerToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match bearer_token_from_request(request) {
            Ok(token) => Outcome::Success(BearerToken(token.to_string())),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

fn bearer_token_from_request<'a>(request: &'a Request<'_>) -> AuthResult<&'a str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::TokenInvalid)?;
    parse_bearer(header)
}

fn parse_bearer(header: &str) -> AuthResult<&str> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::TokenInvalid)
    }
}
