//! HTTP route handlers outside the auth module.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive the
//! OpenAPI document served next to the API.

pub mod assets;
pub mod health;
