use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user has an account already")]
    AlreadyRegistered,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token")]
    TokenInvalid,
    #[error("file not found")]
    NotFound,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("background task failed: {0}")]
    Task(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::AlreadyRegistered
            | AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::TokenInvalid => Status::Unauthorized,
            AuthError::NotFound => Status::NotFound,
            AuthError::Config(_)
            | AuthError::Io(_)
            | AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Task(_) => Status::InternalServerError,
        }
    }

    /// Collapse codec-level distinctions that callers must not observe.
    ///
    /// An expired presented token is reported as an invalid one at the HTTP
    /// boundary.
    pub fn public(self) -> Self {
        match self {
            AuthError::TokenExpired => AuthError::TokenInvalid,
            other => other,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == Status::InternalServerError
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_statuses() {
        assert_eq!(AuthError::AlreadyRegistered.status(), Status::Unauthorized);
        assert_eq!(AuthError::InvalidCredentials.status(), Status::Unauthorized);
        assert_eq!(AuthError::TokenInvalid.status(), Status::Unauthorized);
        assert_eq!(AuthError::NotFound.status(), Status::NotFound);
        assert_eq!(
            AuthError::Config("missing".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn expired_collapses_to_invalid_publicly() {
        assert!(matches!(
            AuthError::TokenExpired.public(),
            AuthError::TokenInvalid
        ));
        assert!(matches!(
            AuthError::InvalidCredentials.public(),
            AuthError::InvalidCredentials
        ));
    }
}
