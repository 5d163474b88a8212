use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub token_ttl_secs: i64,
    pub jwt_secret: String,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let issuer =
            std::env::var("ASSET_JWT_ISSUER").unwrap_or_else(|_| "asset-server".into());
        let audience =
            std::env::var("ASSET_JWT_AUDIENCE").unwrap_or_else(|_| "asset-api".into());
        let token_ttl_secs = env_number("ASSET_TOKEN_TTL_SECS").unwrap_or(30 * 60);
        let jwt_secret = std::env::var("ASSET_JWT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AuthError::Config("ASSET_JWT_SECRET is required".into()))?;
        let argon2_memory_kib = env_number("ASSET_ARGON2_MEMORY_KIB").unwrap_or(19 * 1024);
        let argon2_iterations = env_number("ASSET_ARGON2_ITERATIONS").unwrap_or(2);
        let argon2_parallelism = env_number("ASSET_ARGON2_PARALLELISM").unwrap_or(1);

        if token_ttl_secs <= 0 {
            return Err(AuthError::Config(
                "ASSET_TOKEN_TTL_SECS must be positive".into(),
            ));
        }

        Ok(Self {
            issuer,
            audience,
            token_ttl_secs,
            jwt_secret,
            argon2_memory_kib,
            argon2_iterations,
            argon2_parallelism,
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
