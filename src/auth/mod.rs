//! Authentication module: configuration, password hashing, token minting,
//! the single-slot session policy, account storage, and HTTP route handlers.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod locks;
pub mod passwords;
pub mod routes;
pub mod session;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::BearerToken;
pub use jwt::{JwtService, SignedToken, TokenClaims, TokenVerification};
pub use passwords::PasswordService;
pub use session::{LoginOutcome, LogoutOutcome, SessionPolicy, SessionState};
pub use store::{AccountStore, MemoryAccountStore, PgAccountStore};

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub sessions: Arc<SessionPolicy>,
}

impl AuthState {
    pub fn new(config: AuthConfig, store: Arc<dyn AccountStore>) -> AuthResult<Self> {
        let password_service = PasswordService::from_config(&config)?;
        let jwt_service = JwtService::from_config(&config)?;
        let sessions = SessionPolicy::new(
            store,
            Arc::new(password_service),
            Arc::new(jwt_service),
        );

        Ok(Self {
            config,
            sessions: Arc::new(sessions),
        })
    }
}
