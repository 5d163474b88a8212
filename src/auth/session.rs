//! Single-slot session policy.
//!
//! Every account owns at most one live token, stored in
//! `users.current_token`. Login is idempotent while that token is live and
//! silently reissues once it has aged out. Logout and asset access demand the
//! password again *and* a presented token identical to the stored one. A
//! stored token that fails its integrity check is never repaired silently:
//! every operation rejects it and leaves it in place.
//!
//! Each operation runs under a per-username lock so the read, decision and
//! write on `current_token` cannot interleave with another request for the
//! same account.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::assets::{AssetHandle, AssetStore};
use crate::auth::jwt::{JwtService, SignedToken, TokenVerification};
use crate::auth::locks::UserLocks;
use crate::auth::passwords::PasswordService;
use crate::auth::store::AccountStore;
use crate::auth::{AuthError, AuthResult};
use crate::models::User;

/// Where an account's stored token stands at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active(String),
    /// The stored token aged out.
    Lapsed,
    /// The stored token no longer passes the integrity check.
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    /// `false` when the still-live stored token was handed back.
    pub refreshed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    /// There was no live session; nothing the caller could act on.
    AlreadyLoggedOut,
}

pub struct SessionPolicy {
    store: Arc<dyn AccountStore>,
    passwords: Arc<PasswordService>,
    tokens: Arc<JwtService>,
    locks: UserLocks,
}

impl SessionPolicy {
    pub fn new(
        store: Arc<dyn AccountStore>,
        passwords: Arc<PasswordService>,
        tokens: Arc<JwtService>,
    ) -> Self {
        Self {
            store,
            passwords,
            tokens,
            locks: UserLocks::new(),
        }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<SignedToken> {
        let _guard = self.locks.acquire(username).await;

        if self.store.get(username).await?.is_some() {
            log::info!("registration refused for existing user {}", username);
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash = self.hash(password).await?;
        let token = self.tokens.issue_token(username, now)?;
        self.store
            .insert(&User::new(username, password_hash).with_token(token.token.clone()))
            .await?;

        log::info!("registered user {}", username);
        Ok(token)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<LoginOutcome> {
        let _guard = self.locks.acquire(username).await;
        let user = self.authenticate(username, password).await?;

        match self.classify(&user, now) {
            SessionState::Active(token) => {
                log::debug!("login for {} reuses the live session", username);
                return Ok(LoginOutcome {
                    token,
                    refreshed: false,
                });
            }
            SessionState::Corrupt => return Err(AuthError::TokenInvalid),
            SessionState::NoSession | SessionState::Lapsed => {}
        }

        let token = self.tokens.issue_token(username, now)?;
        self.store
            .update_token(username, Some(token.token.as_str()))
            .await?;

        log::info!("issued a new session token for {}", username);
        Ok(LoginOutcome {
            token: token.token,
            refreshed: true,
        })
    }

    pub async fn logout(
        &self,
        username: &str,
        password: &str,
        presented: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<LogoutOutcome> {
        let _guard = self.locks.acquire(username).await;
        let user = self.authenticate(username, password).await?;

        match self.classify(&user, now) {
            SessionState::NoSession => Ok(LogoutOutcome::AlreadyLoggedOut),
            SessionState::Lapsed => {
                self.store.update_token(username, None).await?;
                log::debug!("cleared lapsed session for {}", username);
                Ok(LogoutOutcome::AlreadyLoggedOut)
            }
            SessionState::Corrupt => Err(AuthError::TokenInvalid),
            SessionState::Active(stored) => {
                self.check_presented(username, &stored, presented, now)?;
                self.store.update_token(username, None).await?;
                log::info!("logged out {}", username);
                Ok(LogoutOutcome::LoggedOut)
            }
        }
    }

    /// Gate for protected reads. Without a live session there is nothing the
    /// presented token could match, so it is rejected.
    pub async fn authorize(
        &self,
        username: &str,
        password: &str,
        presented: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let _guard = self.locks.acquire(username).await;
        let user = self.authenticate(username, password).await?;

        match self.classify(&user, now) {
            SessionState::Active(stored) => self.check_presented(username, &stored, presented, now),
            SessionState::NoSession | SessionState::Lapsed | SessionState::Corrupt => {
                Err(AuthError::TokenInvalid)
            }
        }
    }

    pub async fn access(
        &self,
        username: &str,
        password: &str,
        presented: &str,
        resource_id: &str,
        assets: &AssetStore,
        now: DateTime<Utc>,
    ) -> AuthResult<AssetHandle> {
        self.authorize(username, password, presented, now).await?;
        assets.resolve(resource_id).await
    }

    pub fn classify(&self, user: &User, now: DateTime<Utc>) -> SessionState {
        let Some(stored) = user.current_token.as_deref() else {
            return SessionState::NoSession;
        };

        match self.tokens.inspect_token(stored, now) {
            TokenVerification::Valid(_) => SessionState::Active(stored.to_string()),
            TokenVerification::Expired => SessionState::Lapsed,
            TokenVerification::Invalid => {
                log::warn!("stored token for {} fails verification", user.username);
                SessionState::Corrupt
            }
        }
    }

    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        let Some(user) = self.store.get(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify(password, &user.password_hash).await? {
            log::info!("password mismatch for {}", username);
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    fn check_presented(
        &self,
        username: &str,
        stored: &str,
        presented: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let claims = self
            .tokens
            .verify_token(presented, now)
            .map_err(AuthError::public)?;

        if !constant_time_eq(presented.as_bytes(), stored.as_bytes()) || claims.sub != username {
            log::info!("presented token for {} does not match the session", username);
            return Err(AuthError::TokenInvalid);
        }
        Ok(())
    }

    async fn hash(&self, password: &str) -> AuthResult<String> {
        let passwords = Arc::clone(&self.passwords);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || passwords.hash_password(&password)).await?
    }

    async fn verify(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let passwords = Arc::clone(&self.passwords);
        let password = password.to_string();
        let encoded = encoded.to_string();
        let verified =
            tokio::task::spawn_blocking(move || passwords.verify_password(&password, &encoded))
                .await?;
        Ok(verified)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::auth::store::MemoryAccountStore;
    use chrono::{Duration, TimeZone};

    const TTL_SECS: i64 = 600;

    fn test_config() -> AuthConfig {
        AuthConfig {
            issuer: "asset-server-test".into(),
            audience: "asset-api".into(),
            token_ttl_secs: TTL_SECS,
            jwt_secret: "session-policy-test-secret".into(),
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        }
    }

    fn policy_with_store() -> (SessionPolicy, Arc<MemoryAccountStore>) {
        let config = test_config();
        let store = Arc::new(MemoryAccountStore::new());
        let policy = SessionPolicy::new(
            store.clone(),
            Arc::new(PasswordService::from_config(&config).expect("password service")),
            Arc::new(JwtService::from_config(&config).expect("jwt service")),
        );
        (policy, store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid timestamp")
    }

    async fn stored_token(store: &MemoryAccountStore, username: &str) -> Option<String> {
        store
            .get(username)
            .await
            .expect("store read")
            .expect("user exists")
            .current_token
    }

    #[tokio::test]
    async fn register_then_login_then_access() {
        let (policy, store) = policy_with_store();
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("file.txt"), b"contents").expect("write asset");
        let assets = AssetStore::new(dir.path());

        let registered = policy.register("alice", "pw1", t0()).await.expect("register");
        assert_eq!(stored_token(&store, "alice").await, Some(registered.token.clone()));

        let login = policy
            .login("alice", "pw1", t0() + Duration::seconds(5))
            .await
            .expect("login");
        assert_eq!(login.token, registered.token);
        assert!(!login.refreshed);

        let handle = policy
            .access("alice", "pw1", &login.token, "file.txt", &assets, t0() + Duration::seconds(6))
            .await
            .expect("access");
        assert_eq!(handle.name, "file.txt");

        let user = store.get("alice").await.expect("read").expect("exists");
        assert_ne!(user.password_hash, "pw1");
    }

    #[tokio::test]
    async fn register_twice_fails_regardless_of_password() {
        let (policy, _store) = policy_with_store();
        policy.register("alice", "pw1", t0()).await.expect("register");

        for password in ["pw1", "something-else"] {
            assert!(matches!(
                policy.register("alice", password, t0()).await,
                Err(AuthError::AlreadyRegistered)
            ));
        }
    }

    #[tokio::test]
    async fn login_rejects_unknown_user_and_bad_password() {
        let (policy, _store) = policy_with_store();
        policy.register("alice", "pw1", t0()).await.expect("register");

        assert!(matches!(
            policy.login("alice", "nope", t0()).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            policy.login("mallory", "pw1", t0()).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_reissues_after_expiry() {
        let (policy, store) = policy_with_store();
        let original = policy.register("bob", "pw2", t0()).await.expect("register");

        let later = t0() + Duration::seconds(TTL_SECS);
        let login = policy.login("bob", "pw2", later).await.expect("login");
        assert!(login.refreshed);
        assert_ne!(login.token, original.token);
        assert_eq!(stored_token(&store, "bob").await, Some(login.token.clone()));

        let again = policy
            .login("bob", "pw2", later + Duration::seconds(1))
            .await
            .expect("second login");
        assert_eq!(again.token, login.token);
        assert!(!again.refreshed);
    }

    #[tokio::test]
    async fn logout_clears_and_blocks_further_access() {
        let (policy, store) = policy_with_store();
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("file.txt"), b"contents").expect("write asset");
        let assets = AssetStore::new(dir.path());

        let t1 = policy.register("alice", "pw1", t0()).await.expect("register").token;
        let login = policy.login("alice", "pw1", t0()).await.expect("login");
        assert_eq!(login.token, t1);

        let outcome = policy
            .logout("alice", "pw1", &t1, t0())
            .await
            .expect("logout");
        assert_eq!(outcome, LogoutOutcome::LoggedOut);
        assert_eq!(stored_token(&store, "alice").await, None);

        assert!(matches!(
            policy
                .access("alice", "pw1", &t1, "file.txt", &assets, t0())
                .await,
            Err(AuthError::TokenInvalid)
        ));

        let again = policy
            .logout("alice", "pw1", &t1, t0())
            .await
            .expect("second logout is benign");
        assert_eq!(again, LogoutOutcome::AlreadyLoggedOut);
    }

    #[tokio::test]
    async fn logout_requires_password_first() {
        let (policy, store) = policy_with_store();
        let token = policy.register("alice", "pw1", t0()).await.expect("register").token;

        assert!(matches!(
            policy.logout("alice", "wrong", &token, t0()).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert_eq!(stored_token(&store, "alice").await, Some(token));
    }

    #[tokio::test]
    async fn logout_with_lapsed_session_clears_it() {
        let (policy, store) = policy_with_store();
        let token = policy.register("alice", "pw1", t0()).await.expect("register").token;

        let outcome = policy
            .logout("alice", "pw1", "garbage", t0() + Duration::seconds(TTL_SECS + 1))
            .await
            .expect("lapsed logout is benign");
        assert_eq!(outcome, LogoutOutcome::AlreadyLoggedOut);
        assert_eq!(stored_token(&store, "alice").await, None);
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn logout_rejects_foreign_garbled_or_stale_tokens() {
        let (policy, store) = policy_with_store();
        let alice_first = policy.register("alice", "pw1", t0()).await.expect("register").token;
        let bob = policy.register("bob", "pw2", t0()).await.expect("register").token;

        let relogin_at = t0() + Duration::seconds(TTL_SECS);
        let alice_second = policy
            .login("alice", "pw1", relogin_at)
            .await
            .expect("relogin")
            .token;
        assert_ne!(alice_first, alice_second);

        let now = relogin_at + Duration::seconds(1);
        for presented in [alice_first.as_str(), bob.as_str(), "garbage", ""] {
            assert!(matches!(
                policy.logout("alice", "pw1", presented, now).await,
                Err(AuthError::TokenInvalid)
            ));
        }
        assert_eq!(stored_token(&store, "alice").await, Some(alice_second));
    }

    #[tokio::test]
    async fn access_without_live_session_is_rejected() {
        let (policy, store) = policy_with_store();
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("file.txt"), b"contents").expect("write asset");
        let assets = AssetStore::new(dir.path());

        let token = policy.register("alice", "pw1", t0()).await.expect("register").token;
        let lapsed = t0() + Duration::seconds(TTL_SECS);
        assert!(matches!(
            policy
                .access("alice", "pw1", &token, "file.txt", &assets, lapsed)
                .await,
            Err(AuthError::TokenInvalid)
        ));
        // access never mutates the stored token
        assert_eq!(stored_token(&store, "alice").await, Some(token));
    }

    #[tokio::test]
    async fn access_reports_missing_files_after_auth() {
        let (policy, _store) = policy_with_store();
        let dir = tempfile::tempdir().expect("temp dir");
        let assets = AssetStore::new(dir.path());

        let token = policy.register("alice", "pw1", t0()).await.expect("register").token;
        assert!(matches!(
            policy
                .access("alice", "pw1", &token, "missing.txt", &assets, t0())
                .await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(
            policy
                .access("alice", "bad", &token, "missing.txt", &assets, t0())
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn stored_token_from_rotated_key_is_rejected_and_kept() {
        let (policy, store) = policy_with_store();
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("file.txt"), b"contents").expect("write asset");
        let assets = AssetStore::new(dir.path());
        let hash = PasswordService::from_config(&test_config())
            .expect("password service")
            .hash_password("pw1")
            .expect("hash");
        let stale = "signed.with.old-key";
        store
            .insert(&User::new("carol", hash).with_token(stale))
            .await
            .expect("insert");

        let user = store.get("carol").await.expect("read").expect("exists");
        assert_eq!(policy.classify(&user, t0()), SessionState::Corrupt);

        assert!(matches!(
            policy.login("carol", "pw1", t0()).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            policy.logout("carol", "pw1", stale, t0()).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            policy
                .access("carol", "pw1", stale, "file.txt", &assets, t0())
                .await,
            Err(AuthError::TokenInvalid)
        ));
        assert_eq!(stored_token(&store, "carol").await, Some(stale.to_string()));

        assert!(matches!(
            policy.login("carol", "wrong", t0()).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_logins_issue_a_single_token() {
        let (policy, store) = policy_with_store();
        let policy = Arc::new(policy);
        policy.register("bob", "pw2", t0()).await.expect("register");
        let later = t0() + Duration::seconds(TTL_SECS * 2);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let policy = Arc::clone(&policy);
            handles.push(tokio::spawn(async move {
                policy.login("bob", "pw2", later).await
            }));
        }

        let mut tokens = Vec::new();
        let mut refreshed = 0;
        for handle in handles {
            let outcome = handle.await.expect("task").expect("login");
            if outcome.refreshed {
                refreshed += 1;
            }
            tokens.push(outcome.token);
        }

        assert_eq!(refreshed, 1);
        tokens.dedup();
        assert_eq!(tokens.len(), 1);
        assert_eq!(stored_token(&store, "bob").await, tokens.pop());
    }

    #[test]
    fn constant_time_eq_matches_bytes() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
