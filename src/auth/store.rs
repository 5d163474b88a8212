//! Account persistence consumed by the session policy.

use std::collections::HashMap;

use parking_lot::RwLock;
use rocket_db_pools::sqlx::{self, PgPool};

use crate::auth::{AuthError, AuthResult};
use crate::models::User;

#[rocket::async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, username: &str) -> AuthResult<Option<User>>;

    /// Fails with [`AuthError::AlreadyRegistered`] when the username is taken.
    async fn insert(&self, user: &User) -> AuthResult<()>;

    async fn update_token(&self, username: &str, token: Option<&str>) -> AuthResult<()>;
}

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl AccountStore for PgAccountStore {
    async fn get(&self, username: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT username, password_hash, current_token FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert(&self, user: &User) -> AuthResult<()> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, current_token) VALUES ($1, $2, $3)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.current_token.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AuthError::AlreadyRegistered)
            }
            Err(err) => Err(AuthError::from(err)),
        }
    }

    async fn update_token(&self, username: &str, token: Option<&str>) -> AuthResult<()> {
        let result = sqlx::query(
            "UPDATE users SET current_token = $1, updated_at = NOW() WHERE username = $2",
        )
        .bind(token)
        .bind(username)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::Sqlx(sqlx::Error::RowNotFound));
        }
        Ok(())
    }
}

/// Process-local store for tests and throwaway instances.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[rocket::async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn insert(&self, user: &User) -> AuthResult<()> {
        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(AuthError::AlreadyRegistered);
        }
        users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn update_token(&self, username: &str, token: Option<&str>) -> AuthResult<()> {
        let mut users = self.users.write();
        let user = users
            .get_mut(username)
            .ok_or(AuthError::Sqlx(sqlx::Error::RowNotFound))?;
        user.current_token = token.map(str::to_string);
        Ok(())
    }
}
