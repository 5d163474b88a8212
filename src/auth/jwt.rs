use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of checking a token string at a given instant.
///
/// `Expired` is only reported for tokens whose signature and claims check
/// out; anything else that fails is `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    Valid(TokenClaims),
    Expired,
    Invalid,
}

impl TokenVerification {
    pub fn into_result(self) -> AuthResult<TokenClaims> {
        match self {
            TokenVerification::Valid(claims) => Ok(claims),
            TokenVerification::Expired => Err(AuthError::TokenExpired),
            TokenVerification::Invalid => Err(AuthError::TokenInvalid),
        }
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    token_ttl: Duration,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Config("jwt secret must not be empty".into()));
        }
        if config.token_ttl_secs <= 0 {
            return Err(AuthError::Config("token ttl must be positive".into()));
        }

        let secret_bytes = config.jwt_secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        // Expiry is checked against the caller-supplied instant in `inspect_token`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            token_ttl: Duration::seconds(config.token_ttl_secs),
        })
    }

    pub fn issue_token(&self, subject: &str, now: DateTime<Utc>) -> AuthResult<SignedToken> {
        let expires_at = now + self.token_ttl;

        let claims = TokenClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SignedToken {
            token,
            issued_at: now,
            expires_at,
        })
    }

    pub fn inspect_token(&self, token: &str, now: DateTime<Utc>) -> TokenVerification {
        let claims = match decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(err) => {
                log::debug!("rejecting token: {}", err);
                return TokenVerification::Invalid;
            }
        };

        if now.timestamp() >= claims.exp {
            TokenVerification::Expired
        } else {
            TokenVerification::Valid(claims)
        }
    }

    pub fn verify_token(&self, token: &str, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        self.inspect_token(token, now).into_result()
    }
}
