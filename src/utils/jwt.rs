use jiff::Timestamp;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Default token lifetime in hours
pub const DEFAULT_EXPIRATION_HOURS: i64 = 24;

/// JWT claims carried by an authentication token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (caller identifier)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Role names
    #[serde(default)]
    pub role: Vec<String>,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration time (unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Creates claims valid for `expiration_hours` from now.
    pub fn new(sub: String, name: String, role: Vec<String>, expiration_hours: i64) -> Self {
        let iat = Timestamp::now().as_second();
        let exp = iat.saturating_add(expiration_hours.saturating_mul(3600));
        Self {
            sub,
            name,
            role,
            iat,
            exp,
        }
    }
}

/// Role set carried by a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRoles {
    pub roles: Vec<String>,
}

impl TokenRoles {
    pub fn new(roles: Vec<String>) -> Self {
        Self { roles }
    }

    /// Case-insensitive membership test.
    pub fn check(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Caller identity that can be signed into, and read back from, an HS256 token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub subject: String,
    pub name: String,
    pub roles: TokenRoles,
    /// Set once the token has been decoded
    pub expiration: Option<Timestamp>,
    claims: Option<Map<String, Value>>,
}

impl AuthToken {
    pub fn new(subject: impl Into<String>, name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            name: name.into(),
            roles: TokenRoles::new(roles),
            expiration: None,
            claims: None,
        }
    }

    /// Signs the token with `secret`, valid for `expiration_hours` from now.
    ///
    /// # Example
    /// ```
    /// use ori_kit::utils::jwt::AuthToken;
    ///
    /// let token = AuthToken::new("42", "Ada", vec!["admin".into()])
    ///     .encode("a-long-and-random-signing-secret!", 24)
    ///     .unwrap();
    /// let decoded = AuthToken::decode(&token, "a-long-and-random-signing-secret!").unwrap();
    /// assert!(decoded.roles.check("ADMIN"));
    /// ```
    pub fn encode(&self, secret: &str, expiration_hours: i64) -> AppResult<String> {
        let claims = Claims::new(
            self.subject.clone(),
            self.name.clone(),
            self.roles.roles.clone(),
            expiration_hours,
        );

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal {
            source: anyhow::anyhow!("Failed to generate token: {}", e),
        })
    }

    /// Verifies `token` against `secret` and reads the identity out of it.
    ///
    /// Only HMAC algorithms are accepted. Expired, malformed or badly signed
    /// tokens fail with `AppError::Unauthorized`.
    pub fn decode(token: &str, secret: &str) -> AppResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_required_spec_claims(&["exp", "sub"]);

        let raw = decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::unauthorized("Token has expired"),
            ErrorKind::InvalidSignature => AppError::unauthorized("Invalid token signature"),
            ErrorKind::InvalidAlgorithm => AppError::unauthorized("Unexpected signing method"),
            ErrorKind::InvalidToken => AppError::unauthorized("Invalid token"),
            _ => AppError::unauthorized(format!("Token validation failed: {}", e)),
        })?;

        let claims: Claims = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| AppError::unauthorized(format!("Invalid token claims: {}", e)))?;

        Ok(Self {
            subject: claims.sub,
            name: claims.name,
            roles: TokenRoles::new(claims.role),
            expiration: Timestamp::from_second(claims.exp).ok(),
            claims: Some(raw),
        })
    }

    /// Whether the decoded expiration lies in the past. Tokens that were never
    /// decoded have no expiration and are not expired.
    pub fn is_expired(&self) -> bool {
        self.expiration
            .is_some_and(|expiration| expiration <= Timestamp::now())
    }

    /// Raw value of a claim, `Value::Null` when the claim is absent.
    ///
    /// # Errors
    /// Fails when the token was built locally rather than decoded.
    pub fn claim(&self, name: &str) -> AppResult<Value> {
        let claims = self.claims.as_ref().ok_or_else(|| AppError::Internal {
            source: anyhow::anyhow!("Claims are empty"),
        })?;
        Ok(claims.get(name).cloned().unwrap_or(Value::Null))
    }
}
