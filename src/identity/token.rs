//! HS256 signed, time-bounded assertions binding a User id.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Id;
use crate::tprintln;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: Id,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("validity", &self.validity).finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(key: impl Into<Vec<u8>>, validity: Duration) -> Self {
        let key = key.into();
        Self { encoding: EncodingKey::from_secret(&key), decoding: DecodingKey::from_secret(&key), validity }
    }

    pub fn validity(&self) -> Duration { self.validity }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation
    }

    pub fn issue(&self, uid: Id) -> Result<String, TokenError> { self.issue_at(uid, Utc::now()) }

    pub fn issue_at(&self, uid: Id, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims { uid, iat: now.timestamp(), exp: (now + self.validity).timestamp() };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        tprintln!("token.issue uid={} exp={}", uid, claims.exp);
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token.trim(), &self.decoding, &Self::validation())?;
        Ok(data.claims)
    }

    /// Re-sign a still-valid assertion with a fresh window. Credentials are not re-checked.
    pub fn refresh(&self, token: &str) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        self.issue(claims.uid)
    }
}
