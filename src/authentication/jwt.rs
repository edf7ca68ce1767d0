use std::sync::Arc;

use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::{Error, HtmlError};
use crate::schema::{Id, User};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            email: value.email,
            is_staff: value.is_staff,
            is_superuser: value.is_superuser,
        }
    }
}

/// Signing key and lifetime for bearer tokens.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Arc<[u8]>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            secret: Arc::from(secret),
            lifetime,
        }
    }

    fn key(&self) -> Result<Hmac<Sha256>, Error> {
        Hmac::new_from_slice(&self.secret).map_err(|e| {
            log::error!("Invalid signing key: {e}");
            HtmlError::InternalServerError.default()
        })
    }

    pub fn generate_jwt_session(&self, user: &User) -> Result<String, Error> {
        let claims = JwtSessionData::new(user, self.lifetime);

        claims.sign_with_key(&self.key()?).map_err(|e| {
            log::error!("Failed to sign session: {e}");
            HtmlError::InternalServerError.default()
        })
    }

    pub fn verify_jwt_session(&self, token: &str) -> Result<JwtSessionData, Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key()?)
            .map_err(|_| HtmlError::Unauthorized.new("Invalid token"))?;

        if session.is_expired() {
            return Err(HtmlError::Unauthorized.new("Token expired"));
        }
        Ok(session)
    }
}
