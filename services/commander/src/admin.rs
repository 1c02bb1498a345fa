//! HTTP Basic authentication for the admin routes.

use crate::error::ApiError;
use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Configured admin account.
#[derive(Clone)]
pub struct AdminCredentials {
    user: String,
    pass: Zeroizing<String>,
}

impl AdminCredentials {
    pub fn new(user: impl Into<String>, pass: Zeroizing<String>) -> Self {
        Self {
            user: user.into(),
            pass,
        }
    }

    /// Accept only an `Authorization: Basic` header carrying the configured
    /// user and password.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let encoded = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "))
            .ok_or(ApiError::AdminAuth)?;

        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|_| ApiError::AdminAuth)?);
        let text = std::str::from_utf8(&decoded).map_err(|_| ApiError::AdminAuth)?;
        let (user, pass) = text.split_once(':').ok_or(ApiError::AdminAuth)?;

        let user_ok = user.as_bytes().ct_eq(self.user.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.pass.as_bytes());
        if bool::from(user_ok & pass_ok) {
            Ok(())
        } else {
            Err(ApiError::AdminAuth)
        }
    }
}
