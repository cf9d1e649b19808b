use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::Deserialize;

use crate::errors::{CustomResult, Error};

/// Config key holding the auth token handed out by the login endpoint.
pub const TOKEN_KEY: &str = "robis-cookie";
/// Config key holding the serialized local-storage snapshot replayed into
/// the embedded browser.
pub const LOCAL_STORAGE_KEY: &str = "robis-ls";

/// Durable key-value configuration owned by the host application.
pub trait ConfigStore {
    fn get_value(&self, key: &str) -> Option<String>;
    fn set_value(&mut self, key: &str, value: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub local_storage: String,
}

pub fn set_credential(store: &mut dyn ConfigStore, token: &str, local_storage: &str) {
    store.set_value(TOKEN_KEY, token);
    store.set_value(LOCAL_STORAGE_KEY, local_storage);
}

pub fn get_credential(store: &dyn ConfigStore) -> Option<Credential> {
    let token = store.get_value(TOKEN_KEY)?;
    let local_storage = store.get_value(LOCAL_STORAGE_KEY)?;
    Some(Credential {
        token,
        local_storage,
    })
}

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Reads the expiry claim out of the token payload. The signature is not
/// checked on purpose: the token only travels back to the service that
/// minted it, and that service verifies it on every request; this side
/// has no key to verify with.
pub fn token_expiry(token: &str) -> CustomResult<i64> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::MalformedRemoteData {
            detail: "token has no payload segment".to_string(),
        })?;
    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::MalformedRemoteData {
            detail: format!("token payload is not base64: {e}"),
        })?;
    let claims: Claims = serde_json::from_slice(&raw).map_err(|e| Error::MalformedRemoteData {
        detail: format!("token payload is not a claim set: {e}"),
    })?;
    Ok(claims.exp)
}

/// An unreadable token counts as expired so the caller re-prompts for login
/// instead of sending a dead credential around.
pub fn is_expired(token: &str) -> bool {
    match token_expiry(token) {
        Ok(exp) => Utc::now().timestamp() >= exp,
        Err(_) => true,
    }
}

/// Startup check: a stored but expired credential means the host should
/// prompt for re-login before anything talks to the service.
pub fn ensure_fresh(token: &str) -> CustomResult<()> {
    let expired_at = token_expiry(token).unwrap_or(0);
    if is_expired(token) {
        return Err(Error::AuthExpired { expired_at });
    }
    Ok(())
}
