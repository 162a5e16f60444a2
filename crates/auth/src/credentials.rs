//! Username/password authentication against a configured credential table.

use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown user and wrong password share one message.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Authentication boundary consumed by the transport layer.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError>;
}

/// One configured user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialEntry {
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub site: String,
}

/// Username → credential entry, built from configuration.
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    users: HashMap<String, CredentialEntry>,
}

impl CredentialTable {
    pub fn new(users: HashMap<String, CredentialEntry>) -> Self {
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Authenticator for CredentialTable {
    fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let username = username.trim();
        let Some(entry) = self.users.get(username) else {
            tracing::debug!(username, "login for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        let parsed = PasswordHash::new(&entry.password_hash).map_err(|err| {
            tracing::warn!(username, error = %err, "configured password hash is malformed");
            AuthError::InvalidCredentials
        })?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;

        Ok(Principal {
            username: username.to_string(),
            role: entry.role.clone(),
            site: entry.site.clone(),
        })
    }
}

/// Produce an argon2 PHC string for a configuration entry.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CredentialTable {
        let mut users = HashMap::new();
        users.insert(
            "central".to_string(),
            CredentialEntry {
                password_hash: hash_password("s3cret").unwrap(),
                role: Role::central_admin(),
                site: "HQ".to_string(),
            },
        );
        users.insert(
            "broken".to_string(),
            CredentialEntry {
                password_hash: "not-a-phc-string".to_string(),
                role: Role::plant_admin(),
                site: "Plant 2".to_string(),
            },
        );
        CredentialTable::new(users)
    }

    #[test]
    fn accepts_configured_password() {
        let principal = table().authenticate("central", "s3cret").unwrap();
        assert_eq!(principal.username, "central");
        assert_eq!(principal.role, Role::central_admin());
        assert_eq!(principal.site, "HQ");
    }

    #[test]
    fn rejects_wrong_password_and_unknown_user_alike() {
        let table = table();
        let wrong = table.authenticate("central", "guess").unwrap_err();
        let unknown = table.authenticate("nobody", "s3cret").unwrap_err();
        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn malformed_hash_never_authenticates() {
        assert_eq!(
            table().authenticate("broken", "anything").unwrap_err(),
            AuthError::InvalidCredentials
        );
    }
}
