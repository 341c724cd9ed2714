//! Registration, login and token verification.

use std::sync::Arc;

use tracing::info;

use super::{Result, ServiceError};
use crate::auth::{hash_password, verify_password, TokenError, TokenSigner};
use crate::domain::{Actor, Role, User};
use crate::storage::{StorageError, UserStore};

const MIN_PASSWORD_LEN: usize = 8;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, signer: TokenSigner) -> Self {
        Self { users, signer }
    }

    /// Create an account and mint its first bearer token. Emails are stored
    /// lowercased so lookups are case-insensitive.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(User, String)> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(ServiceError::InvalidInput(
                "email must contain '@'".to_string(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let hash = hash_password(password);
        let user = self.users.create(&email, &hash, role).await?;
        let token = self.signer.mint(&user);
        info!(user_id = user.id, role = %role, "user registered");
        Ok((user, token))
    }

    /// Exchange credentials for a bearer token.
    ///
    /// Unknown email and wrong password produce the same error, so the
    /// endpoint does not leak which emails exist.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let email = email.trim().to_lowercase();
        let user = match self.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(StorageError::EmailNotFound(_)) => return Err(ServiceError::BadCredentials),
            Err(other) => return Err(other.into()),
        };
        if !verify_password(password, &user.password_hash) {
            return Err(ServiceError::BadCredentials);
        }
        let token = self.signer.mint(&user);
        info!(user_id = user.id, "user logged in");
        Ok((user, token))
    }

    /// Resolve a bearer token into the acting identity.
    pub fn authenticate(&self, token: &str) -> std::result::Result<Actor, TokenError> {
        self.signer.verify(token)
    }
}
