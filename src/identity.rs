//! The identity-provider seam.
//!
//! Sign-in and sessions are owned by an external provider; the service only
//! ever sees the opaque user id and resolves it to a doctor record through
//! the store. `LocalIdentity` is the in-process stand-in used by tests.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use ulid::Ulid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("no user signed in")]
    NotSignedIn,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register an account and return its opaque user id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Ulid, IdentityError>;

    /// Authenticate and open a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Ulid, IdentityError>;

    async fn sign_out(&self);

    /// The signed-in user, if any.
    async fn current_user(&self) -> Option<Ulid>;
}

pub struct LocalIdentity {
    accounts: DashMap<String, (Ulid, String)>,
    session: RwLock<Option<Ulid>>,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            session: RwLock::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Ulid, IdentityError> {
        if self.accounts.contains_key(email) {
            return Err(IdentityError::EmailTaken);
        }
        let user_id = Ulid::new();
        self.accounts
            .insert(email.to_string(), (user_id, password.to_string()));
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Ulid, IdentityError> {
        let entry = self
            .accounts
            .get(email)
            .ok_or(IdentityError::InvalidCredentials)?;
        let (user_id, stored) = entry.value();
        if stored != password {
            return Err(IdentityError::InvalidCredentials);
        }
        let user_id = *user_id;
        *self.session.write().await = Some(user_id);
        Ok(user_id)
    }

    async fn sign_out(&self) {
        *self.session.write().await = None;
    }

    async fn current_user(&self) -> Option<Ulid> {
        *self.session.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let idp = LocalIdentity::new();
        let user_id = idp.sign_up("a@hospital.test", "secret").await.unwrap();
        assert!(idp.current_user().await.is_none());

        let signed_in = idp.sign_in("a@hospital.test", "secret").await.unwrap();
        assert_eq!(signed_in, user_id);
        assert_eq!(idp.current_user().await, Some(user_id));

        idp.sign_out().await;
        assert!(idp.current_user().await.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let idp = LocalIdentity::new();
        idp.sign_up("a@hospital.test", "one").await.unwrap();
        let err = idp.sign_up("a@hospital.test", "two").await.unwrap_err();
        assert_eq!(err, IdentityError::EmailTaken);
    }

    #[tokio::test]
    async fn bad_password_rejected() {
        let idp = LocalIdentity::new();
        idp.sign_up("a@hospital.test", "secret").await.unwrap();
        let err = idp.sign_in("a@hospital.test", "wrong").await.unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
        assert!(idp.current_user().await.is_none());
    }
}
