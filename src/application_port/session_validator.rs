use crate::domain_model::{Session, UserId};
use crate::domain_port::DataServiceError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    AuthRequired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session invalid: {0}")]
    SessionInvalid(String),
}

impl From<DataServiceError> for AuthError {
    fn from(err: DataServiceError) -> Self {
        match err {
            DataServiceError::InvalidCredentials => AuthError::InvalidCredentials,
            DataServiceError::Unauthorized => AuthError::AuthRequired,
            e => AuthError::SessionInvalid(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait SessionValidator: Send + Sync {
    /// Whether a usable session exists, refreshing it first when it is
    /// close to expiry.
    async fn ensure_valid_session(&self) -> bool;

    /// Like `ensure_valid_session` but hands back the session, or a named
    /// error when there is none.
    async fn get_valid_session(&self) -> Result<Session, AuthError>;

    /// Drop the re-validation mark and refresh unconditionally.
    async fn force_refresh(&self) -> bool;

    async fn is_authenticated(&self) -> bool {
        self.ensure_valid_session().await
    }

    async fn current_user(&self) -> Option<UserId>;

    async fn sign_in(&self, input: SignInInput) -> Result<Session, AuthError>;

    async fn sign_out(&self);
}
