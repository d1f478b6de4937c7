use crate::domain_model::Session;
use crate::domain_port::DataServiceError;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Session issuance and lookup on the data service. The gateway holds the
/// client's current session; `get_session` never talks to the network for
/// a session it already has.
#[async_trait::async_trait]
pub trait SessionGateway: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, DataServiceError>;

    /// Exchange the current refresh token for a new session.
    /// `Ok(None)` when there is no session to refresh.
    async fn refresh_session(&self) -> Result<Option<Session>, DataServiceError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, DataServiceError>;

    async fn sign_out(&self) -> Result<(), DataServiceError>;
}
