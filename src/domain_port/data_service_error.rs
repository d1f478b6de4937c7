#[derive(Debug, Clone, thiserror::Error)]
pub enum DataServiceError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not authorized")]
    Unauthorized,
    #[error("token invalid")]
    TokenInvalid,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}
