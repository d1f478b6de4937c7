use crate::application_port::AuthError;
use crate::domain_model::*;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum BookmarkError {
    #[error("authentication required")]
    AuthRequired,
    #[error("session invalid: {0}")]
    SessionInvalid(String),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("mutation failed: {0}")]
    MutationFailed(String),
    #[error("confirmation required")]
    ConfirmationRequired,
}

impl From<AuthError> for BookmarkError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthRequired => BookmarkError::AuthRequired,
            AuthError::InvalidCredentials => BookmarkError::AuthRequired,
            AuthError::SessionInvalid(e) => BookmarkError::SessionInvalid(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Add raced with another writer; the item is a member exactly once.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Bypass the cache and replace any pending flight.
    pub force: bool,
    /// Per-call deadline. Falls back to the configured one when unset.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            timeout: None,
        }
    }
}

/// Fetches never fail outright: the value degrades to stale or empty and
/// `error` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResult<T> {
    pub value: T,
    pub error: Option<String>,
    pub stale: bool,
}

impl<T> FetchResult<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            error: None,
            stale: false,
        }
    }

    pub fn degraded(value: T, stale: bool, error: impl Into<String>) -> Self {
        Self {
            value,
            error: Some(error.into()),
            stale,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadMore {
    pub items: Vec<BookmarkedTool>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkSnapshot {
    pub user_id: Option<UserId>,
    pub membership: Vec<ItemId>,
    pub initialized: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub displayed: usize,
    pub total_records: usize,
}

#[async_trait::async_trait]
pub trait BookmarkService: Send + Sync {
    async fn fetch_membership(&self, force: bool) -> FetchResult<Vec<ItemId>> {
        self.fetch_membership_with(FetchOptions {
            force,
            timeout: None,
        })
        .await
    }

    async fn fetch_membership_with(&self, options: FetchOptions) -> FetchResult<Vec<ItemId>>;

    async fn fetch_full_records(&self) -> FetchResult<Vec<BookmarkedTool>> {
        self.fetch_full_records_with(FetchOptions::default()).await
    }

    async fn fetch_full_records_with(
        &self,
        options: FetchOptions,
    ) -> FetchResult<Vec<BookmarkedTool>>;

    async fn toggle_membership(&self, item_id: &ItemId) -> Result<ToggleOutcome, BookmarkError>;

    /// Destructive; `confirmed` must be the caller's affirmative answer.
    async fn clear_all_membership(&self, confirmed: bool) -> Result<(), BookmarkError>;

    async fn refresh_membership(&self) -> FetchResult<Vec<BookmarkedTool>>;

    fn load_more(&self) -> LoadMore;

    fn displayed_records(&self) -> Vec<BookmarkedTool>;

    fn is_member(&self, item_id: &ItemId) -> bool;

    fn snapshot(&self) -> BookmarkSnapshot;

    fn subscribe(&self) -> broadcast::Receiver<MembershipEvent>;
}
