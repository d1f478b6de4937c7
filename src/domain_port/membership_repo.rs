use crate::domain_model::*;
use crate::domain_port::DataServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The item was already in the user's list. Not an error.
    AlreadyExists,
}

#[async_trait::async_trait]
pub trait MembershipRepo: Send + Sync {
    /// List a user's bookmarks, oldest first. With `join_records` set,
    /// each entry carries its tool record when the catalog still has one.
    async fn list_membership(
        &self,
        user_id: &UserId,
        join_records: bool,
    ) -> Result<Vec<BookmarkEntry>, DataServiceError>;

    async fn add_membership(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<AddOutcome, DataServiceError>;

    async fn remove_membership(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<(), DataServiceError>;

    async fn clear_membership(&self, user_id: &UserId) -> Result<(), DataServiceError>;
}
