use crate::domain_model::UserId;
use serde::Serialize;
use std::fmt;

/// The two derived collections cached per user.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Bookmarked item ids only.
    Ids,
    /// Bookmarks joined with their tool records.
    Records,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Ids => write!(f, "ids"),
            CollectionKind::Records => write!(f, "records"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CacheKey {
    pub user_id: UserId,
    pub kind: CollectionKind,
}

impl CacheKey {
    pub fn new(user_id: UserId, kind: CollectionKind) -> Self {
        Self { user_id, kind }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.kind)
    }
}
