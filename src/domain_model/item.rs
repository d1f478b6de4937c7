use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog item (tool) identifier.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of a user's bookmark list as returned by the data service.
/// `record` is only populated when the caller asked for the join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    pub item_id: ItemId,
    pub bookmarked_at: DateTime<Utc>,
    pub record: Option<ToolRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkedTool {
    pub item_id: ItemId,
    pub bookmarked_at: DateTime<Utc>,
    pub record: ToolRecord,
}

impl BookmarkEntry {
    pub fn into_joined(self) -> Option<BookmarkedTool> {
        let record = self.record?;
        Some(BookmarkedTool {
            item_id: self.item_id,
            bookmarked_at: self.bookmarked_at,
            record,
        })
    }
}
