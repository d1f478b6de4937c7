use crate::domain_model::ItemId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipAction {
    Added,
    Removed,
}

/// In-process notification broadcast to observers after a confirmed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum MembershipEvent {
    MembershipChanged {
        action: MembershipAction,
        item_id: ItemId,
    },
    MembershipCleared {},
}

impl MembershipEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MembershipEvent::MembershipChanged { .. } => "membership-changed",
            MembershipEvent::MembershipCleared {} => "membership-cleared",
        }
    }
}
