use crate::domain_model::{ItemId, MembershipAction};
use std::collections::BTreeSet;

/// One toggle's intended change. Rollback applies the inverse of this
/// delta to whatever the state is now, so concurrent toggles on other
/// items are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDelta {
    pub item_id: ItemId,
    pub action: MembershipAction,
}

impl MembershipDelta {
    /// The delta that flips `item_id` relative to `current`.
    pub fn toggle(current: &BTreeSet<ItemId>, item_id: &ItemId) -> Self {
        let action = if current.contains(item_id) {
            MembershipAction::Removed
        } else {
            MembershipAction::Added
        };
        Self {
            item_id: item_id.clone(),
            action,
        }
    }

    pub fn inverse(&self) -> Self {
        let action = match self.action {
            MembershipAction::Added => MembershipAction::Removed,
            MembershipAction::Removed => MembershipAction::Added,
        };
        Self {
            item_id: self.item_id.clone(),
            action,
        }
    }
}

/// Result of applying a delta. `Applied` carries the new state; the caller
/// confirms by keeping it or rolls back with `revert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Applied(BTreeSet<ItemId>),
    /// The delta was already reflected in the state; nothing to undo later.
    Unchanged(BTreeSet<ItemId>),
}

impl Applied {
    pub fn into_state(self) -> BTreeSet<ItemId> {
        match self {
            Applied::Applied(s) | Applied::Unchanged(s) => s,
        }
    }

    #[cfg(test)]
    pub fn changed(&self) -> bool {
        matches!(self, Applied::Applied(_))
    }
}

pub fn apply(pre: &BTreeSet<ItemId>, delta: &MembershipDelta) -> Applied {
    let mut post = pre.clone();
    let changed = match delta.action {
        MembershipAction::Added => post.insert(delta.item_id.clone()),
        MembershipAction::Removed => post.remove(&delta.item_id),
    };
    if changed {
        Applied::Applied(post)
    } else {
        Applied::Unchanged(post)
    }
}

pub fn revert(current: &BTreeSet<ItemId>, delta: &MembershipDelta) -> BTreeSet<ItemId> {
    apply(current, &delta.inverse()).into_state()
}

/// Same delta on the ordered id list kept in the cache. Additions go to the
/// end, which is where the data service orders a fresh bookmark.
pub fn apply_to_list(list: &mut Vec<ItemId>, delta: &MembershipDelta) {
    match delta.action {
        MembershipAction::Added => {
            if !list.contains(&delta.item_id) {
                list.push(delta.item_id.clone());
            }
        }
        MembershipAction::Removed => list.retain(|id| id != &delta.item_id),
    }
}
