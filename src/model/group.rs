use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{tenant_record, Id, Lifecycle};

/// Exclusive, single-valued groupings of a Member (plus Territory, which groups AddressLinks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Department,
    Profile,
    Territory,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Department => "department",
            GroupKind::Profile => "profile",
            GroupKind::Territory => "territory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Id,
    pub kind: GroupKind,
    pub member_id: Id,
    pub name: String,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(Group);

/// Overlapping grouping of Users. May be deleted while non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Id,
    pub member_id: Id,
    pub name: String,
    pub user_ids: BTreeSet<Id>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(Team);
