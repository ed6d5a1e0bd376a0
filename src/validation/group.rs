use serde_json::Value;
use std::collections::BTreeSet;

use super::{int, or_current, text, Codes, Field, Payload, TextError};
use crate::error::AppResult;
use crate::model::{GroupKind, Id};
use crate::store::Tables;

pub const NAME_MAX: usize = 50;

fn name(f: Field, codes: Codes) -> AppResult<String> {
    text(f, NAME_MAX, true).map_err(|e| match e {
        TextError::Empty => codes.invalid(101, "name"),
        TextError::TooLong => codes.invalid(102, "name"),
    })
}

/// Name of a Department, Profile or Territory: unique within the actor's Member.
/// `current` is the stored record's `(id, name)` on update.
pub fn group_name(
    body: &Value,
    kind: GroupKind,
    member_id: Id,
    current: Option<(Id, &str)>,
    codes: Codes,
    tables: &Tables,
) -> AppResult<String> {
    let p = Payload::new(body);
    let cleaned = match current {
        Some((_, stored)) => or_current(p.field("name"), || stored.to_string(), |f| name(f, codes))?,
        None => name(p.field("name"), codes)?,
    };
    if tables.group_name_taken(kind, member_id, &cleaned, current.map(|c| c.0)) {
        return Err(codes.invalid(103, "name"));
    }
    Ok(cleaned)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamDraft {
    pub name: String,
    /// `None` leaves membership untouched.
    pub user_ids: Option<BTreeSet<Id>>,
}

pub fn team(body: &Value, member_id: Id, current_name: Option<&str>, codes: Codes, tables: &Tables) -> AppResult<TeamDraft> {
    let p = Payload::new(body);
    let cleaned = match current_name {
        Some(stored) => or_current(p.field("name"), || stored.to_string(), |f| name(f, codes))?,
        None => name(p.field("name"), codes)?,
    };
    let user_ids = match p.field("users") {
        Field::Absent | Field::Null => None,
        Field::Value(v) => {
            let items = v.as_array().ok_or_else(|| codes.invalid(103, "users"))?;
            let mut ids = BTreeSet::new();
            for item in items {
                match int(item) {
                    Some(n) if n > 0 => {
                        ids.insert(n as Id);
                    }
                    _ => return Err(codes.invalid(103, "users")),
                }
            }
            let in_member = ids.iter().all(|id| tables.users.get(*id).is_some_and(|u| u.member_id == member_id));
            if ids.len() != items.len() || !in_member {
                return Err(codes.invalid(104, "users"));
            }
            Some(ids)
        }
    };
    Ok(TeamDraft { name: cleaned, user_ids })
}
