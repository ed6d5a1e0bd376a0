use serde_json::Value;

use super::{flag, or_current, reference, text, Codes, Payload, RefError, TextError};
use crate::error::AppResult;
use crate::model::{Id, Member};
use crate::store::Tables;

pub const NAME_MAX: usize = 250;
pub const GLN_PREFIX_MAX: usize = 12;

const CREATE: Codes = Codes::new("member", "create");
const UPDATE: Codes = Codes::new("member", "update");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDraft {
    pub name: String,
    pub currency_id: Id,
    pub gln_prefix: String,
    pub secret: bool,
}

pub fn create(body: &Value, tables: &Tables) -> AppResult<MemberDraft> {
    let p = Payload::new(body);
    let name = text(p.field("name"), NAME_MAX, true).map_err(|e| match e {
        TextError::Empty => CREATE.invalid(101, "name"),
        TextError::TooLong => CREATE.invalid(102, "name"),
    })?;
    let currency_id = reference(p.field("currency_id"), |id| tables.currencies.get(id).map(|c| c.id)).map_err(|e| match e {
        RefError::Type => CREATE.invalid(103, "currency_id"),
        RefError::Missing => CREATE.invalid(104, "currency_id"),
    })?;
    let gln_prefix = text(p.field("gln_prefix"), GLN_PREFIX_MAX, false).map_err(|_| CREATE.invalid(105, "gln_prefix"))?;
    let secret = flag(p.field("secret")).map_err(|_| CREATE.invalid(106, "secret"))?.unwrap_or(false);
    Ok(MemberDraft { name, currency_id, gln_prefix, secret })
}

/// Full cleaned value set for an update; unchanged fields carry the current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChanges {
    pub name: String,
    pub currency_id: Id,
    pub gln_prefix: String,
    pub self_managed: bool,
    pub secret: bool,
    /// `self_managed` was present in the request.
    pub self_managed_requested: bool,
}

pub fn update(body: &Value, current: &Member, tables: &Tables) -> AppResult<MemberChanges> {
    let p = Payload::new(body);
    let name = or_current(p.field("name"), || current.name.clone(), |f| {
        text(f, NAME_MAX, true).map_err(|e| match e {
            TextError::Empty => UPDATE.invalid(101, "name"),
            TextError::TooLong => UPDATE.invalid(102, "name"),
        })
    })?;
    let currency_id = or_current(p.field("currency_id"), || current.currency_id, |f| {
        reference(f, |id| tables.currencies.get(id).map(|c| c.id)).map_err(|e| match e {
            RefError::Type => UPDATE.invalid(103, "currency_id"),
            RefError::Missing => UPDATE.invalid(104, "currency_id"),
        })
    })?;
    let gln_prefix = or_current(p.field("gln_prefix"), || current.gln_prefix.clone(), |f| {
        text(f, GLN_PREFIX_MAX, false).map_err(|_| UPDATE.invalid(105, "gln_prefix"))
    })?;

    let self_managed = flag(p.field("self_managed"))
        .map_err(|_| UPDATE.invalid(106, "self_managed"))?
        .unwrap_or(current.self_managed);
    if current.self_managed && !self_managed {
        return Err(UPDATE.invalid(107, "self_managed"));
    }

    let secret = flag(p.field("secret")).map_err(|_| UPDATE.invalid(108, "secret"))?.unwrap_or(current.secret);
    if secret && self_managed {
        return Err(UPDATE.invalid(109, "secret"));
    }

    Ok(MemberChanges {
        name,
        currency_id,
        gln_prefix,
        self_managed,
        secret,
        self_managed_requested: p.field("self_managed").value().is_some(),
    })
}
