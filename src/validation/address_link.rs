use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::{coerce_str, decimal, flag, object, reference, text, Codes, Field, Payload, RefError};
use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::{AddressLink, GroupKind, Id};
use crate::store::Tables;

pub const REFERENCE_MAX: usize = 20;

/// Editable terms of an edge, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkTerms {
    pub client: bool,
    pub compute: bool,
    pub customer: bool,
    pub service_centre: bool,
    pub supplier: bool,
    pub warrantor: bool,
    pub credit_limit: Option<Decimal>,
    pub reference: String,
    pub note: String,
    pub extra_reference1: String,
    pub extra_reference2: String,
    pub extra_reference3: String,
    pub territory_id: Option<Id>,
    pub extra: Map<String, Value>,
}

impl LinkTerms {
    pub fn of(link: &AddressLink) -> Self {
        Self {
            client: link.client,
            compute: link.compute,
            customer: link.customer,
            service_centre: link.service_centre,
            supplier: link.supplier,
            warrantor: link.warrantor,
            credit_limit: link.credit_limit,
            reference: link.reference.clone(),
            note: link.note.clone(),
            extra_reference1: link.extra_reference1.clone(),
            extra_reference2: link.extra_reference2.clone(),
            extra_reference3: link.extra_reference3.clone(),
            territory_id: link.territory_id,
            extra: link.extra.clone(),
        }
    }

    pub fn apply(self, link: &mut AddressLink) {
        link.client = self.client;
        link.compute = self.compute;
        link.customer = self.customer;
        link.service_centre = self.service_centre;
        link.supplier = self.supplier;
        link.warrantor = self.warrantor;
        link.credit_limit = self.credit_limit;
        link.reference = self.reference;
        link.note = self.note;
        link.extra_reference1 = self.extra_reference1;
        link.extra_reference2 = self.extra_reference2;
        link.extra_reference3 = self.extra_reference3;
        link.territory_id = self.territory_id;
        link.extra = self.extra;
    }
}

/// Create starts from empty terms; update starts from the stored edge. In both cases an
/// absent key leaves the starting value in place.
pub fn create(body: &Value, actor: &ActorContext, tables: &Tables) -> AppResult<LinkTerms> {
    clean(body, actor, tables, Codes::new("address_link", "create"), LinkTerms::default())
}

pub fn update(body: &Value, actor: &ActorContext, tables: &Tables, current: &AddressLink) -> AppResult<LinkTerms> {
    clean(body, actor, tables, Codes::new("address_link", "update"), LinkTerms::of(current))
}

fn clean(body: &Value, actor: &ActorContext, tables: &Tables, codes: Codes, start: LinkTerms) -> AppResult<LinkTerms> {
    let p = Payload::new(body);
    let mut terms = start;

    match p.field("credit_limit") {
        Field::Absent => {}
        f => terms.credit_limit = decimal(f).map_err(|_| codes.invalid(105, "credit_limit"))?,
    }
    let role = |f: Field, current: bool, n: u16, name: &str| -> AppResult<bool> {
        Ok(flag(f).map_err(|_| codes.invalid(n, name))?.unwrap_or(current))
    };
    terms.client = role(p.field("client"), terms.client, 106, "client")?;

    let compute_field = if p.has("compute") { p.field("compute") } else { p.field("cloud_customer") };
    if let Some(compute) = flag(compute_field).map_err(|_| codes.invalid(107, "compute"))? {
        if compute && !actor.address_cloud_region {
            return Err(codes.invalid(108, "compute"));
        }
        terms.compute = compute;
    }

    terms.customer = role(p.field("customer"), terms.customer, 109, "customer")?;
    for (key, slot) in [
        ("extra_reference1", &mut terms.extra_reference1),
        ("extra_reference2", &mut terms.extra_reference2),
        ("extra_reference3", &mut terms.extra_reference3),
    ] {
        let f = p.field(key);
        if !f.is_falsy() {
            *slot = f.value().map(coerce_str).unwrap_or_default().trim().to_string();
        }
    }
    match p.field("note") {
        Field::Absent => {}
        f => terms.note = f.value().filter(|_| !f.is_falsy()).map(coerce_str).unwrap_or_default().trim().to_string(),
    }
    match p.field("reference") {
        Field::Absent => {}
        f => terms.reference = text(f, REFERENCE_MAX, false).map_err(|_| codes.invalid(101, "reference"))?,
    }
    terms.service_centre = role(p.field("service_centre"), terms.service_centre, 110, "service_centre")?;
    terms.supplier = role(p.field("supplier"), terms.supplier, 111, "supplier")?;

    match p.field("territory_id") {
        Field::Absent => {}
        Field::Null => terms.territory_id = None,
        f if f.is_falsy() => {}
        f => {
            let territory = reference(f, |id| {
                tables.groups.get(id).filter(|g| g.kind == GroupKind::Territory).map(|g| (g.id, g.member_id))
            })
            .map_err(|e| match e {
                RefError::Type => codes.invalid(102, "territory_id"),
                RefError::Missing => codes.invalid(103, "territory_id"),
            })?;
            if territory.1 != actor.member_id {
                return Err(codes.invalid(104, "territory_id"));
            }
            terms.territory_id = Some(territory.0);
        }
    }

    terms.warrantor = role(p.field("warrantor"), terms.warrantor, 112, "warrantor")?;
    if let Some(extra) = object(p.field("extra")).map_err(|_| codes.invalid(113, "extra"))? {
        terms.extra = extra;
    }
    Ok(terms)
}
