use serde_json::Value;

use super::{flag, or_current, phones, reference, text, Codes, Field, Payload, PhoneError, RefError, TextError};
use crate::error::{AppError, AppResult};
use crate::model::{Address, Id, Phone};
use crate::store::Tables;

const CREATE: Codes = Codes::new("address", "create");
const UPDATE: Codes = Codes::new("address", "update");

/// Geographic and contact fields shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFields {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub address3: String,
    pub city: String,
    pub country_id: Id,
    pub subdivision_id: Option<Id>,
    pub postcode: String,
    pub phones: Vec<Phone>,
    pub email: String,
    pub website: String,
    pub gln: String,
    pub vat_number: String,
    pub language_id: Id,
    pub currency_id: Id,
    pub billing_address_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressDraft {
    pub member_id: Id,
    pub fields: AddressFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChanges {
    pub fields: AddressFields,
    pub cloud_region: bool,
}

/// Code numbers for one operation. Update numbers sit two below create because update
/// has no `member_id` rule.
struct Numbers {
    codes: Codes,
    base: u16,
}

impl Numbers {
    fn err(&self, create_number: u16, field: &str) -> AppError {
        self.codes.invalid(create_number - self.base, field)
    }

    fn text(&self, f: Field, max: usize, required: bool, empty: u16, long: u16, field: &str) -> AppResult<String> {
        text(f, max, required).map_err(|e| match e {
            TextError::Empty => self.err(empty, field),
            TextError::TooLong => self.err(long, field),
        })
    }

    fn reference<T>(&self, f: Field, lookup: impl FnOnce(Id) -> Option<T>, n: u16, field: &str) -> AppResult<T> {
        reference(f, lookup).map_err(|e| match e {
            RefError::Type => self.err(n, field),
            RefError::Missing => self.err(n + 1, field),
        })
    }

    fn phones(&self, f: Field) -> AppResult<Vec<Phone>> {
        phones(f).map_err(|e| match e {
            PhoneError::NotList => self.err(116, "phones"),
            PhoneError::NotObject => self.err(117, "phones"),
            PhoneError::Incomplete => self.err(118, "phones"),
            PhoneError::Pattern => self.err(119, "phones"),
        })
    }
}

const CREATE_NUMBERS: Numbers = Numbers { codes: CREATE, base: 0 };
const UPDATE_NUMBERS: Numbers = Numbers { codes: UPDATE, base: 2 };

pub fn create(body: &Value, tables: &Tables) -> AppResult<AddressDraft> {
    let p = Payload::new(body);
    let n = &CREATE_NUMBERS;
    let member_id = n.reference(p.field("member_id"), |id| tables.members.get(id).map(|m| m.id), 101, "member_id")?;
    let name = n.text(p.field("name"), 250, true, 103, 104, "name")?;
    let address1 = n.text(p.field("address1"), 100, true, 105, 106, "address1")?;
    let address2 = n.text(p.field("address2"), 100, false, 0, 107, "address2")?;
    let address3 = n.text(p.field("address3"), 100, false, 0, 108, "address3")?;
    let city = n.text(p.field("city"), 50, true, 109, 110, "city")?;
    let country_id = n.reference(p.field("country_id"), |id| tables.countries.get(id).map(|c| c.id), 111, "country_id")?;
    let subdivision_id = match p.field("subdivision_id") {
        Field::Absent | Field::Null => None,
        f => Some(n.reference(f, |id| in_country(tables, id, country_id), 113, "subdivision_id")?),
    };
    let postcode = n.text(p.field("postcode"), 20, false, 0, 115, "postcode")?;
    let phones = n.phones(p.field("phones"))?;
    let email = n.text(p.field("email"), 255, false, 0, 120, "email")?;
    let website = n.text(p.field("website"), 50, false, 0, 121, "website")?;
    let gln = n.text(p.field("gln"), 13, false, 0, 122, "gln")?;
    let vat_number = n.text(p.field("vat_number"), 20, false, 0, 123, "vat_number")?;
    let language_id = n.reference(p.field("language_id"), |id| tables.languages.get(id).map(|l| l.id), 124, "language_id")?;
    let currency_id = n.reference(p.field("currency_id"), |id| tables.currencies.get(id).map(|c| c.id), 126, "currency_id")?;
    let billing_address_id = match p.field("billing_address_id") {
        Field::Absent | Field::Null => None,
        f => Some(n.reference(f, |id| in_member(tables, id, member_id), 128, "billing_address_id")?),
    };
    Ok(AddressDraft {
        member_id,
        fields: AddressFields {
            name,
            address1,
            address2,
            address3,
            city,
            country_id,
            subdivision_id,
            postcode,
            phones,
            email,
            website,
            gln,
            vat_number,
            language_id,
            currency_id,
            billing_address_id,
        },
    })
}

pub fn update(body: &Value, current: &Address, member_self_managed: bool, tables: &Tables) -> AppResult<AddressChanges> {
    let p = Payload::new(body);
    let n = &UPDATE_NUMBERS;
    let name = or_current(p.field("name"), || current.name.clone(), |f| n.text(f, 250, true, 103, 104, "name"))?;
    let address1 =
        or_current(p.field("address1"), || current.address1.clone(), |f| n.text(f, 100, true, 105, 106, "address1"))?;
    let address2 =
        or_current(p.field("address2"), || current.address2.clone(), |f| n.text(f, 100, false, 0, 107, "address2"))?;
    let address3 =
        or_current(p.field("address3"), || current.address3.clone(), |f| n.text(f, 100, false, 0, 108, "address3"))?;
    let city = or_current(p.field("city"), || current.city.clone(), |f| n.text(f, 50, true, 109, 110, "city"))?;
    let country_id = or_current(p.field("country_id"), || current.country_id, |f| {
        n.reference(f, |id| tables.countries.get(id).map(|c| c.id), 111, "country_id")
    })?;
    let subdivision_id = match p.field("subdivision_id") {
        // a subdivision of the old country cannot survive a country change
        Field::Absent if country_id == current.country_id => current.subdivision_id,
        Field::Absent | Field::Null => None,
        f => Some(n.reference(f, |id| in_country(tables, id, country_id), 113, "subdivision_id")?),
    };
    let postcode =
        or_current(p.field("postcode"), || current.postcode.clone(), |f| n.text(f, 20, false, 0, 115, "postcode"))?;
    let phones = or_current(p.field("phones"), || current.phones.clone(), |f| n.phones(f))?;
    let email = or_current(p.field("email"), || current.email.clone(), |f| n.text(f, 255, false, 0, 120, "email"))?;
    let website =
        or_current(p.field("website"), || current.website.clone(), |f| n.text(f, 50, false, 0, 121, "website"))?;
    let gln = or_current(p.field("gln"), || current.gln.clone(), |f| n.text(f, 13, false, 0, 122, "gln"))?;
    let vat_number =
        or_current(p.field("vat_number"), || current.vat_number.clone(), |f| n.text(f, 20, false, 0, 123, "vat_number"))?;
    let language_id = or_current(p.field("language_id"), || current.language_id, |f| {
        n.reference(f, |id| tables.languages.get(id).map(|l| l.id), 124, "language_id")
    })?;
    let currency_id = or_current(p.field("currency_id"), || current.currency_id, |f| {
        n.reference(f, |id| tables.currencies.get(id).map(|c| c.id), 126, "currency_id")
    })?;
    let billing_address_id = match p.field("billing_address_id") {
        Field::Absent => current.billing_address_id,
        Field::Null => None,
        f => Some(n.reference(f, |id| in_member(tables, id, current.member_id), 128, "billing_address_id")?),
    };
    let cloud_region = flag(p.field("cloud_region"))
        .map_err(|_| UPDATE.invalid(128, "cloud_region"))?
        .unwrap_or(current.cloud_region);
    if cloud_region && !member_self_managed {
        return Err(UPDATE.invalid(129, "cloud_region"));
    }
    Ok(AddressChanges {
        fields: AddressFields {
            name,
            address1,
            address2,
            address3,
            city,
            country_id,
            subdivision_id,
            postcode,
            phones,
            email,
            website,
            gln,
            vat_number,
            language_id,
            currency_id,
            billing_address_id,
        },
        cloud_region,
    })
}

fn in_country(tables: &Tables, subdivision_id: Id, country_id: Id) -> Option<Id> {
    tables.subdivisions.get(subdivision_id).filter(|s| s.country_id == country_id).map(|s| s.id)
}

fn in_member(tables: &Tables, address_id: Id, member_id: Id) -> Option<Id> {
    tables.addresses.get(address_id).filter(|a| a.member_id == member_id).map(|a| a.id)
}
