use serde::{Deserialize, Serialize};

use super::{tenant_record, Id, Lifecycle};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phone {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Id,
    pub member_id: Id,
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
    /// Must belong to the same Member.
    pub billing_address_id: Option<Id>,
    /// Only allowed on Addresses of self-managed Members.
    pub cloud_region: bool,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(Address);

impl Address {
    pub fn full_address(&self) -> String {
        [&self.address1, &self.address2, &self.address3, &self.city, &self.postcode]
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
