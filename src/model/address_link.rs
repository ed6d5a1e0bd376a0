use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{tenant_record, Id, Lifecycle};

/// Directed edge `address -> contra_address` with the relationship terms the owning
/// Address holds about its partner. The reciprocal edge is a separate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLink {
    pub id: Id,
    pub address_id: Id,
    pub contra_address_id: Id,
    pub client: bool,
    /// Cloud customer flag. Only a cloud_region Address may set it.
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
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(AddressLink);

impl AddressLink {
    /// An edge with no terms, used for self-links and auto-created reciprocals.
    pub fn bare(id: Id, address_id: Id, contra_address_id: Id) -> Self {
        Self {
            id,
            address_id,
            contra_address_id,
            client: false,
            compute: false,
            customer: false,
            service_centre: false,
            supplier: false,
            warrantor: false,
            credit_limit: None,
            reference: String::new(),
            note: String::new(),
            extra_reference1: String::new(),
            extra_reference2: String::new(),
            extra_reference3: String::new(),
            territory_id: None,
            extra: serde_json::Map::new(),
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn is_self_link(&self) -> bool { self.address_id == self.contra_address_id }
}
