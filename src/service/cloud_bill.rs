use serde::Serialize;

use super::Membership;
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::Id;
use crate::permissions;
use crate::validation::Codes;

/// What a cloud region needs to bill a customer Address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudBill {
    pub cloud_customer: bool,
    pub customer: bool,
    pub is_region: bool,
    /// The Address whose edge grants compute; the region itself or a sibling in its Member.
    pub reseller_id: Id,
    pub tax_rate: String,
}

impl Membership {
    /// Billing terms between the region `address_id` and `target_address_id`, taken from the
    /// first compute edge any Address of the region's Member holds on the target.
    pub fn read_cloud_bill(&self, actor: &ActorContext, address_id: Id, target_address_id: Id) -> AppResult<CloudBill> {
        let codes = Codes::new("cloud_bill", "read");
        self.store.read(|t| {
            let region = t.addresses.get(address_id).ok_or_else(|| codes.missing(1))?;
            let target = t.addresses.get(target_address_id).ok_or_else(|| codes.missing(1))?;
            permissions::cloud_bill::read(actor, region, target)?;
            let seller = t
                .address_links
                .iter()
                .filter(|l| l.contra_address_id == target.id && l.compute)
                .find(|l| t.addresses.get(l.address_id).is_some_and(|a| a.member_id == region.member_id))
                .ok_or_else(|| codes.missing(2))?;
            Ok::<_, AppError>(CloudBill {
                cloud_customer: seller.compute,
                customer: seller.customer,
                is_region: region.cloud_region,
                reseller_id: seller.address_id,
                tax_rate: seller.extra_reference1.clone(),
            })
        })
    }
}
