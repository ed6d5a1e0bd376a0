use serde_json::Value;
use tracing::info;

use super::{AddressView, ListParams, Membership, Page};
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::{Address, Id, Lifecycle};
use crate::permissions;
use crate::validation::{self, address::AddressFields, Codes};

fn assign(address: &mut Address, f: AddressFields) {
    address.name = f.name;
    address.address1 = f.address1;
    address.address2 = f.address2;
    address.address3 = f.address3;
    address.city = f.city;
    address.country_id = f.country_id;
    address.subdivision_id = f.subdivision_id;
    address.postcode = f.postcode;
    address.phones = f.phones;
    address.email = f.email;
    address.website = f.website;
    address.gln = f.gln;
    address.vat_number = f.vat_number;
    address.language_id = f.language_id;
    address.currency_id = f.currency_id;
    address.billing_address_id = f.billing_address_id;
}

impl Membership {
    /// Inserts the Address together with its self-link and the two edges between it and
    /// the actor's Address, under one write lock.
    pub fn create_address(&self, actor: &ActorContext, body: &Value) -> AppResult<AddressView> {
        let (draft, target) = self.store.read(|t| {
            let draft = validation::address::create(body, t)?;
            let target = t
                .members
                .get(draft.member_id)
                .cloned()
                .ok_or_else(|| Codes::new("address", "create").invalid(102, "member_id"))?;
            Ok::<_, AppError>((draft, target))
        })?;
        permissions::address::create(actor, &target)?;
        let view = self.store.write(|t| {
            let address = t.addresses.insert_with(|id| {
                let mut address = Address {
                    id,
                    member_id: draft.member_id,
                    name: String::new(),
                    address1: String::new(),
                    address2: String::new(),
                    address3: String::new(),
                    city: String::new(),
                    country_id: 0,
                    subdivision_id: None,
                    postcode: String::new(),
                    phones: Vec::new(),
                    email: String::new(),
                    website: String::new(),
                    gln: String::new(),
                    vat_number: String::new(),
                    language_id: 0,
                    currency_id: 0,
                    billing_address_id: None,
                    cloud_region: false,
                    lifecycle: Lifecycle::Active,
                };
                assign(&mut address, draft.fields);
                address
            });
            t.ensure_address_link(address.id, address.id);
            t.ensure_address_link(actor.address_id, address.id);
            t.ensure_address_link(address.id, actor.address_id);
            AddressView::build(t, &address, actor)
        });
        info!(target: "membership::address", "address {} created in member {} by user {}",
            view.address.id, view.address.member_id, actor.user_id);
        Ok(view)
    }

    pub fn read_address(&self, actor: &ActorContext, id: Id) -> AppResult<AddressView> {
        self.store.read(|t| {
            let address = t.addresses.get(id).ok_or_else(|| Codes::new("address", "read").missing(1))?;
            permissions::address::read(actor, id, t)?;
            Ok(AddressView::build(t, address, actor))
        })
    }

    pub fn update_address(&self, actor: &ActorContext, id: Id, body: &Value) -> AppResult<AddressView> {
        let (mut address, changes) = self.store.read(|t| {
            let current = t.addresses.get(id).cloned().ok_or_else(|| Codes::new("address", "update").missing(1))?;
            let member_self_managed = t.members.get_any(current.member_id).is_some_and(|m| m.self_managed);
            let changes = validation::address::update(body, &current, member_self_managed, t)?;
            permissions::address::update(actor, &current, member_self_managed, changes.cloud_region, t)?;
            Ok::<_, AppError>((current, changes))
        })?;
        address.cloud_region = changes.cloud_region;
        assign(&mut address, changes.fields);
        self.store.write(|t| {
            if !t.addresses.replace(address.clone()) {
                return Err(Codes::new("address", "update").missing(1));
            }
            Ok(AddressView::build(t, &address, actor))
        })
    }

    /// Addresses the actor's Address has an edge to.
    pub fn list_addresses(&self, actor: &ActorContext, params: ListParams) -> Page<AddressView> {
        let views = self.store.read(|t| {
            let ids: Vec<Id> = match actor.is_super() {
                true => t.addresses.iter().map(|a| a.id).collect(),
                false => t.linked_addresses(actor.address_id),
            };
            ids.iter().filter_map(|id| t.addresses.get(*id)).map(|a| AddressView::build(t, a, actor)).collect()
        });
        params.paginate(views)
    }
}
