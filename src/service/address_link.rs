use serde_json::Value;
use tracing::{debug, info};

use super::Membership;
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::{AddressLink, Id};
use crate::permissions;
use crate::store::LinkGraph;
use crate::validation::{self, Codes};

impl Membership {
    /// Edge from the actor's Address to `address_id`. The empty reciprocal is created in
    /// the same write when it does not exist yet; an existing reciprocal is left as is.
    pub fn create_address_link(&self, actor: &ActorContext, address_id: Id, body: &Value) -> AppResult<AddressLink> {
        let codes = Codes::new("address_link", "create");
        let terms = self.store.read(|t| {
            t.addresses.get(address_id).ok_or_else(|| codes.missing(1))?;
            let terms = validation::address_link::create(body, actor, t)?;
            permissions::address_link::create(actor, address_id, t)?;
            Ok::<_, AppError>(terms)
        })?;
        let (link, reciprocal) = self.store.write(|t| {
            // another request may have won the race since the permission check
            if t.address_link_exists(actor.address_id, address_id) {
                return Err(codes.denied(202));
            }
            let mut link = t.address_links.insert_with(|id| AddressLink::bare(id, actor.address_id, address_id));
            terms.apply(&mut link);
            t.address_links.replace(link.clone());
            let reciprocal = t.ensure_address_link(address_id, actor.address_id);
            Ok((link, reciprocal))
        })?;
        info!(target: "membership::address_link", "edge {} -> {} created", link.address_id, link.contra_address_id);
        if let Some(r) = reciprocal {
            debug!(target: "membership::address_link", "reciprocal edge {} created", r.id);
        }
        Ok(link)
    }

    pub fn read_address_link(&self, actor: &ActorContext, address_id: Id) -> AppResult<AddressLink> {
        self.store.read(|t| {
            t.address_link(actor.address_id, address_id)
                .cloned()
                .ok_or_else(|| Codes::new("address_link", "read").missing(1))
        })
    }

    pub fn update_address_link(&self, actor: &ActorContext, address_id: Id, body: &Value) -> AppResult<AddressLink> {
        let codes = Codes::new("address_link", "update");
        let link = self.store.read(|t| {
            let current = t.address_link(actor.address_id, address_id).cloned().ok_or_else(|| codes.missing(1))?;
            let terms = validation::address_link::update(body, actor, t, &current)?;
            permissions::address_link::update(actor)?;
            let mut link = current;
            terms.apply(&mut link);
            Ok::<_, AppError>(link)
        })?;
        self.store.write(|t| {
            if !t.address_links.replace(link.clone()) {
                return Err(codes.missing(1));
            }
            Ok(())
        })?;
        Ok(link)
    }
}
