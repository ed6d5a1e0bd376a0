use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::Id;
use crate::store::LinkGraph;
use crate::validation::Codes;

/// Creation is not idempotent: an existing edge is a denial, not a merge.
pub fn create(actor: &ActorContext, contra_address_id: Id, graph: &impl LinkGraph) -> AppResult<()> {
    let codes = Codes::new("address_link", "create");
    if !actor.member_self_managed {
        return Err(codes.denied(201));
    }
    if graph.address_link_exists(actor.address_id, contra_address_id) {
        return Err(codes.denied(202));
    }
    Ok(())
}

pub fn update(actor: &ActorContext) -> AppResult<()> {
    if !actor.member_self_managed {
        return Err(Codes::new("address_link", "update").denied(201));
    }
    Ok(())
}
