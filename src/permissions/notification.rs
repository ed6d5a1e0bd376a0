use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::Id;
use crate::store::LinkGraph;
use crate::validation::Codes;

pub fn list(actor: &ActorContext, address_id: Id, graph: &impl LinkGraph) -> AppResult<()> {
    if !graph.address_link_exists(actor.address_id, address_id) {
        return Err(Codes::new("notification", "list").denied(201));
    }
    Ok(())
}
