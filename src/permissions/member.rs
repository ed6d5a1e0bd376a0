use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::{Id, Member};
use crate::store::LinkGraph;
use crate::validation::Codes;

pub fn create(actor: &ActorContext) -> AppResult<()> {
    if !actor.member_self_managed {
        return Err(Codes::new("member", "create").denied(201));
    }
    Ok(())
}

/// Members are visible through a MemberLink from the actor's own Member.
pub fn read(actor: &ActorContext, member_id: Id, graph: &impl LinkGraph) -> AppResult<()> {
    if actor.is_super() || graph.member_link_exists(actor.member_id, member_id) {
        return Ok(());
    }
    Err(Codes::new("member", "read").denied(201))
}

/// Allowed when the actor administers the self-managed target itself, when an
/// administrator of a non-self-managed target is promoting it, or when a self-managed
/// actor has an AddressLink into the non-self-managed target.
pub fn update(actor: &ActorContext, target: &Member, promoting: bool, graph: &impl LinkGraph) -> AppResult<()> {
    if actor.is_super() {
        return Ok(());
    }
    let own = actor.same_member(target.id) && actor.administrator;
    if target.self_managed && own {
        return Ok(());
    }
    if !target.self_managed && promoting && own {
        return Ok(());
    }
    if !target.self_managed && actor.member_self_managed && graph.links_into_member(actor.address_id, target.id) {
        return Ok(());
    }
    Err(Codes::new("member", "update").denied(201))
}

/// MemberLinks are readable from the actor's own Member only.
pub fn read_link(actor: &ActorContext, member_id: Id) -> AppResult<()> {
    if actor.is_super() || actor.same_member(member_id) {
        return Ok(());
    }
    Err(Codes::new("member_link", "read").denied(201))
}
