use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::{Address, Id, Member};
use crate::store::LinkGraph;
use crate::validation::Codes;

/// Self-managed actors create Addresses in their own Member or in a non-self-managed partner.
pub fn create(actor: &ActorContext, target: &Member) -> AppResult<()> {
    let codes = Codes::new("address", "create");
    if !actor.member_self_managed {
        return Err(codes.denied(201));
    }
    if !actor.same_member(target.id) && target.self_managed {
        return Err(codes.denied(202));
    }
    Ok(())
}

/// Exactly one hop: an edge from the actor's Address to the target.
pub fn read(actor: &ActorContext, address_id: Id, graph: &impl LinkGraph) -> AppResult<()> {
    if actor.is_super() || graph.address_link_exists(actor.address_id, address_id) {
        return Ok(());
    }
    Err(Codes::new("address", "read").denied(201))
}

pub fn update(
    actor: &ActorContext,
    target: &Address,
    target_member_self_managed: bool,
    new_cloud_region: bool,
    graph: &impl LinkGraph,
) -> AppResult<()> {
    let codes = Codes::new("address", "update");
    if actor.is_super() {
        return Ok(());
    }
    if target.cloud_region != new_cloud_region {
        return Err(codes.denied(201));
    }
    if !actor.member_self_managed {
        return Err(codes.denied(202));
    }
    if !actor.same_member(target.member_id) && target_member_self_managed {
        return Err(codes.denied(203));
    }
    if !graph.address_link_exists(actor.address_id, target.id) {
        return Err(codes.denied(204));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;

    #[test]
    fn create_needs_self_managed_and_partner_standing() {
        let mut t = fixtures::tables();
        let own = fixtures::member(&mut t, true);
        let managed = fixtures::member(&mut t, false);
        let independent = fixtures::member(&mut t, true);
        let a = fixtures::address(&mut t, own, false);
        let u = fixtures::user(&mut t, a, true);
        let actor = fixtures::actor(&t, u);
        let m = |id| t.members.get(id).cloned().unwrap();
        assert!(create(&actor, &m(own)).is_ok());
        assert!(create(&actor, &m(managed)).is_ok());
        assert_eq!(create(&actor, &m(independent)).unwrap_err().code_str(), "membership_address_create_202");

        let ma = fixtures::address(&mut t, managed, false);
        let mu = fixtures::user(&mut t, ma, true);
        let managed_actor = fixtures::actor(&t, mu);
        let own_member = t.members.get(own).cloned().unwrap();
        assert_eq!(create(&managed_actor, &own_member).unwrap_err().code_str(), "membership_address_create_201");
    }

    #[test]
    fn read_is_one_hop() {
        let mut t = fixtures::tables();
        let m = fixtures::member(&mut t, true);
        let a = fixtures::address(&mut t, m, false);
        let b = fixtures::address(&mut t, m, false);
        let c = fixtures::address(&mut t, m, false);
        fixtures::link(&mut t, a, b);
        fixtures::link(&mut t, b, c);
        let u = fixtures::user(&mut t, a, true);
        let actor = fixtures::actor(&t, u);
        assert!(read(&actor, a, &t).is_ok());
        assert!(read(&actor, b, &t).is_ok());
        assert_eq!(read(&actor, c, &t).unwrap_err().code_str(), "membership_address_read_201");
    }

    #[test]
    fn update_order() {
        let mut t = fixtures::tables();
        let own = fixtures::member(&mut t, true);
        let other = fixtures::member(&mut t, true);
        let a = fixtures::address(&mut t, own, false);
        let b = fixtures::address(&mut t, own, false);
        let far = fixtures::address(&mut t, other, false);
        fixtures::link(&mut t, a, far);
        let u = fixtures::user(&mut t, a, true);
        let actor = fixtures::actor(&t, u);
        let addr = |id| t.addresses.get(id).cloned().unwrap();
        assert_eq!(update(&actor, &addr(a), true, true, &t).unwrap_err().code_str(), "membership_address_update_201");
        assert!(update(&actor, &addr(a), true, false, &t).is_ok());
        assert_eq!(update(&actor, &addr(far), true, false, &t).unwrap_err().code_str(), "membership_address_update_203");
        assert_eq!(update(&actor, &addr(b), true, false, &t).unwrap_err().code_str(), "membership_address_update_204");
    }
}
