use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::Address;
use crate::validation::Codes;

/// Billing terms are visible from the billed Address and from anywhere in the region's Member.
pub fn read(actor: &ActorContext, region: &Address, target: &Address) -> AppResult<()> {
    if actor.is_super() {
        return Ok(());
    }
    if actor.address_id != target.id && !actor.same_member(region.member_id) {
        return Err(Codes::new("cloud_bill", "read").denied(201));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;

    #[test]
    fn region_member_or_billed_address() {
        let mut t = fixtures::tables();
        let cloud = fixtures::member(&mut t, true);
        let region = fixtures::address(&mut t, cloud, true);
        let branch = fixtures::address(&mut t, cloud, false);
        let customer = fixtures::member(&mut t, false);
        let billed = fixtures::address(&mut t, customer, false);
        let elsewhere = fixtures::address(&mut t, customer, false);

        let users = [
            fixtures::user(&mut t, branch, false),
            fixtures::user(&mut t, billed, false),
            fixtures::user(&mut t, elsewhere, true),
        ];
        let [at_branch, at_billed, at_elsewhere] = users.map(|u| fixtures::actor(&t, u));
        let (region, billed) = (t.addresses.get(region).unwrap(), t.addresses.get(billed).unwrap());

        assert!(read(&at_branch, region, billed).is_ok());
        assert!(read(&at_billed, region, billed).is_ok());
        let err = read(&at_elsewhere, region, billed).unwrap_err();
        assert_eq!(err.code_str(), "membership_cloud_bill_read_201");
        assert_eq!(err.http_status(), 403);
    }
}
