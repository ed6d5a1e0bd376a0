//! Builders shared by unit tests.

use chrono::NaiveDate;

use crate::bootstrap::seed_reference_data;
use crate::identity::ActorContext;
use crate::model::*;

use super::Tables;

pub fn tables() -> Tables {
    let mut t = Tables::default();
    seed_reference_data(&mut t);
    t
}

pub fn member(t: &mut Tables, self_managed: bool) -> Id {
    t.members
        .insert_with(|id| Member {
            id,
            name: format!("member {}", id),
            currency_id: 1,
            gln_prefix: String::new(),
            self_managed,
            secret: false,
            api_key: format!("key-{}", id),
            lifecycle: Lifecycle::Active,
        })
        .id
}

pub fn address_row(id: Id, member_id: Id, cloud_region: bool) -> Address {
    Address {
        id,
        member_id,
        name: format!("address {}", id),
        address1: "1 Street".into(),
        address2: String::new(),
        address3: String::new(),
        city: "Dublin".into(),
        country_id: 1,
        subdivision_id: None,
        postcode: String::new(),
        phones: vec![],
        email: String::new(),
        website: String::new(),
        gln: String::new(),
        vat_number: String::new(),
        language_id: 1,
        currency_id: 1,
        billing_address_id: None,
        cloud_region,
        lifecycle: Lifecycle::Active,
    }
}

/// New Address with its self-link.
pub fn address(t: &mut Tables, member_id: Id, cloud_region: bool) -> Id {
    let id = t.addresses.insert_with(|id| address_row(id, member_id, cloud_region)).id;
    t.ensure_address_link(id, id);
    id
}

/// Both directions.
pub fn link(t: &mut Tables, a: Id, b: Id) {
    t.ensure_address_link(a, b);
    t.ensure_address_link(b, a);
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

pub fn user_row(id: Id, member_id: Id, address_id: Id) -> User {
    User {
        id,
        member_id,
        address_id,
        first_name: "Test".into(),
        surname: format!("User{}", id),
        email: format!("user{}@example.com", id),
        administrator: false,
        global_user: false,
        global_active: false,
        is_private: false,
        robot: false,
        otp: false,
        first_otp: None,
        timezone: "UTC".into(),
        start_date: date(2020, 1, 1),
        expiry_date: date(2099, 1, 1),
        language_id: 1,
        profile_id: None,
        department_id: None,
        job_title: String::new(),
        phones: vec![],
        image: None,
        signature: String::new(),
        notifications: vec![],
        email_confirmed: true,
        last_login: None,
        lifecycle: Lifecycle::Active,
    }
}

/// New User at `address_id`. Ids start at 2 so fixtures never collide with the superuser
/// unless `superuser` is called.
pub fn user(t: &mut Tables, address_id: Id, administrator: bool) -> Id {
    let member_id = t.addresses.get(address_id).map(|a| a.member_id).unwrap_or_default();
    if t.users.len_all() == 0 && t.users.get_any(SUPERUSER_ID).is_none() {
        t.users.put(user_row(SUPERUSER_ID, member_id, address_id));
        t.users.soft_delete(SUPERUSER_ID);
    }
    t.users
        .insert_with(|id| {
            let mut u = user_row(id, member_id, address_id);
            u.administrator = administrator;
            u
        })
        .id
}

pub fn superuser(t: &mut Tables, address_id: Id) -> Id {
    let member_id = t.addresses.get(address_id).map(|a| a.member_id).unwrap_or_default();
    let mut u = user_row(SUPERUSER_ID, member_id, address_id);
    u.administrator = true;
    u.global_user = true;
    u.global_active = true;
    t.users.put(u);
    SUPERUSER_ID
}

pub fn actor(t: &Tables, user_id: Id) -> ActorContext {
    match ActorContext::resolve(t, user_id) {
        Ok(a) => a,
        Err(e) => panic!("fixture actor {} unresolved: {}", user_id, e),
    }
}
