use super::{active, duplicate_pairs, missing_reciprocals, Check, CheckReport};
use crate::model::Id;
use crate::store::Tables;

pub const ALL: &[Check] = &[
    address_member,
    address_link_reciprocal,
    address_link_duplicates,
    member_link_reciprocal,
    member_link_duplicates,
    user_member_matches_address,
    user_deleted_with_member,
];

fn address_edges(t: &Tables) -> Vec<(Id, Id, Id)> {
    t.address_links.iter().map(|l| (l.id, l.address_id, l.contra_address_id)).collect()
}

fn member_edges(t: &Tables) -> Vec<(Id, Id, Id)> {
    t.member_links.iter().map(|l| (l.id, l.member_id, l.contra_member_id)).collect()
}

/// Every active Address has an active owning Member.
pub fn address_member(t: &Tables) -> CheckReport {
    let mut report = CheckReport { name: "address_member", ..Default::default() };
    for a in t.addresses.iter() {
        report.records_inspected += 1;
        if t.members.get(a.member_id).is_none() {
            report.errors.push(format!("{}, {}", a.id, a.member_id));
        }
    }
    report
}

pub fn address_link_reciprocal(t: &Tables) -> CheckReport {
    let (records_inspected, errors) = missing_reciprocals(&address_edges(t));
    CheckReport { name: "address_link_reciprocal", records_inspected, errors }
}

pub fn address_link_duplicates(t: &Tables) -> CheckReport {
    let (records_inspected, errors) = duplicate_pairs(&address_edges(t));
    CheckReport { name: "address_link_duplicates", records_inspected, errors }
}

pub fn member_link_reciprocal(t: &Tables) -> CheckReport {
    let (records_inspected, errors) = missing_reciprocals(&member_edges(t));
    CheckReport { name: "member_link_reciprocal", records_inspected, errors }
}

pub fn member_link_duplicates(t: &Tables) -> CheckReport {
    let (records_inspected, errors) = duplicate_pairs(&member_edges(t));
    CheckReport { name: "member_link_duplicates", records_inspected, errors }
}

pub fn user_member_matches_address(t: &Tables) -> CheckReport {
    let mut report = CheckReport { name: "user_member_matches_address", ..Default::default() };
    for u in t.users.iter() {
        report.records_inspected += 1;
        let address_member = t.addresses.get_any(u.address_id).map(|a| a.member_id);
        if address_member != Some(u.member_id) {
            report.errors.push(format!("{}, {}, {}", u.id, u.member_id, u.address_id));
        }
    }
    report
}

/// Deleting a Member does not cascade at write time; this catches the leftovers.
pub fn user_deleted_with_member(t: &Tables) -> CheckReport {
    let mut report = CheckReport {
        name: "user_deleted_with_member",
        records_inspected: t.users.iter().count() as u64,
        ..Default::default()
    };
    for m in t.members.iter_all().filter(|m| !active(*m)) {
        for u in t.users.iter().filter(|u| u.member_id == m.id) {
            report.errors.push(format!("{}, {}", u.id, m.id));
        }
    }
    report
}
