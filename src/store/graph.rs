//! Read-only queries over the AddressLink / MemberLink edge sets.

use crate::model::{AddressLink, Id};

use super::Tables;

/// Existence queries the authorization layer is allowed to make.
pub trait LinkGraph {
    fn address_link(&self, address_id: Id, contra_address_id: Id) -> Option<&AddressLink>;

    fn address_link_exists(&self, address_id: Id, contra_address_id: Id) -> bool {
        self.address_link(address_id, contra_address_id).is_some()
    }

    fn member_link_exists(&self, member_id: Id, contra_member_id: Id) -> bool;

    /// True when `address_id` has an edge to any active Address of `member_id`.
    fn links_into_member(&self, address_id: Id, member_id: Id) -> bool;
}

impl LinkGraph for Tables {
    fn address_link(&self, address_id: Id, contra_address_id: Id) -> Option<&AddressLink> {
        self.address_links
            .iter()
            .find(|l| l.address_id == address_id && l.contra_address_id == contra_address_id)
    }

    fn member_link_exists(&self, member_id: Id, contra_member_id: Id) -> bool {
        self.member_links
            .iter()
            .any(|l| l.member_id == member_id && l.contra_member_id == contra_member_id)
    }

    fn links_into_member(&self, address_id: Id, member_id: Id) -> bool {
        self.address_links
            .iter()
            .filter(|l| l.address_id == address_id)
            .any(|l| self.addresses.get(l.contra_address_id).map(|a| a.member_id) == Some(member_id))
    }
}

impl Tables {
    /// Contra ids of every active edge leaving `address_id`.
    pub fn linked_addresses(&self, address_id: Id) -> Vec<Id> {
        let mut ids: Vec<Id> = self
            .address_links
            .iter()
            .filter(|l| l.address_id == address_id)
            .map(|l| l.contra_address_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn linked_members(&self, member_id: Id) -> Vec<Id> {
        let mut ids: Vec<Id> = self
            .member_links
            .iter()
            .filter(|l| l.member_id == member_id)
            .map(|l| l.contra_member_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
