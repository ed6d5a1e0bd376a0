//! Response shapes. Stored records are flattened and their references expanded.

use serde::Serialize;

use crate::identity::ActorContext;
use crate::model::*;
use crate::permissions;
use crate::store::{LinkGraph, Tables};

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub id: Id,
    pub name: String,
    pub currency_id: Id,
    pub currency: Option<Currency>,
    pub gln_prefix: String,
    pub self_managed: bool,
    pub secret: bool,
    /// Only shown to the Member's own Users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl MemberView {
    pub fn build(t: &Tables, member: &Member, actor: &ActorContext) -> Self {
        let show_key = actor.is_super() || actor.same_member(member.id);
        Self {
            id: member.id,
            name: member.name.clone(),
            currency_id: member.currency_id,
            currency: t.currencies.get(member.currency_id).cloned(),
            gln_prefix: member.gln_prefix.clone(),
            self_managed: member.self_managed,
            secret: member.secret,
            api_key: show_key.then(|| member.api_key.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressView {
    #[serde(flatten)]
    pub address: Address,
    pub full_address: String,
    pub member: Option<MemberView>,
    pub country: Option<Country>,
    pub subdivision: Option<Subdivision>,
    pub currency: Option<Currency>,
    pub language: Option<Language>,
    /// The actor's edge to this Address, when there is one.
    pub link: Option<AddressLink>,
    pub linked: bool,
}

impl AddressView {
    pub fn build(t: &Tables, address: &Address, actor: &ActorContext) -> Self {
        let link = t.address_link(actor.address_id, address.id).cloned();
        Self {
            full_address: address.full_address(),
            member: t.members.get_any(address.member_id).map(|m| MemberView::build(t, m, actor)),
            country: t.countries.get(address.country_id).cloned(),
            subdivision: address.subdivision_id.and_then(|id| t.subdivisions.get(id)).cloned(),
            currency: t.currencies.get(address.currency_id).cloned(),
            language: t.languages.get(address.language_id).cloned(),
            linked: link.is_some(),
            link,
            address: address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressSummary {
    pub id: Id,
    pub name: String,
    pub full_address: String,
    pub cloud_region: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub member: Option<MemberView>,
    pub address: Option<AddressSummary>,
    pub language: Option<Language>,
    pub department: Option<Group>,
    pub profile: Option<Group>,
    pub internal_notifications: Vec<TransactionType>,
    pub external_notifications: Vec<TransactionType>,
}

impl UserView {
    pub fn build(t: &Tables, user: &User, actor: &ActorContext) -> Self {
        let mut user = user.clone();
        if !permissions::user::sees_first_otp(actor, &user) {
            user.first_otp = None;
        }
        let subscribed = |external: bool| {
            user.notifications
                .iter()
                .filter(|n| n.external == external)
                .filter_map(|n| t.transaction_types.get(n.transaction_type_id).cloned())
                .collect::<Vec<_>>()
        };
        let (internal_notifications, external_notifications) = (subscribed(false), subscribed(true));
        Self {
            member: t.members.get_any(user.member_id).map(|m| MemberView::build(t, m, actor)),
            address: t.addresses.get_any(user.address_id).map(|a| AddressSummary {
                id: a.id,
                name: a.name.clone(),
                full_address: a.full_address(),
                cloud_region: a.cloud_region,
            }),
            language: t.languages.get(user.language_id).cloned(),
            department: user.department_id.and_then(|id| t.groups.get(id)).cloned(),
            profile: user.profile_id.and_then(|id| t.groups.get(id)).cloned(),
            internal_notifications,
            external_notifications,
            user,
        }
    }
}
