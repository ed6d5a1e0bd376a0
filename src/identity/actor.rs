use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::{Id, SUPERUSER_ID};
use crate::store::Tables;

/// Everything the authorization layer needs to know about the caller, resolved once at
/// the request boundary and passed by value afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: Id,
    pub member_id: Id,
    pub member_self_managed: bool,
    pub member_secret: bool,
    pub address_id: Id,
    pub address_cloud_region: bool,
    pub administrator: bool,
    pub global_user: bool,
    pub global_active: bool,
}

impl ActorContext {
    /// Build the context for `user_id` from current state. Deleted users, or users whose
    /// Member or Address is gone, cannot act.
    pub fn resolve(tables: &Tables, user_id: Id) -> AppResult<Self> {
        let denied = || AppError::auth("membership_auth_002", "user is not active");
        let user = tables.users.get(user_id).ok_or_else(denied)?;
        let member = tables.members.get(user.member_id).ok_or_else(denied)?;
        let address = tables.addresses.get(user.address_id).ok_or_else(denied)?;
        Ok(Self {
            user_id: user.id,
            member_id: member.id,
            member_self_managed: member.self_managed,
            member_secret: member.secret,
            address_id: address.id,
            address_cloud_region: address.cloud_region,
            administrator: user.administrator,
            global_user: user.global_user,
            global_active: user.global_active,
        })
    }

    pub fn is_super(&self) -> bool { self.user_id == SUPERUSER_ID }

    pub fn is_global(&self) -> bool { self.global_user && self.global_active }

    pub fn same_member(&self, member_id: Id) -> bool { self.member_id == member_id }
}
