use super::{ListParams, Membership, Page, UserView};
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::Id;
use crate::permissions;
use crate::validation::Codes;

impl Membership {
    /// Users to notify about a Transaction Type raised against `address_id`: subscribers at
    /// the Address plus subscribed global active Users of its Member. Expired Users are
    /// dropped unless they administer; private ones too when the Member is self-managed.
    pub fn notification_recipients(
        &self,
        actor: &ActorContext,
        address_id: Id,
        transaction_type_id: Id,
        params: ListParams,
    ) -> AppResult<Page<UserView>> {
        let codes = Codes::new("notification", "list");
        let today = self.today();
        let views = self.store.read(|t| {
            let address = t.addresses.get(address_id).ok_or_else(|| codes.missing(1))?;
            t.transaction_types.get(transaction_type_id).ok_or_else(|| codes.missing(2))?;
            permissions::notification::list(actor, address_id, t)?;
            let self_managed = t.members.get_any(address.member_id).is_some_and(|m| m.self_managed);
            let views = t
                .users
                .iter()
                .filter(|u| u.notifications.iter().any(|n| n.transaction_type_id == transaction_type_id))
                .filter(|u| u.address_id == address_id || (u.member_id == address.member_id && u.global_active))
                .filter(|u| u.administrator || (!u.is_expired(today) && !(self_managed && u.is_private)))
                .map(|u| UserView::build(t, u, actor))
                .collect::<Vec<_>>();
            Ok::<_, AppError>(views)
        })?;
        Ok(params.paginate(views))
    }
}
