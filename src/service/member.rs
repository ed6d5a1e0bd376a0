use serde_json::Value;
use tracing::info;

use super::{ListParams, Membership, MemberView, Page};
use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::{generate_api_key, Id, Lifecycle, Member, MemberLink};
use crate::permissions;
use crate::validation::{self, Codes};

impl Membership {
    /// New Members start managed by the creating actor's Member, linked both ways.
    pub fn create_member(&self, actor: &ActorContext, body: &Value) -> AppResult<MemberView> {
        let draft = self.store.read(|t| validation::member::create(body, t))?;
        permissions::member::create(actor)?;
        let view = self.store.write(|t| {
            let member = t.members.insert_with(|id| Member {
                id,
                name: draft.name,
                currency_id: draft.currency_id,
                gln_prefix: draft.gln_prefix,
                self_managed: false,
                secret: draft.secret,
                api_key: generate_api_key(),
                lifecycle: Lifecycle::Active,
            });
            t.ensure_member_link(member.id, member.id);
            t.ensure_member_link(actor.member_id, member.id);
            t.ensure_member_link(member.id, actor.member_id);
            MemberView::build(t, &member, actor)
        });
        info!(target: "membership::member", "member {} created by user {}", view.id, actor.user_id);
        Ok(view)
    }

    pub fn read_member(&self, actor: &ActorContext, id: Id) -> AppResult<MemberView> {
        self.store.read(|t| {
            let member = t.members.get(id).ok_or_else(|| Codes::new("member", "read").missing(1))?;
            permissions::member::read(actor, id, t)?;
            Ok(MemberView::build(t, member, actor))
        })
    }

    pub fn update_member(&self, actor: &ActorContext, id: Id, body: &Value) -> AppResult<MemberView> {
        let (current, changes) = self.store.read(|t| {
            let current = t.members.get(id).cloned().ok_or_else(|| Codes::new("member", "update").missing(1))?;
            let changes = validation::member::update(body, &current, t)?;
            let promoting = changes.self_managed_requested && changes.self_managed;
            permissions::member::update(actor, &current, promoting, t)?;
            Ok::<_, crate::error::AppError>((current, changes))
        })?;
        let view = self.store.write(|t| {
            let mut member = current.clone();
            member.name = changes.name;
            member.currency_id = changes.currency_id;
            member.gln_prefix = changes.gln_prefix;
            member.self_managed = changes.self_managed;
            member.secret = changes.secret;
            if !t.members.replace(member.clone()) {
                return Err(Codes::new("member", "update").missing(1));
            }
            Ok(MemberView::build(t, &member, actor))
        })?;
        if view.self_managed && !current.self_managed {
            info!(target: "membership::member", "member {} is now self-managed", id);
        }
        Ok(view)
    }

    /// Members reachable by a MemberLink from the actor's Member; everything for the superuser.
    pub fn list_members(&self, actor: &ActorContext, params: ListParams) -> Page<MemberView> {
        let views = self.store.read(|t| {
            let ids: Vec<Id> = match actor.is_super() {
                true => t.members.iter().map(|m| m.id).collect(),
                false => t.linked_members(actor.member_id),
            };
            ids.iter().filter_map(|id| t.members.get(*id)).map(|m| MemberView::build(t, m, actor)).collect()
        });
        params.paginate(views)
    }

    pub fn read_member_link(&self, actor: &ActorContext, member_id: Id, contra_member_id: Id) -> AppResult<MemberLink> {
        permissions::member::read_link(actor, member_id)?;
        self.store.read(|t| {
            t.member_links
                .iter()
                .find(|l| l.member_id == member_id && l.contra_member_id == contra_member_id)
                .cloned()
                .ok_or_else(|| Codes::new("member_link", "read").missing(1))
        })
    }
}
