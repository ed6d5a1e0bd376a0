//! Department, Profile, Territory and Team CRUD, always scoped to the actor's Member.

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::info;

use super::{ListParams, Membership, Page};
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::{Group, GroupKind, Id, Lifecycle, Team};
use crate::permissions;
use crate::validation::{self, Codes};

impl Membership {
    pub fn create_group(&self, actor: &ActorContext, kind: GroupKind, body: &Value) -> AppResult<Group> {
        let codes = Codes::new(kind.as_str(), "create");
        let name = self.store.read(|t| validation::group::group_name(body, kind, actor.member_id, None, codes, t))?;
        permissions::group::mutate(actor, codes)?;
        let group = self.store.write(|t| {
            t.groups.insert_with(|id| Group { id, kind, member_id: actor.member_id, name, lifecycle: Lifecycle::Active })
        });
        info!(target: "membership::group", "{} {} created in member {}", kind.as_str(), group.id, group.member_id);
        Ok(group)
    }

    pub fn read_group(&self, actor: &ActorContext, kind: GroupKind, id: Id) -> AppResult<Group> {
        self.store.read(|t| {
            t.group(kind, actor.member_id, id).cloned().ok_or_else(|| Codes::new(kind.as_str(), "read").missing(1))
        })
    }

    pub fn update_group(&self, actor: &ActorContext, kind: GroupKind, id: Id, body: &Value) -> AppResult<Group> {
        let codes = Codes::new(kind.as_str(), "update");
        let group = self.store.read(|t| {
            let current = t.group(kind, actor.member_id, id).cloned().ok_or_else(|| codes.missing(1))?;
            let name = validation::group::group_name(body, kind, actor.member_id, Some((id, &current.name)), codes, t)?;
            Ok::<_, AppError>(Group { name, ..current })
        })?;
        permissions::group::mutate(actor, codes)?;
        self.store.write(|t| match t.groups.replace(group.clone()) {
            true => Ok(()),
            false => Err(codes.missing(1)),
        })?;
        Ok(group)
    }

    /// Departments and Profiles must have no Users, Territories no AddressLinks.
    pub fn delete_group(&self, actor: &ActorContext, kind: GroupKind, id: Id) -> AppResult<()> {
        let codes = Codes::new(kind.as_str(), "delete");
        self.store.write(|t| {
            t.group(kind, actor.member_id, id).ok_or_else(|| codes.missing(1))?;
            permissions::group::delete(actor, t.group_in_use(kind, id), codes)?;
            t.groups.soft_delete(id);
            Ok::<_, AppError>(())
        })?;
        info!(target: "membership::group", "{} {} deleted by user {}", kind.as_str(), id, actor.user_id);
        Ok(())
    }

    pub fn list_groups(&self, actor: &ActorContext, kind: GroupKind, params: ListParams) -> Page<Group> {
        let groups = self.store.read(|t| {
            t.groups.iter().filter(|g| g.kind == kind && g.member_id == actor.member_id).cloned().collect()
        });
        params.paginate(groups)
    }

    pub fn create_team(&self, actor: &ActorContext, body: &Value) -> AppResult<Team> {
        let codes = Codes::new("team", "create");
        let draft = self.store.read(|t| validation::group::team(body, actor.member_id, None, codes, t))?;
        permissions::group::mutate(actor, codes)?;
        let team = self.store.write(|t| {
            t.teams.insert_with(|id| Team {
                id,
                member_id: actor.member_id,
                name: draft.name,
                user_ids: draft.user_ids.unwrap_or_default(),
                lifecycle: Lifecycle::Active,
            })
        });
        info!(target: "membership::group", "team {} created with {} users", team.id, team.user_ids.len());
        Ok(team)
    }

    fn team_in_member(&self, actor: &ActorContext, id: Id, codes: Codes) -> AppResult<Team> {
        self.store.read(|t| {
            t.teams.get(id).filter(|team| team.member_id == actor.member_id).cloned().ok_or_else(|| codes.missing(1))
        })
    }

    pub fn read_team(&self, actor: &ActorContext, id: Id) -> AppResult<Team> {
        self.team_in_member(actor, id, Codes::new("team", "read"))
    }

    pub fn update_team(&self, actor: &ActorContext, id: Id, body: &Value) -> AppResult<Team> {
        let codes = Codes::new("team", "update");
        let current = self.team_in_member(actor, id, codes)?;
        let draft = self.store.read(|t| validation::group::team(body, actor.member_id, Some(&current.name), codes, t))?;
        permissions::group::mutate(actor, codes)?;
        let team = Team {
            name: draft.name,
            user_ids: draft.user_ids.unwrap_or_else(|| current.user_ids.clone()),
            ..current
        };
        self.store.write(|t| match t.teams.replace(team.clone()) {
            true => Ok(()),
            false => Err(codes.missing(1)),
        })?;
        Ok(team)
    }

    /// Teams may be deleted while populated; their Users are detached first.
    pub fn delete_team(&self, actor: &ActorContext, id: Id) -> AppResult<()> {
        let codes = Codes::new("team", "delete");
        self.team_in_member(actor, id, codes)?;
        permissions::group::delete(actor, false, codes)?;
        self.store.write(|t| {
            if let Some(team) = t.teams.get_mut(id) {
                team.user_ids = BTreeSet::new();
            }
            t.teams.soft_delete(id);
        });
        info!(target: "membership::group", "team {} deleted by user {}", id, actor.user_id);
        Ok(())
    }

    pub fn list_teams(&self, actor: &ActorContext, params: ListParams) -> Page<Team> {
        let teams = self.store.read(|t| t.teams.iter().filter(|team| team.member_id == actor.member_id).cloned().collect());
        params.paginate(teams)
    }
}
