use chrono::NaiveDate;

use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::model::{Address, Member, User};
use crate::store::LinkGraph;
use crate::validation::user::UserChanges;
use crate::validation::Codes;

/// Administrators create Users in their self-managed Member or a non-self-managed partner.
pub fn create(actor: &ActorContext, target_member: &Member) -> AppResult<()> {
    let codes = Codes::new("user", "create");
    if actor.is_super() {
        return Ok(());
    }
    if !actor.member_self_managed {
        return Err(codes.denied(201));
    }
    if !actor.same_member(target_member.id) && target_member.self_managed {
        return Err(codes.denied(202));
    }
    if !actor.administrator {
        return Err(codes.denied(203));
    }
    Ok(())
}

/// `linked` is whether the actor's Address has an edge to the subject's Address.
pub fn read(actor: &ActorContext, subject: &User, subject_member: &Member, linked: bool, today: NaiveDate) -> AppResult<()> {
    let codes = Codes::new("user", "read");
    if actor.is_super() {
        return Ok(());
    }
    if linked && !actor.same_member(subject.member_id) {
        if subject_member.self_managed && !subject.administrator {
            if subject.expiry_date < today {
                return Err(codes.denied(201));
            }
            if subject.is_private {
                return Err(codes.denied(202));
            }
        }
        return Ok(());
    }
    if !linked {
        if !actor.same_member(subject.member_id) {
            return Err(codes.denied(203));
        }
        if !actor.is_global() {
            return Err(codes.denied(204));
        }
    }
    Ok(())
}

/// List filter applied after the reachability scan: partner Users appear when they
/// administer, when their Member is managed, or when they are active and public.
pub fn listed(actor: &ActorContext, subject: &User, subject_member: &Member, today: NaiveDate) -> bool {
    subject.administrator
        || actor.same_member(subject.member_id)
        || !subject_member.self_managed
        || (subject.expiry_date >= today && !subject.is_private)
}

/// Pending first-login codes are shown to administrators of the subject's Member only.
pub fn sees_first_otp(actor: &ActorContext, subject: &User) -> bool {
    actor.administrator && actor.same_member(subject.member_id)
}

pub fn update(
    actor: &ActorContext,
    subject: &User,
    subject_member: &Member,
    subject_address: &Address,
    changes: &UserChanges,
    graph: &impl LinkGraph,
) -> AppResult<()> {
    let codes = Codes::new("user", "update");
    if actor.is_super() {
        return Ok(());
    }
    if subject.administrator != changes.administrator || subject.robot != changes.robot {
        return Err(codes.denied(201));
    }
    if !actor.member_self_managed {
        return Err(codes.denied(202));
    }
    if (!actor.same_member(subject.member_id) || !actor.is_global())
        && !graph.address_link_exists(actor.address_id, subject_address.id)
    {
        return Err(codes.denied(203));
    }
    if !actor.same_member(subject.member_id) && subject_member.self_managed {
        return Err(codes.denied(204));
    }
    if !actor.administrator && actor.user_id != subject.id {
        return Err(codes.denied(205));
    }
    if subject.address_id != changes.address_id && !actor.administrator && !subject.global_active {
        return Err(codes.denied(206));
    }
    Ok(())
}
