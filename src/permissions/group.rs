//! Department, Profile, Territory and Team mutations share one rule set.

use crate::error::AppResult;
use crate::identity::ActorContext;
use crate::validation::Codes;

/// Create, update and delete all need a self-managed Member and an administrator.
pub fn mutate(actor: &ActorContext, codes: Codes) -> AppResult<()> {
    if !actor.member_self_managed {
        return Err(codes.denied(201));
    }
    if !actor.administrator {
        return Err(codes.denied(202));
    }
    Ok(())
}

/// Departments and Profiles must be empty, Territories unreferenced. Teams pass `false`.
pub fn delete(actor: &ActorContext, in_use: bool, codes: Codes) -> AppResult<()> {
    mutate(actor, codes)?;
    if in_use {
        return Err(codes.denied(203));
    }
    Ok(())
}
