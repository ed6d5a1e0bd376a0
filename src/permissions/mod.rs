//! Authorization predicates.
//!
//! Each function runs after validation has produced a cleaned value set and only looks
//! at the resolved [`ActorContext`], the stored target, and read-only edge queries via
//! [`LinkGraph`]. Nothing here writes. A denial is a `Forbidden` error carrying the
//! operation's `2xx` code.
//!
//! [`ActorContext`]: crate::identity::ActorContext
//! [`LinkGraph`]: crate::store::LinkGraph

pub mod member;
pub mod address;
pub mod address_link;
pub mod user;
pub mod group;
pub mod notification;
pub mod cloud_bill;
