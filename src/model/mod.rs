//! Tenant-owned records and reference data.
//!
//! Every tenant-owned record carries a [`Lifecycle`]. Records are never removed from the
//! store; deletion moves them to `Deleted` and the store's default accessors hide them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference data is never deleted.
macro_rules! static_record {
    ($ty:ty) => {
        impl $crate::model::Record for $ty {
            fn id(&self) -> $crate::model::Id { self.id }
            fn lifecycle(&self) -> $crate::model::Lifecycle { $crate::model::Lifecycle::Active }
            fn set_lifecycle(&mut self, _lifecycle: $crate::model::Lifecycle) {}
        }
    };
}

macro_rules! tenant_record {
    ($ty:ty) => {
        impl $crate::model::Record for $ty {
            fn id(&self) -> $crate::model::Id { self.id }
            fn lifecycle(&self) -> $crate::model::Lifecycle { self.lifecycle }
            fn set_lifecycle(&mut self, lifecycle: $crate::model::Lifecycle) { self.lifecycle = lifecycle; }
        }
    };
}

pub(crate) use static_record;
pub(crate) use tenant_record;

mod member;
mod address;
mod address_link;
mod user;
mod group;
mod reference;
mod email_confirmation;

pub use member::{generate_api_key, Member, MemberLink};
pub use address::{Address, Phone};
pub use address_link::AddressLink;
pub use user::{Notification, OtpState, User};
pub use group::{Group, GroupKind, Team};
pub use reference::{Country, Currency, Language, Subdivision, TransactionType};
pub use email_confirmation::{generate_confirmation_token, EmailConfirmation, CONFIRMATION_VALID_HOURS};

pub type Id = u64;

/// The reserved superuser account.
pub const SUPERUSER_ID: Id = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted { at: DateTime<Utc> },
}

impl Lifecycle {
    pub fn is_active(&self) -> bool { matches!(self, Lifecycle::Active) }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted { at } => Some(*at),
        }
    }
}

/// Implemented by everything held in a store table.
pub trait Record: Clone {
    fn id(&self) -> Id;
    fn lifecycle(&self) -> Lifecycle;
    fn set_lifecycle(&mut self, lifecycle: Lifecycle);
}

/// Summary row persisted by each integrity run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRun {
    pub id: Id,
    pub errors_found: u64,
    pub records_inspected: u64,
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
}

static_record!(IntegrityRun);
