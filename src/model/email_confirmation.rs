use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{tenant_record, Id, Lifecycle};

/// How long a confirmation link stays usable.
pub const CONFIRMATION_VALID_HOURS: i64 = 24;

/// A single-use email confirmation link. `email` is the address the link was mailed for;
/// the link is void once the User's email no longer matches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfirmation {
    pub id: Id,
    pub token: String,
    pub user_id: Id,
    pub email: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(EmailConfirmation);

impl EmailConfirmation {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.created >= now - Duration::hours(CONFIRMATION_VALID_HOURS)
    }
}

/// 32 hex characters.
pub fn generate_confirmation_token() -> String { uuid::Uuid::new_v4().simple().to_string() }
