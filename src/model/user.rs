use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{tenant_record, Id, Lifecycle, Phone, SUPERUSER_ID};

/// Subscription to a Transaction Type. `external` selects transactions raised by other Members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub transaction_type_id: Id,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub member_id: Id,
    pub address_id: Id,
    pub first_name: String,
    pub surname: String,
    /// Stored lowercased; unique per Member.
    pub email: String,
    pub administrator: bool,
    pub global_user: bool,
    pub global_active: bool,
    pub is_private: bool,
    pub robot: bool,
    pub otp: bool,
    /// Pending onboarding challenge while `otp` is set and the first login has not happened.
    pub first_otp: Option<u32>,
    pub timezone: String,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub language_id: Id,
    pub profile_id: Option<Id>,
    pub department_id: Option<Id>,
    pub job_title: String,
    pub phones: Vec<Phone>,
    pub image: Option<String>,
    pub signature: String,
    pub notifications: Vec<Notification>,
    pub email_confirmed: bool,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

tenant_record!(User);

/// Second-factor state derived from `otp` and `first_otp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpState {
    Disabled,
    PendingFirst(u32),
    Established,
}

impl User {
    pub fn otp_state(&self) -> OtpState {
        match (self.otp, self.first_otp) {
            (false, _) => OtpState::Disabled,
            (true, Some(code)) => OtpState::PendingFirst(code),
            (true, None) => OtpState::Established,
        }
    }

    pub fn is_superuser(&self) -> bool { self.id == SUPERUSER_ID }

    /// Administrators never expire.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        !self.administrator && self.expiry_date < today
    }

    pub fn is_global(&self) -> bool { self.global_user && self.global_active }

    pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.surname) }
}
