//! Expiry reminder run.
//!
//! Non-administrator Users whose `expiry_date` falls in `[today+4, today+32]` are grouped by
//! Member. Self-managed Members' administrators receive the list directly; for a managed
//! Member the list goes to the administrators of each partner Member that manages it.

use chrono::{Duration, NaiveDate};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::collaborators::{Message, Notifier};
use crate::model::{Id, Member, User};
use crate::store::{Store, Tables};

pub const WINDOW_START_DAYS: i64 = 4;
pub const WINDOW_END_DAYS: i64 = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderSummary {
    pub expiring_users: usize,
    pub sent: usize,
    pub failed: usize,
}

pub fn expiring_users(t: &Tables, today: NaiveDate) -> Vec<&User> {
    let from = today + Duration::days(WINDOW_START_DAYS);
    let to = today + Duration::days(WINDOW_END_DAYS);
    t.users
        .iter()
        .filter(|u| !u.administrator && u.expiry_date >= from && u.expiry_date <= to)
        .collect()
}

/// Members that manage `member_id`: contras of its non-self MemberLinks.
fn managers(t: &Tables, member_id: Id) -> Vec<Id> {
    t.linked_members(member_id).into_iter().filter(|m| *m != member_id).collect()
}

fn admins(t: &Tables, member_id: Id) -> Vec<User> {
    t.users_in_member(member_id).filter(|u| u.administrator).cloned().collect()
}

fn reminder(admin: &User, member: &Member, users: &[&User], template: &str) -> Message {
    let rows: Vec<_> = users
        .iter()
        .map(|u| json!({"id": u.id, "name": u.full_name(), "email": u.email, "expiry_date": u.expiry_date}))
        .collect();
    Message {
        to: admin.email.clone(),
        subject: format!("Membership: users of {} expiring soon", member.name),
        template: template.to_string(),
        context: json!({"first_name": admin.first_name, "member": member.name, "users": rows}),
    }
}

/// Build every reminder for `today` without sending anything.
pub fn plan(t: &Tables, today: NaiveDate) -> (usize, Vec<Message>) {
    let expiring = expiring_users(t, today);
    let mut by_member: BTreeMap<Id, Vec<&User>> = BTreeMap::new();
    for u in &expiring {
        by_member.entry(u.member_id).or_default().push(u);
    }
    let mut messages = Vec::new();
    for (member_id, users) in by_member {
        let Some(member) = t.members.get(member_id) else { continue };
        if member.self_managed {
            for admin in admins(t, member_id) {
                messages.push(reminder(&admin, member, &users, "admin_expiry_reminder"));
            }
        } else {
            for manager in managers(t, member_id) {
                for admin in admins(t, manager) {
                    messages.push(reminder(&admin, member, &users, "non_self_managed_expiry_email"));
                }
            }
        }
    }
    (expiring.len(), messages)
}

pub async fn send_reminders(store: &Store, notifier: &dyn Notifier, today: NaiveDate) -> ReminderSummary {
    let (expiring_users, messages) = store.read(|t| plan(t, today));
    let mut summary = ReminderSummary { expiring_users, ..Default::default() };
    for message in messages {
        let to = message.to.clone();
        match notifier.send(message).await {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(target: "membership::expiry", "reminder to {} not sent: {}", to, e);
            }
        }
    }
    info!(target: "membership::expiry", "{} users expiring, {} reminders sent, {} failed",
        summary.expiring_users, summary.sent, summary.failed);
    summary
}
