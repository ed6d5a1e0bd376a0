//! In-process persistence for the membership directory.
//!
//! All tables live behind one `parking_lot::RwLock`. Each public operation takes the lock
//! once, so it is atomic on its own, and returns owned values. Callers must not hold a
//! guard across an `.await`; the closure-based `read`/`write` helpers make that impossible.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::model::*;
use crate::tprintln;

mod graph;
mod snapshot;
#[cfg(test)]
pub(crate) mod fixtures;

pub use graph::LinkGraph;

/// One table of records keyed by id. Accessors without the `_any`/`_all` suffix only see
/// active records. Rows are never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table<T> {
    rows: BTreeMap<Id, T>,
    next_id: Id,
}

impl<T> Default for Table<T> {
    fn default() -> Self { Self { rows: BTreeMap::new(), next_id: 1 } }
}

impl<T: Record> Table<T> {
    pub fn get(&self, id: Id) -> Option<&T> {
        self.rows.get(&id).filter(|r| r.lifecycle().is_active())
    }

    pub fn get_any(&self, id: Id) -> Option<&T> { self.rows.get(&id) }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values().filter(|r| r.lifecycle().is_active())
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &T> { self.rows.values() }

    pub fn len_all(&self) -> usize { self.rows.len() }

    pub fn insert_with(&mut self, build: impl FnOnce(Id) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    /// Insert a row with a caller-chosen id (bootstrap and fixtures).
    pub fn put(&mut self, row: T) {
        let id = row.id();
        if id >= self.next_id { self.next_id = id + 1; }
        self.rows.insert(id, row);
    }

    /// Replace an active row. Returns false when the row is missing or deleted.
    pub fn replace(&mut self, row: T) -> bool {
        match self.rows.get_mut(&row.id()) {
            Some(cur) if cur.lifecycle().is_active() => { *cur = row; true }
            _ => false,
        }
    }

    pub fn soft_delete(&mut self, id: Id) -> Option<T> {
        let row = self.rows.get_mut(&id).filter(|r| r.lifecycle().is_active())?;
        row.set_lifecycle(Lifecycle::Deleted { at: Utc::now() });
        Some(row.clone())
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.rows.get_mut(&id).filter(|r| r.lifecycle().is_active())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub members: Table<Member>,
    pub member_links: Table<MemberLink>,
    pub addresses: Table<Address>,
    pub address_links: Table<AddressLink>,
    pub users: Table<User>,
    pub groups: Table<Group>,
    pub teams: Table<Team>,
    pub countries: Table<Country>,
    pub subdivisions: Table<Subdivision>,
    pub currencies: Table<Currency>,
    pub languages: Table<Language>,
    pub transaction_types: Table<TransactionType>,
    pub integrity_runs: Table<IntegrityRun>,
    #[serde(default)]
    pub email_confirmations: Table<EmailConfirmation>,
}

impl Tables {
    pub fn member_of_address(&self, address_id: Id) -> Option<&Member> {
        self.addresses.get(address_id).and_then(|a| self.members.get(a.member_id))
    }

    pub fn users_in_member(&self, member_id: Id) -> impl Iterator<Item = &User> {
        self.users.iter().filter(move |u| u.member_id == member_id)
    }

    pub fn email_taken(&self, member_id: Id, email: &str, except: Option<Id>) -> bool {
        self.users_in_member(member_id)
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    pub fn find_user_by_email(&self, member_id: Id, email: &str) -> Option<&User> {
        self.users_in_member(member_id).find(|u| u.email.eq_ignore_ascii_case(email))
    }

    /// Live confirmation link for `token`, regardless of age.
    pub fn email_confirmation(&self, token: &str) -> Option<&EmailConfirmation> {
        self.email_confirmations.iter().find(|c| c.token == token)
    }

    pub fn robot_at_address(&self, address_id: Id, except: Option<Id>) -> bool {
        self.users.iter().any(|u| u.robot && u.address_id == address_id && Some(u.id) != except)
    }

    pub fn group(&self, kind: GroupKind, member_id: Id, id: Id) -> Option<&Group> {
        self.groups.get(id).filter(|g| g.kind == kind && g.member_id == member_id)
    }

    pub fn group_name_taken(&self, kind: GroupKind, member_id: Id, name: &str, except: Option<Id>) -> bool {
        self.groups.iter().any(|g| {
            g.kind == kind && g.member_id == member_id && Some(g.id) != except && g.name == name
        })
    }

    /// Departments and Profiles are in use while any active User references them;
    /// Territories while any active AddressLink does.
    pub fn group_in_use(&self, kind: GroupKind, id: Id) -> bool {
        match kind {
            GroupKind::Department => self.users.iter().any(|u| u.department_id == Some(id)),
            GroupKind::Profile => self.users.iter().any(|u| u.profile_id == Some(id)),
            GroupKind::Territory => self.address_links.iter().any(|l| l.territory_id == Some(id)),
        }
    }

    /// Compare-and-clear of a pending first OTP. Only the first caller presenting the
    /// matching code wins.
    pub fn consume_first_otp(&mut self, user_id: Id, code: u32) -> bool {
        match self.users.get_mut(user_id) {
            Some(u) if u.otp && u.first_otp == Some(code) => {
                u.first_otp = None;
                true
            }
            _ => false,
        }
    }

    /// Create an empty `address -> contra` edge unless an active one already exists.
    /// Returns the created edge.
    pub fn ensure_address_link(&mut self, address_id: Id, contra_address_id: Id) -> Option<AddressLink> {
        if self.address_link(address_id, contra_address_id).is_some() {
            return None;
        }
        Some(self.address_links.insert_with(|id| AddressLink::bare(id, address_id, contra_address_id)))
    }

    pub fn ensure_member_link(&mut self, member_id: Id, contra_member_id: Id) -> Option<MemberLink> {
        if self.member_link_exists(member_id, contra_member_id) {
            return None;
        }
        Some(self.member_links.insert_with(|id| MemberLink {
            id,
            member_id,
            contra_member_id,
            lifecycle: Lifecycle::Active,
        }))
    }
}

/// Cloneable handle to the shared tables plus the snapshot directory, if any.
#[derive(Clone, Default)]
pub struct Store {
    tables: Arc<RwLock<Tables>>,
    dir: Option<PathBuf>,
}

impl Store {
    pub fn in_memory() -> Self { Self::default() }

    /// Open a store rooted at `dir`, loading the last snapshot when present.
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let tables = match snapshot::load(&dir)? {
            Some(t) => {
                info!(target: "membership::store", "loaded snapshot from {:?}: members={}, addresses={}, users={}",
                    dir, t.members.len_all(), t.addresses.len_all(), t.users.len_all());
                t
            }
            None => {
                info!(target: "membership::store", "no snapshot under {:?}; starting empty", dir);
                Tables::default()
            }
        };
        Ok(Self { tables: Arc::new(RwLock::new(tables)), dir: Some(dir) })
    }

    pub fn dir(&self) -> Option<&Path> { self.dir.as_deref() }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let guard = self.tables.read();
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut guard = self.tables.write();
        f(&mut guard)
    }

    pub fn is_empty(&self) -> bool {
        self.read(|t| t.members.len_all() == 0 && t.users.len_all() == 0)
    }

    pub fn consume_first_otp(&self, user_id: Id, code: u32) -> bool {
        let won = self.write(|t| t.consume_first_otp(user_id, code));
        tprintln!("store.consume_first_otp user={} won={}", user_id, won);
        won
    }

    /// Write a snapshot if the store has a directory. In-memory stores are a no-op.
    pub fn persist(&self) -> anyhow::Result<()> {
        let Some(dir) = self.dir.as_ref() else { return Ok(()); };
        let bytes = self.read(snapshot::encode)?;
        snapshot::write_atomic(dir, &bytes)?;
        debug!(target: "membership::store", "snapshot written ({} bytes)", bytes.len());
        Ok(())
    }

    /// Persist on a fixed interval until the runtime shuts down.
    pub fn spawn_persistence(&self, every: std::time::Duration) -> Option<tokio::task::JoinHandle<()>> {
        self.dir.as_ref()?;
        let this = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = this.persist() {
                    warn!(target: "membership::store", "snapshot failed: {}", e);
                }
            }
        }))
    }
}
