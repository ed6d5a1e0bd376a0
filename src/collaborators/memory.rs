//! In-process collaborator implementations.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use super::{CollabResult, CollaboratorError, DirectoryStore, Message, Notifier, ObjectStore, OtpVerifier};
use crate::model::Id;
use crate::tprintln;

fn hash_password(password: &str) -> CollabResult<String> {
    let fail = |e: String| CollaboratorError::Rejected { service: "directory", detail: e };
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| fail(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| fail(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| fail(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
struct Account {
    password_hash: String,
    members: BTreeSet<Id>,
}

/// Argon2-backed account store. `set_available(false)` simulates an outage.
#[derive(Debug)]
pub struct MemoryDirectory {
    accounts: RwLock<HashMap<String, Account>>,
    available: AtomicBool,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self { accounts: RwLock::new(HashMap::new()), available: AtomicBool::new(true) }
    }
}

impl MemoryDirectory {
    pub fn set_available(&self, up: bool) { self.available.store(up, Ordering::SeqCst); }

    fn check_up(&self) -> CollabResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CollaboratorError::Unavailable { service: "directory", detail: "connection refused".into() })
        }
    }

    pub fn members_of(&self, email: &str) -> Option<BTreeSet<Id>> {
        self.accounts.read().get(&email.to_lowercase()).map(|a| a.members.clone())
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn exists(&self, email: &str) -> CollabResult<bool> {
        self.check_up()?;
        Ok(self.accounts.read().contains_key(&email.to_lowercase()))
    }

    async fn create(&self, email: &str, password: &str, member_id: Id) -> CollabResult<()> {
        self.check_up()?;
        if password.is_empty() {
            return Err(CollaboratorError::Rejected { service: "directory", detail: "empty password".into() });
        }
        let password_hash = hash_password(password)?;
        let mut accounts = self.accounts.write();
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(CollaboratorError::Rejected { service: "directory", detail: format!("{} exists", key) });
        }
        accounts.insert(key, Account { password_hash, members: BTreeSet::from([member_id]) });
        tprintln!("directory.create email={} member={}", email, member_id);
        Ok(())
    }

    async fn add_member(&self, email: &str, member_id: Id) -> CollabResult<()> {
        self.check_up()?;
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&email.to_lowercase()).ok_or_else(|| CollaboratorError::Rejected {
            service: "directory",
            detail: format!("no account for {}", email),
        })?;
        account.members.insert(member_id);
        Ok(())
    }

    async fn remove_member(&self, email: &str, member_id: Id) -> CollabResult<()> {
        self.check_up()?;
        if let Some(account) = self.accounts.write().get_mut(&email.to_lowercase()) {
            account.members.remove(&member_id);
        }
        Ok(())
    }

    async fn set_password(&self, email: &str, password: &str) -> CollabResult<()> {
        self.check_up()?;
        let password_hash = hash_password(password)?;
        let mut accounts = self.accounts.write();
        match accounts.get_mut(&email.to_lowercase()) {
            Some(account) => {
                account.password_hash = password_hash;
                Ok(())
            }
            None => Err(CollaboratorError::Rejected { service: "directory", detail: format!("no account for {}", email) }),
        }
    }

    async fn delete(&self, email: &str) -> CollabResult<()> {
        self.check_up()?;
        self.accounts.write().remove(&email.to_lowercase());
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> CollabResult<bool> {
        self.check_up()?;
        let hash = match self.accounts.read().get(&email.to_lowercase()) {
            Some(a) => a.password_hash.clone(),
            None => return Ok(false),
        };
        Ok(verify_password(&hash, password))
    }
}

/// OTP verifier that accepts codes registered per email. Used when no OTP service URL is
/// configured and as a test double.
#[derive(Debug, Default)]
pub struct StaticOtpVerifier {
    codes: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticOtpVerifier {
    pub fn register(&self, email: &str, code: &str) {
        self.codes.write().entry(email.to_lowercase()).or_default().insert(code.to_string());
    }
}

#[async_trait]
impl OtpVerifier for StaticOtpVerifier {
    async fn verify(&self, email: &str, code: &str) -> CollabResult<bool> {
        Ok(self.codes.read().get(&email.to_lowercase()).map(|c| c.contains(code)).unwrap_or(false))
    }
}

/// Bucketed blob store keeping objects in memory.
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    buckets: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
    available: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), buckets: RwLock::new(HashMap::new()), available: AtomicBool::new(true) }
    }

    pub fn set_available(&self, up: bool) { self.available.store(up, Ordering::SeqCst); }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map(|b| b.len()).unwrap_or(0)
    }

    fn check_up(&self) -> CollabResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CollaboratorError::Unavailable { service: "object store", detail: "connection refused".into() })
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> CollabResult<()> {
        self.check_up()?;
        self.buckets.write().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_object(&self, bucket: &str, name: &str, data: Vec<u8>) -> CollabResult<String> {
        self.check_up()?;
        let mut buckets = self.buckets.write();
        let b = buckets.get_mut(bucket).ok_or_else(|| CollaboratorError::Rejected {
            service: "object store",
            detail: format!("no bucket {}", bucket),
        })?;
        b.insert(name.to_string(), data);
        Ok(format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, name))
    }

    async fn remove_object(&self, bucket: &str, name: &str) -> CollabResult<()> {
        self.check_up()?;
        if let Some(b) = self.buckets.write().get_mut(bucket) {
            b.remove(name);
        }
        Ok(())
    }
}

/// Logs every message and keeps a copy for inspection.
#[derive(Debug)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Message>>,
    available: AtomicBool,
}

impl Default for RecordingNotifier {
    fn default() -> Self { Self { sent: RwLock::new(Vec::new()), available: AtomicBool::new(true) } }
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Message> { self.sent.read().clone() }

    pub fn set_available(&self, up: bool) { self.available.store(up, Ordering::SeqCst); }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: Message) -> CollabResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable { service: "email", detail: "smtp relay down".into() });
        }
        info!(target: "membership::email", "email to={} template={} subject='{}'", message.to, message.template, message.subject);
        self.sent.write().push(message);
        Ok(())
    }
}
