#![allow(dead_code)]

use std::sync::Arc;

use membership::collaborators::{Collaborators, MemoryDirectory, MemoryObjectStore, RecordingNotifier, StaticOtpVerifier};
use membership::config::Config;
use membership::identity::ActorContext;
use membership::model::{Id, SUPERUSER_ID};
use membership::service::Membership;
use membership::store::Store;
use serde_json::{json, Value};

/// A bootstrapped service with handles on every in-process collaborator.
pub struct World {
    pub svc: Membership,
    pub root: ActorContext,
    pub directory: Arc<MemoryDirectory>,
    pub otp: Arc<StaticOtpVerifier>,
    pub objects: Arc<MemoryObjectStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn world_with(store: Store) -> anyhow::Result<World> {
    let directory = Arc::new(MemoryDirectory::default());
    let otp = Arc::new(StaticOtpVerifier::default());
    let objects = Arc::new(MemoryObjectStore::new("memory://objects"));
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        directory: directory.clone(),
        otp: otp.clone(),
        objects: objects.clone(),
        notifier: notifier.clone(),
    };
    let config = Config::default();
    membership::bootstrap::ensure_root(&store, &collaborators, &config).await?;
    let root = store.read(|t| ActorContext::resolve(t, SUPERUSER_ID))?;
    let svc = Membership::new(store, collaborators, config);
    Ok(World { svc, root, directory, otp, objects, notifier })
}

pub async fn world() -> anyhow::Result<World> { world_with(Store::in_memory()).await }

pub fn address_body(member_id: Id, name: &str) -> Value {
    json!({
        "member_id": member_id,
        "name": name,
        "address1": "Unit 4",
        "city": "Cork",
        "country_id": 1,
        "language_id": 1,
        "currency_id": 1,
    })
}

pub fn user_body(address_id: Id, email: &str) -> Value {
    json!({
        "address_id": address_id,
        "first_name": "Ann",
        "surname": "Byrne",
        "email": email,
        "password": "pw",
        "timezone": "Europe/Dublin",
        "start_date": "2024-01-01",
        "expiry_date": "2090-01-01",
        "language_id": 1,
    })
}

/// A Member created by the superuser, optionally promoted, with one Address and one
/// administrator at it.
pub struct Tenant {
    pub member_id: Id,
    pub address_id: Id,
    pub admin: ActorContext,
}

impl World {
    pub fn actor(&self, user_id: Id) -> anyhow::Result<ActorContext> {
        Ok(self.svc.store().read(|t| ActorContext::resolve(t, user_id))?)
    }

    pub fn api_key(&self, member_id: Id) -> String {
        self.svc.store().read(|t| t.members.get(member_id).map(|m| m.api_key.clone()).unwrap_or_default())
    }

    pub async fn tenant(&self, name: &str, self_managed: bool) -> anyhow::Result<Tenant> {
        let member = self.svc.create_member(&self.root, &json!({"name": name, "currency_id": 2}))?;
        if self_managed {
            self.svc.update_member(&self.root, member.id, &json!({"self_managed": true}))?;
        }
        let address = self.svc.create_address(&self.root, &address_body(member.id, &format!("{} HQ", name)))?;
        let email = format!("admin@{}.example.com", name.to_lowercase());
        let admin = self.svc.create_user(&self.root, &user_body(address.address.id, &email)).await?;
        assert!(admin.user.administrator, "first user of a member administers it");
        Ok(Tenant { member_id: member.id, address_id: address.address.id, admin: self.actor(admin.user.id)? })
    }
}
