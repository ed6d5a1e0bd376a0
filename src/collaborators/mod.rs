//! External systems the directory depends on, behind narrow async traits.
//!
//! Every operation returns `Result<_, CollaboratorError>`. Call sites decide explicitly
//! whether a failure is a prerequisite (propagate as `Unavailable`) or auxiliary
//! (log at warn and continue).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::model::Id;

mod memory;
mod http_otp;

pub use memory::{MemoryDirectory, MemoryObjectStore, RecordingNotifier, StaticOtpVerifier};
pub use http_otp::HttpOtpVerifier;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {detail}")]
    Unavailable { service: &'static str, detail: String },
    #[error("{service} rejected the request: {detail}")]
    Rejected { service: &'static str, detail: String },
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
}

pub type CollabResult<T> = Result<T, CollaboratorError>;

/// External account store keyed by email. Each account carries the set of Members it
/// belongs to.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn exists(&self, email: &str) -> CollabResult<bool>;
    async fn create(&self, email: &str, password: &str, member_id: Id) -> CollabResult<()>;
    async fn add_member(&self, email: &str, member_id: Id) -> CollabResult<()>;
    async fn remove_member(&self, email: &str, member_id: Id) -> CollabResult<()>;
    async fn set_password(&self, email: &str, password: &str) -> CollabResult<()>;
    async fn delete(&self, email: &str) -> CollabResult<()>;
    async fn authenticate(&self, email: &str, password: &str) -> CollabResult<bool>;
}

/// Checks a time-based code against a User's registered authenticator.
#[async_trait]
pub trait OtpVerifier: Send + Sync {
    async fn verify(&self, email: &str, code: &str) -> CollabResult<bool>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn ensure_bucket(&self, bucket: &str) -> CollabResult<()>;
    /// Store the object and return its public URL.
    async fn put_object(&self, bucket: &str, name: &str, data: Vec<u8>) -> CollabResult<String>;
    async fn remove_object(&self, bucket: &str, name: &str) -> CollabResult<()>;
}

/// A templated message ready for rendering and delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub context: serde_json::Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: Message) -> CollabResult<()>;
}

/// Handles to every collaborator, shared by the service layer.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn DirectoryStore>,
    pub otp: Arc<dyn OtpVerifier>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Fully in-process collaborators: used by tests and when no external services are configured.
    pub fn in_memory() -> Self {
        Self {
            directory: Arc::new(MemoryDirectory::default()),
            otp: Arc::new(StaticOtpVerifier::default()),
            objects: Arc::new(MemoryObjectStore::new("memory://objects")),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }
}
