//! Request-level operations: validate, authorize, then write and fire side effects.
//!
//! Every entity operation follows the same order. The cleaned value set is produced under
//! a read lock, the authorization predicate runs against that snapshot, collaborator calls
//! happen with no lock held, and the final mutation takes the write lock once.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{ActorContext, AuthProvider, LocalAuthProvider, LoginOutcome, LoginRequest, TokenSigner};
use crate::store::Store;

mod views;
mod member;
mod address;
mod address_link;
mod user;
mod groups;
mod reference;
mod notification;
mod cloud_bill;

pub use cloud_bill::CloudBill;
pub use views::{AddressView, MemberView, UserView};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

/// `?page=&limit=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: usize,
    pub limit: usize,
    pub total_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(rename = "_metadata")]
    pub metadata: PageMeta,
}

impl ListParams {
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let page = self.page.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let total_records = items.len();
        let content = items.into_iter().skip(page.saturating_mul(limit)).take(limit).collect();
        Page { content, metadata: PageMeta { page, limit, total_records } }
    }
}

#[derive(Clone)]
pub struct Membership {
    store: Store,
    collaborators: Collaborators,
    auth: Arc<LocalAuthProvider>,
    config: Arc<Config>,
}

impl Membership {
    pub fn new(store: Store, collaborators: Collaborators, config: Config) -> Self {
        let tokens = TokenSigner::new(config.token_secret.clone(), chrono::Duration::hours(config.token_valid_hours));
        let auth = LocalAuthProvider::new(
            store.clone(),
            collaborators.directory.clone(),
            collaborators.otp.clone(),
            tokens,
        );
        Self { store, collaborators, auth: Arc::new(auth), config: Arc::new(config) }
    }

    pub fn store(&self) -> &Store { &self.store }

    pub fn collaborators(&self) -> &Collaborators { &self.collaborators }

    pub fn config(&self) -> &Config { &self.config }

    pub fn today(&self) -> NaiveDate { Utc::now().date_naive() }

    /// Resolve a bearer token to the calling actor.
    pub fn authenticate(&self, token: Option<&str>) -> AppResult<ActorContext> {
        let unauthenticated = || AppError::auth("membership_auth_001", "authentication required");
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(unauthenticated)?;
        let claims = self.auth.tokens().verify(token).map_err(|_| unauthenticated())?;
        self.store.read(|t| ActorContext::resolve(t, claims.uid))
    }

    pub async fn login(&self, body: &Value) -> AppResult<LoginOutcome> {
        let req = LoginRequest::from_json(body)?;
        self.auth.login(&req).await
    }

    pub fn refresh_token(&self, token: &str) -> AppResult<String> { self.auth.refresh(token) }
}
