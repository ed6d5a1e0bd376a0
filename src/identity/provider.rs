//! Credential check, second factor and token issuance.
//!
//! ```text
//! NO_OTP ──────────────────────────────▶ token
//! OTP_PENDING_FIRST ── first_otp ok ──▶ token, state becomes OTP_ESTABLISHED
//! OTP_ESTABLISHED ──── otp verified ──▶ token
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::collaborators::{CollaboratorError, DirectoryStore, OtpVerifier};
use crate::error::{AppError, AppResult};
use crate::model::OtpState;
use crate::store::Store;
use crate::tprintln;
use crate::validation::{coerce_str, Codes, Field, Payload};

use super::token::TokenSigner;

const CREATE: Codes = Codes::new("token", "create");
const UPDATE: Codes = Codes::new("token", "update");

/// A second-factor value as it arrived on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Missing,
    Null,
    Code(String),
}

impl Submitted {
    fn from_field(f: Field) -> Self {
        match f {
            Field::Absent => Submitted::Missing,
            Field::Null => Submitted::Null,
            Field::Value(v) => Submitted::Code(coerce_str(v).trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub api_key: Option<String>,
    pub first_otp: Submitted,
    pub otp: Submitted,
}

impl LoginRequest {
    pub fn from_json(body: &Value) -> AppResult<Self> {
        let p = Payload::new(body);
        let text = |key: &str| p.field(key).value().map(coerce_str).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (Some(email), Some(password)) = (text("email"), text("password")) else {
            return Err(AppError::validation(CREATE.code(1), "email".to_string()));
        };
        Ok(Self {
            email: email.to_lowercase(),
            password,
            api_key: text("api_key"),
            first_otp: Submitted::from_field(p.field("first_otp")),
            otp: Submitted::from_field(p.field("otp")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials are valid; no `api_key` was given so no token is issued.
    Verified,
    Token(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginOutcome>;
    fn refresh(&self, token: &str) -> AppResult<String>;
}

pub struct LocalAuthProvider {
    store: Store,
    directory: Arc<dyn DirectoryStore>,
    otp: Arc<dyn OtpVerifier>,
    tokens: TokenSigner,
}

fn bad(n: u16, msg: &str) -> AppError { AppError::auth(CREATE.code(n), msg.to_string()) }

fn outage(code: String, e: CollaboratorError) -> AppError {
    warn!(target: "membership::auth", "{}", e);
    AppError::unavailable(code, e.to_string())
}

impl LocalAuthProvider {
    pub fn new(store: Store, directory: Arc<dyn DirectoryStore>, otp: Arc<dyn OtpVerifier>, tokens: TokenSigner) -> Self {
        Self { store, directory, otp, tokens }
    }

    pub fn tokens(&self) -> &TokenSigner { &self.tokens }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginOutcome> {
        let ok = self
            .directory
            .authenticate(&req.email, &req.password)
            .await
            .map_err(|e| outage(CREATE.code(2), e))?;
        if !ok {
            info!(target: "membership::auth", "rejected credentials for {}", req.email);
            return Err(bad(2, "invalid credentials"));
        }
        let Some(api_key) = req.api_key.as_deref() else {
            return Ok(LoginOutcome::Verified);
        };

        let user = self
            .store
            .read(|t| {
                let member = t.members.iter().find(|m| m.api_key == api_key)?;
                t.find_user_by_email(member.id, &req.email).cloned()
            })
            .ok_or_else(|| bad(3, "no user for this email in the member"))?;

        match user.otp_state() {
            OtpState::Disabled => {}
            OtpState::PendingFirst(_) => match &req.first_otp {
                Submitted::Missing => return Err(AppError::validation(CREATE.code(4), "first_otp".to_string())),
                Submitted::Null => return Err(bad(5, "first_otp required")),
                Submitted::Code(raw) => {
                    let consumed = raw.parse::<u32>().is_ok_and(|code| self.store.consume_first_otp(user.id, code));
                    if !consumed {
                        return Err(bad(5, "first_otp mismatch"));
                    }
                    info!(target: "membership::auth", "user {} completed first OTP login", user.id);
                }
            },
            OtpState::Established => match &req.otp {
                Submitted::Missing => return Err(AppError::validation(CREATE.code(6), "otp".to_string())),
                Submitted::Null => return Err(bad(7, "otp required")),
                Submitted::Code(code) => {
                    let passed = self.otp.verify(&user.email, code).await.map_err(|e| outage(CREATE.code(7), e))?;
                    if !passed {
                        return Err(bad(7, "otp rejected"));
                    }
                }
            },
        }

        let token = self
            .tokens
            .issue(user.id)
            .map_err(|e| AppError::internal("membership_internal_error".to_string(), e.to_string()))?;
        self.store.write(|t| {
            if let Some(u) = t.users.get_mut(user.id) {
                u.last_login = Some(Utc::now());
            }
        });
        tprintln!("auth.login user={} member_key={}", user.id, api_key);
        Ok(LoginOutcome::Token(token))
    }

    fn refresh(&self, token: &str) -> AppResult<String> {
        self.tokens.refresh(token).map_err(|e| AppError::auth(UPDATE.code(1), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryDirectory, StaticOtpVerifier};
    use crate::store::fixtures;
    use chrono::Duration;
    use serde_json::json;

    struct Rig {
        provider: LocalAuthProvider,
        store: Store,
        user: crate::model::Id,
        api_key: String,
        otp: Arc<StaticOtpVerifier>,
    }

    async fn rig() -> Rig {
        let store = Store::in_memory();
        let (user, api_key) = store.write(|t| {
            *t = fixtures::tables();
            let m = fixtures::member(t, true);
            let a = fixtures::address(t, m, false);
            let u = fixtures::user(t, a, false);
            (u, t.members.get(m).map(|m| m.api_key.clone()).unwrap_or_default())
        });
        let email = store.read(|t| t.users.get(user).map(|u| u.email.clone())).unwrap();
        let directory = Arc::new(MemoryDirectory::default());
        directory.create(&email, "pw", 1).await.unwrap();
        let otp = Arc::new(StaticOtpVerifier::default());
        let provider = LocalAuthProvider::new(
            store.clone(),
            directory,
            otp.clone(),
            TokenSigner::new(b"k".to_vec(), Duration::hours(1)),
        );
        Rig { provider, store, user, api_key, otp }
    }

    fn request(r: &Rig, extra: Value) -> LoginRequest {
        let mut body = json!({"email": format!("USER{}@example.com", r.user), "password": "pw", "api_key": r.api_key});
        if let (Some(b), Some(e)) = (body.as_object_mut(), extra.as_object()) {
            b.extend(e.clone());
        }
        LoginRequest::from_json(&body).unwrap()
    }

    #[tokio::test]
    async fn plain_login_issues_token() {
        let r = rig().await;
        let LoginOutcome::Token(t) = r.provider.login(&request(&r, json!({}))).await.unwrap() else {
            panic!("expected a token");
        };
        assert_eq!(r.provider.tokens().verify(&t).unwrap().uid, r.user);
        assert!(r.store.read(|t| t.users.get(r.user).and_then(|u| u.last_login)).is_some());
    }

    #[tokio::test]
    async fn credentials_only_without_api_key() {
        let r = rig().await;
        let mut req = request(&r, json!({}));
        req.api_key = None;
        assert_eq!(r.provider.login(&req).await.unwrap(), LoginOutcome::Verified);
        req.password = "wrong".into();
        assert_eq!(r.provider.login(&req).await.unwrap_err().code_str(), "membership_token_create_002");
        assert_eq!(LoginRequest::from_json(&json!({"email": "a@b.c"})).unwrap_err().code_str(), "membership_token_create_001");
    }

    #[tokio::test]
    async fn first_otp_is_single_use() {
        let r = rig().await;
        r.store.write(|t| {
            if let Some(u) = t.users.get_mut(r.user) {
                u.otp = true;
                u.first_otp = Some(123456);
            }
        });
        let missing = r.provider.login(&request(&r, json!({}))).await.unwrap_err();
        assert_eq!((missing.code_str(), missing.http_status()), ("membership_token_create_004", 400));
        let wrong = r.provider.login(&request(&r, json!({"first_otp": 654321}))).await.unwrap_err();
        assert_eq!(wrong.code_str(), "membership_token_create_005");
        assert!(r.provider.login(&request(&r, json!({"first_otp": 123456}))).await.is_ok());
        // the challenge is gone; the account now needs a recurring code
        let again = r.provider.login(&request(&r, json!({"first_otp": 123456}))).await.unwrap_err();
        assert_eq!(again.code_str(), "membership_token_create_006");
    }

    #[tokio::test]
    async fn established_otp_delegates_to_verifier() {
        let r = rig().await;
        let email = r.store.write(|t| {
            let u = t.users.get_mut(r.user).unwrap();
            u.otp = true;
            u.email.clone()
        });
        r.otp.register(&email, "777000");
        assert_eq!(
            r.provider.login(&request(&r, json!({"otp": null}))).await.unwrap_err().code_str(),
            "membership_token_create_007"
        );
        assert_eq!(
            r.provider.login(&request(&r, json!({"otp": "111111"}))).await.unwrap_err().code_str(),
            "membership_token_create_007"
        );
        assert!(r.provider.login(&request(&r, json!({"otp": "777000"}))).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_member_key() {
        let r = rig().await;
        let mut req = request(&r, json!({}));
        req.api_key = Some("nope".into());
        assert_eq!(r.provider.login(&req).await.unwrap_err().code_str(), "membership_token_create_003");
        assert_eq!(r.provider.refresh("junk").unwrap_err().code_str(), "membership_token_update_001");
    }
}
