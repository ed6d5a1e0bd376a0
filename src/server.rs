//!
//! membership HTTP server
//! ----------------------
//! Axum router over [`Membership`]. Handlers only extract, delegate and render: the
//! service owns validation, authorization and side effects.
//!
//! Responsibilities:
//! - Bearer token authentication via the [`Actor`] extractor.
//! - Rendering [`AppError`] as `{"error_code", "field"?}` with the matching status.
//! - Startup: open the store, bootstrap the root records, start snapshotting, and persist
//!   once more on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::collaborators::{Collaborators, HttpOtpVerifier, MemoryObjectStore};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{ActorContext, LoginOutcome};
use crate::model::{GroupKind, Id};
use crate::service::{ListParams, Membership};
use crate::store::Store;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "membership::http", "{}", self);
        }
        let mut body = Map::new();
        body.insert("error_code".into(), json!(self.code_str()));
        if let Some(field) = self.field() {
            body.insert("field".into(), json!(field));
        }
        (status, Json(Value::Object(body))).into_response()
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    let raw = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// The authenticated caller.
pub struct Actor(pub ActorContext);

impl FromRequestParts<Membership> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, svc: &Membership) -> Result<Self, Self::Rejection> {
        svc.authenticate(bearer(parts)).map(Actor)
    }
}

/// Raw bearer token, for refresh.
pub struct BearerToken(pub String);

impl FromRequestParts<Membership> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _svc: &Membership) -> Result<Self, Self::Rejection> {
        bearer(parts)
            .map(|t| BearerToken(t.trim().to_string()))
            .ok_or_else(|| AppError::auth("membership_auth_001", "authentication required"))
    }
}

type Reply = AppResult<Response>;

fn ok<T: serde::Serialize>(value: T) -> Reply { Ok(Json(value).into_response()) }

fn created<T: serde::Serialize>(value: T) -> Reply { Ok((StatusCode::CREATED, Json(value)).into_response()) }

async fn login(State(svc): State<Membership>, Json(body): Json<Value>) -> Reply {
    match svc.login(&body).await? {
        LoginOutcome::Token(token) => created(json!({ "token": token })),
        LoginOutcome::Verified => ok(json!({})),
    }
}

async fn refresh(State(svc): State<Membership>, BearerToken(token): BearerToken) -> Reply {
    ok(json!({ "token": svc.refresh_token(&token)? }))
}

/// Reached from the mailed link, so no bearer token.
async fn confirm_email(State(svc): State<Membership>, Path(token): Path<String>) -> Reply {
    svc.confirm_email(&token)?;
    ok(json!({}))
}

// members

async fn list_members(State(svc): State<Membership>, Actor(a): Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_members(&a, p))
}

async fn create_member(State(svc): State<Membership>, Actor(a): Actor, Json(body): Json<Value>) -> Reply {
    created(svc.create_member(&a, &body)?)
}

async fn read_member(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_member(&a, pk)?)
}

async fn update_member(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>, Json(body): Json<Value>) -> Reply {
    ok(svc.update_member(&a, pk, &body)?)
}

async fn read_member_link(State(svc): State<Membership>, Actor(a): Actor, Path((member_id, contra)): Path<(Id, Id)>) -> Reply {
    ok(svc.read_member_link(&a, member_id, contra)?)
}

// addresses

async fn list_addresses(State(svc): State<Membership>, Actor(a): Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_addresses(&a, p))
}

async fn create_address(State(svc): State<Membership>, Actor(a): Actor, Json(body): Json<Value>) -> Reply {
    created(svc.create_address(&a, &body)?)
}

async fn read_address(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_address(&a, pk)?)
}

async fn update_address(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>, Json(body): Json<Value>) -> Reply {
    ok(svc.update_address(&a, pk, &body)?)
}

async fn create_address_link(State(svc): State<Membership>, Actor(a): Actor, Path(address_id): Path<Id>, Json(body): Json<Value>) -> Reply {
    created(svc.create_address_link(&a, address_id, &body)?)
}

async fn read_address_link(State(svc): State<Membership>, Actor(a): Actor, Path(address_id): Path<Id>) -> Reply {
    ok(svc.read_address_link(&a, address_id)?)
}

async fn update_address_link(State(svc): State<Membership>, Actor(a): Actor, Path(address_id): Path<Id>, Json(body): Json<Value>) -> Reply {
    ok(svc.update_address_link(&a, address_id, &body)?)
}

// users

async fn list_users(State(svc): State<Membership>, Actor(a): Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_users(&a, p))
}

async fn create_user(State(svc): State<Membership>, Actor(a): Actor, Json(body): Json<Value>) -> Reply {
    created(svc.create_user(&a, &body).await?)
}

async fn read_user(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_user(&a, pk)?)
}

async fn update_user(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>, Json(body): Json<Value>) -> Reply {
    ok(svc.update_user(&a, pk, &body).await?)
}

// teams

async fn list_teams(State(svc): State<Membership>, Actor(a): Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_teams(&a, p))
}

async fn create_team(State(svc): State<Membership>, Actor(a): Actor, Json(body): Json<Value>) -> Reply {
    created(svc.create_team(&a, &body)?)
}

async fn read_team(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_team(&a, pk)?)
}

async fn update_team(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>, Json(body): Json<Value>) -> Reply {
    ok(svc.update_team(&a, pk, &body)?)
}

async fn delete_team(State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>) -> Reply {
    svc.delete_team(&a, pk)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Department, Profile and Territory share one set of handlers, keyed by `kind`.
fn group_routes(kind: GroupKind) -> Router<Membership> {
    let base = format!("/{}/", kind.as_str());
    let item = format!("/{}/{{pk}}/", kind.as_str());
    Router::new()
        .route(
            &base,
            get(move |State(svc): State<Membership>, Actor(a): Actor, Query(p): Query<ListParams>| async move {
                ok(svc.list_groups(&a, kind, p))
            })
            .post(move |State(svc): State<Membership>, Actor(a): Actor, Json(body): Json<Value>| async move {
                svc.create_group(&a, kind, &body).and_then(created)
            }),
        )
        .route(
            &item,
            get(move |State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>| async move {
                svc.read_group(&a, kind, pk).and_then(ok)
            })
            .put(move |State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>, Json(body): Json<Value>| async move {
                svc.update_group(&a, kind, pk, &body).and_then(ok)
            })
            .patch(move |State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>, Json(body): Json<Value>| async move {
                svc.update_group(&a, kind, pk, &body).and_then(ok)
            })
            .delete(move |State(svc): State<Membership>, Actor(a): Actor, Path(pk): Path<Id>| async move {
                svc.delete_group(&a, kind, pk).map(|()| StatusCode::NO_CONTENT.into_response())
            }),
        )
}

async fn notification_recipients(
    State(svc): State<Membership>,
    Actor(a): Actor,
    Path((address_id, transaction_type_id)): Path<(Id, Id)>,
    Query(p): Query<ListParams>,
) -> Reply {
    ok(svc.notification_recipients(&a, address_id, transaction_type_id, p)?)
}

async fn read_cloud_bill(
    State(svc): State<Membership>,
    Actor(a): Actor,
    Path((address_id, target_address_id)): Path<(Id, Id)>,
) -> Reply {
    ok(json!({ "content": svc.read_cloud_bill(&a, address_id, target_address_id)? }))
}

// reference data: any authenticated caller

async fn list_countries(State(svc): State<Membership>, _a: Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_countries(p))
}

async fn read_country(State(svc): State<Membership>, _a: Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_country(pk)?)
}

async fn list_subdivisions(State(svc): State<Membership>, _a: Actor, Path(country_id): Path<Id>, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_subdivisions(country_id, p)?)
}

async fn read_subdivision(State(svc): State<Membership>, _a: Actor, Path((country_id, pk)): Path<(Id, Id)>) -> Reply {
    ok(svc.read_subdivision(country_id, pk)?)
}

async fn list_currencies(State(svc): State<Membership>, _a: Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_currencies(p))
}

async fn read_currency(State(svc): State<Membership>, _a: Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_currency(pk)?)
}

async fn list_languages(State(svc): State<Membership>, _a: Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_languages(p))
}

async fn read_language(State(svc): State<Membership>, _a: Actor, Path(pk): Path<Id>) -> Reply {
    ok(svc.read_language(pk)?)
}

async fn list_transaction_types(State(svc): State<Membership>, _a: Actor, Query(p): Query<ListParams>) -> Reply {
    ok(svc.list_transaction_types(p))
}

/// Every route, bound to `svc`.
pub fn router(svc: Membership) -> Router {
    let mut app = Router::new()
        .route("/", get(|| async { "membership ok" }))
        .route("/auth/login/", axum::routing::post(login).put(refresh))
        .route("/email_confirmation/{token}/", get(confirm_email))
        .route("/member/", get(list_members).post(create_member))
        .route("/member/{pk}/", get(read_member).put(update_member).patch(update_member))
        .route("/member/{member_id}/link/{contra_member_id}/", get(read_member_link))
        .route("/address/", get(list_addresses).post(create_address))
        .route("/address/{pk}/", get(read_address).put(update_address).patch(update_address))
        .route(
            "/address_link/{address_id}/",
            get(read_address_link).post(create_address_link).put(update_address_link).patch(update_address_link),
        )
        .route("/user/", get(list_users).post(create_user))
        .route("/user/{pk}/", get(read_user).put(update_user).patch(update_user))
        .route("/team/", get(list_teams).post(create_team))
        .route("/team/{pk}/", get(read_team).put(update_team).patch(update_team).delete(delete_team))
        .route("/notification/{address_id}/{transaction_type_id}/", get(notification_recipients))
        .route("/cloud_bill/{address_id}/{target_address_id}/", get(read_cloud_bill))
        .route("/country/", get(list_countries))
        .route("/country/{pk}/", get(read_country))
        .route("/country/{country_id}/subdivision/", get(list_subdivisions))
        .route("/country/{country_id}/subdivision/{pk}/", get(read_subdivision))
        .route("/currency/", get(list_currencies))
        .route("/currency/{pk}/", get(read_currency))
        .route("/language/", get(list_languages))
        .route("/language/{pk}/", get(read_language))
        .route("/transaction_type/", get(list_transaction_types));
    for kind in [GroupKind::Department, GroupKind::Profile, GroupKind::Territory] {
        app = app.merge(group_routes(kind));
    }
    app.with_state(svc)
}

/// Collaborators for a running server: in-process ones, with the OTP service swapped in
/// when a URL is configured.
pub fn collaborators_for(config: &Config) -> anyhow::Result<Collaborators> {
    let mut c = Collaborators::in_memory();
    c.objects = Arc::new(MemoryObjectStore::new(config.object_url.clone()));
    if let Some(url) = &config.otp_url {
        c.otp = Arc::new(HttpOtpVerifier::new(url.clone())?);
        info!(target: "membership::startup", "OTP verification via {}", url);
    }
    Ok(c)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "membership::startup", "failed to listen for shutdown: {}", e);
    }
    info!(target: "membership::startup", "shutdown requested");
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        target: "membership::startup",
        "membership starting: http_port={}, db_root={:?}, snapshot_secs={}",
        config.http_port, config.db_root, config.snapshot_secs
    );
    let store = Store::open(&config.db_root)
        .with_context(|| format!("While opening store under {:?}", config.db_root))?;
    let collaborators = collaborators_for(&config)?;
    if crate::bootstrap::ensure_root(&store, &collaborators, &config).await? {
        info!(target: "membership::startup", "root member and superuser created");
        store.persist()?;
    }
    let persistence = store.spawn_persistence(Duration::from_secs(config.snapshot_secs.max(1)));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = router(Membership::new(store.clone(), collaborators, config));
    info!(target: "membership::startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(task) = persistence {
        task.abort();
    }
    store.persist().context("final snapshot")?;
    Ok(())
}
