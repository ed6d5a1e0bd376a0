mod common;

use anyhow::Result;
use common::{world, World};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn serve(w: &World) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = membership::server::router(w.svc.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("test server error: {e:?}");
        }
    });
    Ok(format!("http://{}", addr))
}

async fn root_token(client: &reqwest::Client, base: &str, w: &World) -> Result<String> {
    let cfg = w.svc.config();
    let resp = client
        .post(format!("{base}/auth/login/"))
        .json(&json!({"email": cfg.root_email, "password": cfg.root_password, "api_key": w.api_key(w.root.member_id)}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn login_without_api_key_only_verifies() -> Result<()> {
    let w = world().await?;
    let base = serve(&w).await?;
    let client = reqwest::Client::new();
    let cfg = w.svc.config();

    let resp = client
        .post(format!("{base}/auth/login/"))
        .json(&json!({"email": cfg.root_email, "password": cfg.root_password}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?, json!({}));

    let resp = client
        .post(format!("{base}/auth/login/"))
        .json(&json!({"email": cfg.root_email, "password": "wrong"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json::<Value>().await?, json!({"error_code": "membership_token_create_002"}));

    let resp = client.post(format!("{base}/auth/login/")).json(&json!({"password": "x"})).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>().await?, json!({"error_code": "membership_token_create_001", "field": "email"}));
    Ok(())
}

#[tokio::test]
async fn bearer_token_gates_every_route() -> Result<()> {
    let w = world().await?;
    let base = serve(&w).await?;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/member/")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json::<Value>().await?["error_code"], "membership_auth_001");
    let resp = client.get(format!("{base}/country/")).bearer_auth("not-a-token").send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = root_token(&client, &base, &w).await?;
    let resp = client.get(format!("{base}/member/?limit=1")).bearer_auth(&token).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = resp.json().await?;
    assert_eq!(page["_metadata"]["limit"], 1);
    assert_eq!(page["content"].as_array().map(Vec::len), Some(1));

    let resp = client.put(format!("{base}/auth/login/")).bearer_auth(&token).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let refreshed: Value = resp.json().await?;
    assert!(refreshed["token"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn errors_render_code_and_field() -> Result<()> {
    let w = world().await?;
    let base = serve(&w).await?;
    let client = reqwest::Client::new();
    let token = root_token(&client, &base, &w).await?;

    let resp = client.post(format!("{base}/member/")).bearer_auth(&token).json(&json!({})).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>().await?, json!({"error_code": "membership_member_create_101", "field": "name"}));

    let resp = client.get(format!("{base}/member/999/")).bearer_auth(&token).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>().await?["error_code"], "membership_member_read_001");

    let resp = client
        .post(format!("{base}/member/"))
        .bearer_auth(&token)
        .json(&json!({"name": "Partner", "currency_id": 1}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let member: Value = resp.json().await?;
    let id = member["id"].as_u64().unwrap_or_default();

    let resp = client
        .patch(format!("{base}/member/{id}/"))
        .bearer_auth(&token)
        .json(&json!({"name": "Partner Ltd"}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let patched: Value = resp.json().await?;
    assert_eq!(patched["name"], "Partner Ltd");
    assert_eq!(patched["currency_id"], 1);
    Ok(())
}

#[tokio::test]
async fn group_routes_cover_each_kind() -> Result<()> {
    let w = world().await?;
    let base = serve(&w).await?;
    let client = reqwest::Client::new();
    let token = root_token(&client, &base, &w).await?;

    for kind in ["department", "profile", "territory", "team"] {
        let resp = client
            .post(format!("{base}/{kind}/"))
            .bearer_auth(&token)
            .json(&json!({"name": "North"}))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED, "{kind}");
        let id = resp.json::<Value>().await?["id"].as_u64().unwrap_or_default();

        let resp = client.get(format!("{base}/{kind}/")).bearer_auth(&token).send().await?;
        assert_eq!(resp.json::<Value>().await?["_metadata"]["total_records"], 1, "{kind}");

        let resp = client.delete(format!("{base}/{kind}/{id}/")).bearer_auth(&token).send().await?;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT, "{kind}");
        let resp = client.get(format!("{base}/{kind}/{id}/")).bearer_auth(&token).send().await?;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{kind}");
        assert_eq!(resp.json::<Value>().await?["error_code"], format!("membership_{kind}_read_001"));
    }
    Ok(())
}

#[tokio::test]
async fn email_confirmation_link_needs_no_token() -> Result<()> {
    let w = world().await?;
    let base = serve(&w).await?;
    let client = reqwest::Client::new();
    let x = w.tenant("Linkers", true).await?;
    let user = w.svc.create_user(&x.admin, &common::user_body(x.address_id, "click@linkers.example.com")).await?;
    let token = w.svc.store().read(|t| {
        t.email_confirmations.iter().find(|c| c.user_id == user.user.id).map(|c| c.token.clone()).unwrap_or_default()
    });

    let resp = client.get(format!("{base}/email_confirmation/{token}/")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(w.svc.store().read(|t| t.users.get(user.user.id).is_some_and(|u| u.email_confirmed)));

    let resp = client.get(format!("{base}/email_confirmation/{token}/")).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.json::<Value>().await?,
        json!({"error_code": "membership_email_confirmation_read_001", "field": "email_token"})
    );
    Ok(())
}

#[tokio::test]
async fn cloud_bill_reads_the_compute_edge() -> Result<()> {
    let w = world().await?;
    let base = serve(&w).await?;
    let client = reqwest::Client::new();
    let token = root_token(&client, &base, &w).await?;
    let cloud = w.tenant("Region", true).await?;
    let customer = w.tenant("Renter", false).await?;
    w.svc.update_address(&w.root, cloud.address_id, &json!({"cloud_region": true}))?;
    let cloud_admin = w.actor(cloud.admin.user_id)?;
    w.svc.create_address_link(&cloud_admin, customer.address_id, &json!({"compute": true, "extra_reference1": "T1"}))?;

    let resp = client
        .get(format!("{base}/cloud_bill/{}/{}/", cloud.address_id, customer.address_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["content"]["cloud_customer"], json!(true));
    assert_eq!(body["content"]["is_region"], json!(true));
    assert_eq!(body["content"]["reseller_id"], json!(cloud.address_id));

    // the reverse direction holds no compute edge
    let resp = client
        .get(format!("{base}/cloud_bill/{}/{}/", customer.address_id, cloud.address_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>().await?, json!({"error_code": "membership_cloud_bill_read_002"}));
    Ok(())
}
