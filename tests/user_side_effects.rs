mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{address_body, user_body, world, World};
use membership::model::Id;
use serde_json::json;

const AVATARS: &str = "membership-user-images";
// "png!" in base64
const PNG: &str = "cG5nIQ==";

#[tokio::test]
async fn directory_outage_blocks_user_creation() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Outage", true).await?;
    let before = w.svc.store().read(|t| t.users.iter().count());

    w.directory.set_available(false);
    let err = w.svc.create_user(&x.admin, &user_body(x.address_id, "down@outage.example.com")).await.unwrap_err();
    assert_eq!(err.code_str(), "membership_user_create_001");
    assert_eq!(err.http_status(), 503);
    assert_eq!(w.svc.store().read(|t| t.users.iter().count()), before);

    w.directory.set_available(true);
    w.svc.create_user(&x.admin, &user_body(x.address_id, "down@outage.example.com")).await?;
    Ok(())
}

#[tokio::test]
async fn avatar_upload_is_best_effort() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Avatars", true).await?;

    let mut body = user_body(x.address_id, "pic@avatars.example.com");
    body["image"] = json!({"name": "me.png", "data": PNG});
    let user = w.svc.create_user(&x.admin, &body).await?;
    let url = user.user.image.clone().expect("uploaded avatar url");
    assert!(url.ends_with(&format!("{}/{}.png", AVATARS, user.user.id)), "{}", url);
    assert_eq!(w.objects.object_count(AVATARS), 1);

    w.objects.set_available(false);
    let mut body = user_body(x.address_id, "nopic@avatars.example.com");
    body["image"] = json!({"name": "me.png", "data": PNG});
    let user = w.svc.create_user(&x.admin, &body).await?;
    assert_eq!(user.user.image, None);

    w.objects.set_available(true);
    let cleared = w.svc.update_user(&x.admin, user.user.id, &json!({"image": null})).await?;
    assert_eq!(cleared.user.image, None);
    let err = w.svc.update_user(&x.admin, user.user.id, &json!({"image": {"name": "noext"}})).await.unwrap_err();
    assert_eq!(err.code_str(), "membership_user_update_134");
    Ok(())
}

#[tokio::test]
async fn confirmation_mail_skips_placeholder_and_secret() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Mailer", true).await?;
    let sent = || w.notifier.sent().len();

    let before = sent();
    w.svc.create_user(&x.admin, &user_body(x.address_id, "real@mailer.example.com")).await?;
    assert_eq!(sent(), before + 1);
    assert_eq!(w.notifier.sent()[before].template, "email_confirmation");

    w.svc.create_user(&x.admin, &user_body(x.address_id, "ghost@nomail.com")).await?;
    assert_eq!(sent(), before + 1);

    let hidden = w.svc.create_member(&w.root, &json!({"name": "Hidden", "currency_id": 1, "secret": true}))?;
    let address = w.svc.create_address(&w.root, &address_body(hidden.id, "Vault"))?;
    w.svc.create_user(&w.root, &user_body(address.address.id, "agent@hidden.example.com")).await?;
    assert_eq!(sent(), before + 1);
    Ok(())
}

#[tokio::test]
async fn admin_email_change_moves_the_directory_account() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Movers", true).await?;
    let user = w.svc.create_user(&x.admin, &user_body(x.address_id, "old@movers.example.com")).await?;

    let err = w
        .svc
        .update_user(&x.admin, user.user.id, &json!({"email": "new@movers.example.com"}))
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "membership_user_update_002");
    assert_eq!(err.field(), Some("password"));

    let before = w.notifier.sent().len();
    let moved = w
        .svc
        .update_user(&x.admin, user.user.id, &json!({"email": "New@Movers.example.com", "password": "fresh"}))
        .await?;
    assert_eq!(moved.user.email, "new@movers.example.com");
    assert!(!moved.user.email_confirmed);
    assert!(w.directory.members_of("old@movers.example.com").is_none());
    assert!(w.directory.members_of("new@movers.example.com").is_some_and(|m| m.contains(&x.member_id)));
    // an administrator moving someone else's email confirms at the new address
    let mail = &w.notifier.sent()[before];
    assert_eq!((mail.template.as_str(), mail.to.as_str()), ("email_confirmation", "new@movers.example.com"));

    let login = json!({"email": "new@movers.example.com", "password": "fresh", "api_key": w.api_key(x.member_id)});
    assert!(w.svc.login(&login).await.is_ok());
    Ok(())
}

fn latest_token(w: &World, user_id: Id) -> String {
    w.svc.store().read(|t| {
        t.email_confirmations.iter().filter(|c| c.user_id == user_id).last().map(|c| c.token.clone()).unwrap_or_default()
    })
}

fn confirmed(w: &World, user_id: Id) -> bool {
    w.svc.store().read(|t| t.users.get(user_id).is_some_and(|u| u.email_confirmed))
}

#[tokio::test]
async fn confirmation_link_confirms_once() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Confirm", true).await?;
    let before = w.notifier.sent().len();
    let user = w.svc.create_user(&x.admin, &user_body(x.address_id, "fresh@confirm.example.com")).await?;
    assert!(!user.user.email_confirmed);

    let token = latest_token(&w, user.user.id);
    assert_eq!(token.len(), 32);
    let url = w.notifier.sent()[before].context["confirmation_url"].as_str().unwrap_or_default().to_string();
    assert!(url.ends_with(&token), "{}", url);

    w.svc.confirm_email(&token)?;
    assert!(confirmed(&w, user.user.id));
    let again = w.svc.confirm_email(&token).unwrap_err();
    assert_eq!((again.code_str(), again.http_status()), ("membership_email_confirmation_read_001", 400));
    assert_eq!(w.svc.confirm_email("nope").unwrap_err().code_str(), "membership_email_confirmation_read_001");
    Ok(())
}

#[tokio::test]
async fn unmailed_users_start_confirmed() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Quiet", true).await?;
    let ghost = w.svc.create_user(&x.admin, &user_body(x.address_id, "ghost@nomail.com")).await?;
    assert!(ghost.user.email_confirmed);
    assert_eq!(latest_token(&w, ghost.user.id), "");

    let hidden = w.svc.create_member(&w.root, &json!({"name": "Shade", "currency_id": 1, "secret": true}))?;
    let address = w.svc.create_address(&w.root, &address_body(hidden.id, "Cellar"))?;
    let agent = w.svc.create_user(&w.root, &user_body(address.address.id, "agent@shade.example.com")).await?;
    assert!(agent.user.email_confirmed);
    Ok(())
}

#[tokio::test]
async fn stale_or_superseded_links_are_refused() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Stale", true).await?;
    let user = w.svc.create_user(&x.admin, &user_body(x.address_id, "late@stale.example.com")).await?;
    let old = latest_token(&w, user.user.id);
    w.svc.store().write(|t| {
        for c in t.email_confirmations.iter().map(|c| c.id).collect::<Vec<_>>() {
            if let Some(c) = t.email_confirmations.get_mut(c) {
                c.created = Utc::now() - Duration::hours(25);
            }
        }
    });
    assert_eq!(w.svc.confirm_email(&old).unwrap_err().code_str(), "membership_email_confirmation_read_001");

    // resend, then move the email before the link is used
    let before = w.notifier.sent().len();
    let resent = w.svc.update_user(&x.admin, user.user.id, &json!({"send_email_confirmation": true})).await?;
    assert!(!resent.user.email_confirmed);
    assert_eq!(w.notifier.sent().len(), before + 1);
    let pending = latest_token(&w, user.user.id);
    w.svc
        .update_user(&x.admin, user.user.id, &json!({"email": "moved@stale.example.com", "password": "pw2"}))
        .await?;
    let err = w.svc.confirm_email(&pending).unwrap_err();
    assert_eq!(err.code_str(), "membership_email_confirmation_read_003");

    w.svc.confirm_email(&latest_token(&w, user.user.id))?;
    assert!(confirmed(&w, user.user.id));

    let gone = w.svc.create_user(&x.admin, &user_body(x.address_id, "gone@stale.example.com")).await?;
    let token = latest_token(&w, gone.user.id);
    w.svc.store().write(|t| t.users.soft_delete(gone.user.id));
    assert_eq!(w.svc.confirm_email(&token).unwrap_err().code_str(), "membership_email_confirmation_read_002");
    Ok(())
}

#[tokio::test]
async fn own_email_change_confirms_from_the_old_address() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Selfie", true).await?;
    let before = w.notifier.sent().len();
    w.svc
        .update_user(&x.admin, x.admin.user_id, &json!({"email": "boss@selfie.example.com", "password": "pw"}))
        .await?;
    let mail = &w.notifier.sent()[before];
    assert_eq!((mail.template.as_str(), mail.to.as_str()), ("update_email_confirmation", "admin@selfie.example.com"));
    assert_eq!(mail.context["email"], json!("boss@selfie.example.com"));
    Ok(())
}

#[tokio::test]
async fn racing_creates_keep_email_unique_per_member() -> Result<()> {
    let w = world().await?;
    let x = w.tenant("Racers", true).await?;
    let y = w.tenant("Others", true).await?;
    // the directory already knows the email, so both creates only add a member marker
    w.svc.create_user(&y.admin, &user_body(y.address_id, "dup@racers.example.com")).await?;

    let body = user_body(x.address_id, "dup@racers.example.com");
    let (a, b) = futures::future::join(w.svc.create_user(&x.admin, &body), w.svc.create_user(&x.admin, &body)).await;
    let outcomes = [a.map(|_| ()), b.map(|_| ())];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes.iter().find_map(|r| r.as_ref().err()).map(|e| e.code_str().to_string());
    assert_eq!(err.as_deref(), Some("membership_user_create_111"));
    let copies = w.svc.store().read(|t| {
        t.users_in_member(x.member_id).filter(|u| u.email == "dup@racers.example.com").count()
    });
    assert_eq!(copies, 1);
    Ok(())
}
