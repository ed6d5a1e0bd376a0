use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{ListParams, Membership, Page, UserView};
use crate::collaborators::Message;
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::{generate_confirmation_token, EmailConfirmation, Id, Lifecycle, Member, User};
use crate::permissions;
use crate::store::LinkGraph;
use crate::system_paths::user_image_bucket;
use crate::validation::{self, Codes, ImageInput};

/// Addresses on this domain are placeholders and never receive mail.
const NO_MAIL_DOMAIN: &str = "nomail.com";

fn wants_mail(member: &Member, email: &str) -> bool {
    !member.secret && !email.rsplit('@').next().is_some_and(|d| d.eq_ignore_ascii_case(NO_MAIL_DOMAIN))
}

impl Membership {
    /// Store the avatar and return its URL. Upload failures are logged and yield `None`.
    async fn upload_image(&self, user_id: Id, extension: &str, bytes: Vec<u8>) -> Option<String> {
        let objects = &self.collaborators.objects;
        let bucket = user_image_bucket(&self.config.bucket_prefix);
        let name = format!("{}.{}", user_id, extension);
        if let Err(e) = objects.ensure_bucket(&bucket).await {
            warn!(target: "membership::user", "object store: bucket {} unavailable: {}", bucket, e);
            return None;
        }
        match objects.put_object(&bucket, &name, bytes).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(target: "membership::user", "object store: upload of {} failed: {}", name, e);
                None
            }
        }
    }

    /// Best effort: the stored URL is kept when the object cannot be removed.
    async fn remove_image(&self, url: &str) {
        let bucket = user_image_bucket(&self.config.bucket_prefix);
        let Some(name) = url.rsplit('/').next() else { return };
        if let Err(e) = self.collaborators.objects.remove_object(&bucket, name).await {
            warn!(target: "membership::user", "object store: removing {} failed: {}", name, e);
        }
    }

    /// Store a fresh confirmation link for the User's current email and mail it to `to`.
    async fn send_confirmation(&self, user: &User, member: &Member, to: &str, template: &str) {
        let token = generate_confirmation_token();
        self.store.write(|t| {
            t.email_confirmations.insert_with(|id| EmailConfirmation {
                id,
                token: token.clone(),
                user_id: user.id,
                email: user.email.clone(),
                created: Utc::now(),
                lifecycle: Lifecycle::Active,
            })
        });
        let message = Message {
            to: to.to_string(),
            subject: "Membership Email Confirmation".to_string(),
            template: template.to_string(),
            context: json!({
                "user_id": user.id,
                "first_name": user.first_name,
                "surname": user.surname,
                "email": user.email,
                "current_email": to,
                "member": member.name,
                "confirmation_url": format!("{}{}", self.config.email_confirmation_url, token),
            }),
        };
        if let Err(e) = self.collaborators.notifier.send(message).await {
            warn!(target: "membership::user", "notifier: confirmation for user {} not sent: {}", user.id, e);
        }
    }

    pub async fn create_user(&self, actor: &ActorContext, body: &Value) -> AppResult<UserView> {
        let codes = Codes::new("user", "create");
        let today = self.today();
        let (draft, member) = self.store.read(|t| {
            let draft = validation::user::create(body, actor, t, today)?;
            let member = t.members.get(draft.member_id).cloned().ok_or_else(|| codes.invalid(102, "address_id"))?;
            Ok::<_, AppError>((draft, member))
        })?;
        permissions::user::create(actor, &member)?;

        // The directory account is a prerequisite: nothing is written locally without it.
        let directory = &self.collaborators.directory;
        let unavailable = |e: crate::collaborators::CollaboratorError| {
            warn!(target: "membership::user", "directory: {}", e);
            AppError::unavailable(codes.code(1), e.to_string())
        };
        if directory.exists(&draft.email).await.map_err(unavailable)? {
            directory.add_member(&draft.email, member.id).await.map_err(unavailable)?;
        } else {
            directory.create(&draft.email, &draft.password, member.id).await.map_err(unavailable)?;
        }

        let verify = wants_mail(&member, &draft.email);
        let user = self.store.write(|t| {
            // another create may have claimed the email while the directory was busy
            if t.email_taken(member.id, &draft.email, None) {
                return Err(codes.invalid(111, "email"));
            }
            let first_in_member = t.users_in_member(member.id).next().is_none();
            Ok(t.users.insert_with(|id| User {
                id,
                member_id: draft.member_id,
                address_id: draft.address_id,
                first_name: draft.first_name,
                surname: draft.surname,
                email: draft.email,
                administrator: first_in_member,
                global_user: draft.global_user,
                global_active: draft.global_active,
                is_private: draft.is_private,
                robot: false,
                otp: draft.otp,
                first_otp: draft.first_otp,
                timezone: draft.timezone,
                start_date: draft.start_date,
                expiry_date: draft.expiry_date,
                language_id: draft.language_id,
                profile_id: draft.profile_id,
                department_id: draft.department_id,
                job_title: draft.job_title,
                phones: draft.phones,
                image: None,
                signature: draft.signature,
                notifications: draft.notifications.unwrap_or_default(),
                email_confirmed: !verify,
                last_login: None,
                lifecycle: Lifecycle::Active,
            }))
        })?;
        info!(target: "membership::user", "user {} created at address {} by user {}", user.id, user.address_id, actor.user_id);

        let image = match draft.image {
            Some(ImageInput::Upload { extension, bytes }) => self.upload_image(user.id, &extension, bytes).await,
            Some(ImageInput::Url(url)) => Some(url),
            Some(ImageInput::Clear) | None => None,
        };
        if image.is_some() {
            self.store.write(|t| {
                if let Some(u) = t.users.get_mut(user.id) {
                    u.image = image.clone();
                }
            });
        }
        if verify {
            self.send_confirmation(&user, &member, &user.email, "email_confirmation").await;
        }

        Ok(self.store.read(|t| {
            let current = t.users.get(user.id).unwrap_or(&user);
            UserView::build(t, current, actor)
        }))
    }

    pub fn read_user(&self, actor: &ActorContext, id: Id) -> AppResult<UserView> {
        let today = self.today();
        self.store.read(|t| {
            let codes = Codes::new("user", "read");
            let user = t.users.get(id).ok_or_else(|| codes.missing(1))?;
            let member = t.members.get_any(user.member_id).ok_or_else(|| codes.missing(1))?;
            let linked = t.address_link_exists(actor.address_id, user.address_id);
            permissions::user::read(actor, user, member, linked, today)?;
            Ok(UserView::build(t, user, actor))
        })
    }

    pub async fn update_user(&self, actor: &ActorContext, id: Id, body: &Value) -> AppResult<UserView> {
        let codes = Codes::new("user", "update");
        let (current, member, changes) = self.store.read(|t| {
            let current = t.users.get(id).cloned().ok_or_else(|| codes.missing(1))?;
            let member = t.members.get_any(current.member_id).cloned().ok_or_else(|| codes.missing(1))?;
            let address = t.addresses.get_any(current.address_id).ok_or_else(|| codes.missing(1))?;
            let changes = validation::user::update(body, actor, &current, t)?;
            permissions::user::update(actor, &current, &member, address, &changes, t)?;
            Ok::<_, AppError>((current, member, changes))
        })?;

        let directory = &self.collaborators.directory;
        let unavailable = |e: crate::collaborators::CollaboratorError| {
            warn!(target: "membership::user", "directory: {}", e);
            AppError::unavailable(codes.code(3), e.to_string())
        };
        let email_changed = changes.email != current.email;
        let mut password_applied = false;
        if email_changed {
            if directory.exists(&changes.email).await.map_err(unavailable)? {
                directory.add_member(&changes.email, member.id).await.map_err(unavailable)?;
            } else {
                let password = changes.password.as_deref().ok_or_else(|| codes.invalid(2, "password"))?;
                directory.create(&changes.email, password, member.id).await.map_err(unavailable)?;
                password_applied = true;
            }
            let shared = self.store.read(|t| {
                t.users.iter().any(|u| u.id != current.id && u.email.eq_ignore_ascii_case(&current.email))
            });
            let cleanup = match shared {
                true => directory.remove_member(&current.email, member.id).await,
                false => directory.delete(&current.email).await,
            };
            if let Err(e) = cleanup {
                warn!(target: "membership::user", "directory: releasing {} failed: {}", current.email, e);
            }
        }
        let may_set_password = actor.user_id == current.id || actor.is_super();
        if let (Some(password), false, true) = (changes.password.as_deref(), password_applied, may_set_password) {
            if let Err(e) = directory.set_password(&changes.email, password).await {
                warn!(target: "membership::user", "directory: password update for user {} failed: {}", current.id, e);
            }
        }

        let image = match &changes.image {
            None => current.image.clone(),
            Some(ImageInput::Url(url)) => Some(url.clone()),
            Some(ImageInput::Clear) => {
                if let Some(old) = &current.image {
                    self.remove_image(old).await;
                }
                None
            }
            Some(ImageInput::Upload { extension, bytes }) => {
                match self.upload_image(current.id, extension, bytes.clone()).await {
                    Some(url) => Some(url),
                    None => current.image.clone(),
                }
            }
        };

        let verify = (email_changed || changes.send_confirmation) && wants_mail(&member, &changes.email);
        let updated = self.store.write(|t| {
            let user = t.users.get_mut(id).ok_or_else(|| codes.missing(1))?;
            changes.apply_fields(user);
            user.image = image;
            if verify {
                user.email_confirmed = false;
            }
            if changes.login {
                user.last_login = Some(chrono::Utc::now());
            }
            Ok::<_, AppError>(user.clone())
        })?;
        if verify {
            // a User changing their own email confirms from the old address
            let (to, template) = match email_changed && actor.user_id == current.id {
                true => (current.email.as_str(), "update_email_confirmation"),
                false => (updated.email.as_str(), "email_confirmation"),
            };
            self.send_confirmation(&updated, &member, to, template).await;
        }
        Ok(self.store.read(|t| UserView::build(t, &updated, actor)))
    }

    /// Spend a confirmation link. Links older than a day, links for a User that is gone and
    /// links for an email the User no longer has are all refused.
    pub fn confirm_email(&self, token: &str) -> AppResult<()> {
        let codes = Codes::new("email_confirmation", "read");
        let now = Utc::now();
        self.store.write(|t| {
            let link = t
                .email_confirmation(token.trim())
                .filter(|c| c.is_current(now))
                .cloned()
                .ok_or_else(|| codes.invalid(1, "email_token"))?;
            let user = t.users.get_mut(link.user_id).ok_or_else(|| codes.invalid(2, "email_token"))?;
            if user.email != link.email {
                return Err(codes.invalid(3, "email_token"));
            }
            user.email_confirmed = true;
            t.email_confirmations.soft_delete(link.id);
            info!(target: "membership::user", "user {} confirmed {}", link.user_id, link.email);
            Ok(())
        })
    }

    /// Users at Addresses the actor's Address has an edge to, after the partner filter.
    pub fn list_users(&self, actor: &ActorContext, params: ListParams) -> Page<UserView> {
        let today = self.today();
        let views = self.store.read(|t| {
            if actor.is_super() {
                return t.users.iter().map(|u| UserView::build(t, u, actor)).collect();
            }
            let reachable = t.linked_addresses(actor.address_id);
            t.users
                .iter()
                .filter(|u| reachable.binary_search(&u.address_id).is_ok())
                .filter(|u| {
                    t.members
                        .get_any(u.member_id)
                        .is_some_and(|m| permissions::user::listed(actor, u, m, today))
                })
                .map(|u| UserView::build(t, u, actor))
                .collect()
        });
        params.paginate(views)
    }
}
