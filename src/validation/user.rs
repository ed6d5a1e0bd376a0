//! User create/update pipelines and the whole-object OTP invariant.

use chrono::NaiveDate;
use rand::Rng;
use serde_json::Value;

use super::{
    flag, image, is_email, notifications, or_current, phones, reference, text, timezone, Codes, Field, ImageError,
    ImageInput, NotificationError, Payload, PhoneError, RefError, TextError,
};
use crate::error::{AppError, AppResult};
use crate::identity::ActorContext;
use crate::model::{Address, GroupKind, Id, Notification, Phone, User, SUPERUSER_ID};
use crate::store::{LinkGraph, Tables};

pub const NAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 255;
pub const JOB_TITLE_MAX: usize = 100;

const CREATE: Codes = Codes::new("user", "create");
const UPDATE: Codes = Codes::new("user", "update");

/// Pending first-login challenges are six digits.
pub fn random_first_otp() -> u32 { rand::thread_rng().gen_range(100_000..=999_999) }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub address_id: Id,
    pub member_id: Id,
    /// The actor's Address has an edge to the new User's Address.
    pub address_linked: bool,
    pub first_name: String,
    pub surname: String,
    pub email: String,
    pub password: String,
    pub global_user: bool,
    pub global_active: bool,
    pub is_private: bool,
    pub timezone: String,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub language_id: Id,
    pub profile_id: Option<Id>,
    pub department_id: Option<Id>,
    pub job_title: String,
    pub notifications: Option<Vec<Notification>>,
    pub phones: Vec<Phone>,
    pub image: Option<ImageInput>,
    pub signature: String,
    pub otp: bool,
    pub first_otp: Option<u32>,
}

/// Full cleaned value set for an update. Fields a non-privileged actor may not touch
/// already carry the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChanges {
    pub address_id: Id,
    pub first_name: String,
    pub surname: String,
    pub email: String,
    pub password: Option<String>,
    pub global_user: bool,
    pub global_active: bool,
    pub is_private: bool,
    pub timezone: String,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub language_id: Id,
    pub profile_id: Option<Id>,
    pub department_id: Option<Id>,
    pub job_title: String,
    pub notifications: Option<Vec<Notification>>,
    pub phones: Vec<Phone>,
    pub image: Option<ImageInput>,
    pub signature: String,
    pub login: bool,
    /// Ask for a fresh confirmation mail even when the email is unchanged.
    pub send_confirmation: bool,
    pub otp: bool,
    pub first_otp: Option<u32>,
    pub administrator: bool,
    pub robot: bool,
}

impl UserChanges {
    /// Copy the locally stored fields onto `user`. Image, password and login time are
    /// side effects handled by the caller.
    pub fn apply_fields(&self, user: &mut User) {
        user.address_id = self.address_id;
        user.first_name = self.first_name.clone();
        user.surname = self.surname.clone();
        user.email = self.email.clone();
        user.global_user = self.global_user;
        user.global_active = self.global_active;
        user.is_private = self.is_private;
        user.timezone = self.timezone.clone();
        user.start_date = self.start_date;
        user.expiry_date = self.expiry_date;
        user.language_id = self.language_id;
        user.profile_id = self.profile_id;
        user.department_id = self.department_id;
        user.job_title = self.job_title.clone();
        if let Some(n) = &self.notifications {
            user.notifications = n.clone();
        }
        user.phones = self.phones.clone();
        user.signature = self.signature.clone();
        user.otp = self.otp;
        user.first_otp = self.first_otp;
        user.administrator = self.administrator;
        user.robot = self.robot;
    }
}

/// OTP may never be on for the superuser or a robot. Checked once every field rule has
/// passed because it depends on the combination of `otp` and `robot`.
pub fn check_otp_invariant(user_id: Id, otp: bool, robot: bool, codes: Codes, n: u16) -> AppResult<()> {
    if otp && (user_id == SUPERUSER_ID || robot) {
        return Err(codes.invalid(n, "otp"));
    }
    Ok(())
}

/// Resolve the target Address and the actor's edge to it. Without an edge only the
/// superuser, or a global User of the same Member, may proceed.
fn target_address<'t>(f: Field, actor: &ActorContext, tables: &'t Tables, codes: Codes) -> AppResult<(&'t Address, bool)> {
    let address = reference(f, |id| tables.addresses.get(id)).map_err(|e| match e {
        RefError::Type => codes.invalid(101, "address_id"),
        RefError::Missing => codes.invalid(102, "address_id"),
    })?;
    let linked = tables.address_link_exists(actor.address_id, address.id);
    if !linked && !actor.is_super() && (!actor.same_member(address.member_id) || !actor.is_global()) {
        return Err(codes.invalid(103, "address_id"));
    }
    Ok((address, linked))
}

fn name_rule(f: Field, codes: Codes, empty: u16, field: &str) -> AppResult<String> {
    text(f, NAME_MAX, true).map_err(|e| match e {
        TextError::Empty => codes.invalid(empty, field),
        TextError::TooLong => codes.invalid(empty + 1, field),
    })
}

fn email_rule(f: Field, codes: Codes, first: u16, taken: impl FnOnce(&str) -> bool) -> AppResult<String> {
    let email = text(f, EMAIL_MAX, true).map_err(|e| match e {
        TextError::Empty => codes.invalid(first, "email"),
        TextError::TooLong => codes.invalid(first + 1, "email"),
    })?;
    if !is_email(&email) {
        return Err(codes.invalid(first + 2, "email"));
    }
    if taken(&email) {
        return Err(codes.invalid(first + 3, "email"));
    }
    Ok(email.to_lowercase())
}

fn bool_rule(f: Field, codes: Codes, n: u16, field: &str) -> AppResult<Option<bool>> {
    flag(f).map_err(|_| codes.invalid(n, field))
}

fn timezone_rule(f: Field, codes: Codes) -> AppResult<String> {
    timezone(f).ok_or_else(|| codes.invalid(116, "timezone"))
}

fn group_rule(f: Field, kind: GroupKind, member_id: Id, tables: &Tables, codes: Codes, n: u16, field: &str) -> AppResult<Option<Id>> {
    match f {
        Field::Absent | Field::Null => Ok(None),
        f => reference(f, |id| tables.group(kind, member_id, id).map(|g| g.id)).map(Some).map_err(|e| match e {
            RefError::Type => codes.invalid(n, field),
            RefError::Missing => codes.invalid(n + 1, field),
        }),
    }
}

fn language_rule(f: Field, tables: &Tables, codes: Codes) -> AppResult<Id> {
    reference(f, |id| tables.languages.get(id).map(|l| l.id)).map_err(|e| match e {
        RefError::Type => codes.invalid(121, "language_id"),
        RefError::Missing => codes.invalid(122, "language_id"),
    })
}

fn job_title_rule(f: Field, codes: Codes) -> AppResult<String> {
    text(f, JOB_TITLE_MAX, false).map_err(|_| codes.invalid(127, "job_title"))
}

fn notifications_rule(f: Field, tables: &Tables, codes: Codes) -> AppResult<Option<Vec<Notification>>> {
    notifications(f, |id| tables.transaction_types.get(id).is_some()).map_err(|e| match e {
        NotificationError::Malformed => codes.invalid(128, "notifications"),
        NotificationError::Unknown => codes.invalid(129, "notifications"),
    })
}

fn phones_rule(f: Field, codes: Codes) -> AppResult<Vec<Phone>> {
    phones(f).map_err(|e| match e {
        PhoneError::NotList => codes.invalid(130, "phones"),
        PhoneError::NotObject => codes.invalid(131, "phones"),
        PhoneError::Incomplete => codes.invalid(132, "phones"),
        PhoneError::Pattern => codes.invalid(133, "phones"),
    })
}

fn image_rule(f: Field, codes: Codes) -> AppResult<Option<ImageInput>> {
    image(f).map_err(|e| match e {
        ImageError::Incomplete => codes.invalid(134, "image"),
        ImageError::Encoding => codes.invalid(135, "image"),
        ImageError::Empty => codes.invalid(136, "image"),
        ImageError::Type => codes.invalid(137, "image"),
    })
}

fn signature_rule(f: Field) -> String {
    f.value().map(super::coerce_str).unwrap_or_default().trim().to_string()
}

pub fn create(body: &Value, actor: &ActorContext, tables: &Tables, today: NaiveDate) -> AppResult<UserDraft> {
    let p = Payload::new(body);
    let c = CREATE;

    let (address, address_linked) = target_address(p.field("address_id"), actor, tables, c)?;
    let member_id = address.member_id;
    let first_name = name_rule(p.field("first_name"), c, 104, "first_name")?;
    let surname = name_rule(p.field("surname"), c, 106, "surname")?;
    let email = email_rule(p.field("email"), c, 108, |e| tables.email_taken(member_id, e, None))?;
    let password = text(p.field("password"), usize::MAX, true).map_err(|_| c.invalid(112, "password"))?;
    let global_user = bool_rule(p.field("global_user"), c, 113, "global_user")?.unwrap_or(false);
    let global_active = bool_rule(p.field("global_active"), c, 114, "global_active")?.unwrap_or(false) && global_user;
    let is_private = bool_rule(p.field("is_private"), c, 115, "is_private")?.unwrap_or(false);
    let timezone = timezone_rule(p.field("timezone"), c)?;
    let start_date = super::date(p.field("start_date")).ok_or_else(|| c.invalid(117, "start_date"))?;
    let expiry_date = super::date(p.field("expiry_date")).ok_or_else(|| c.invalid(118, "expiry_date"))?;
    if expiry_date <= start_date {
        return Err(c.invalid(119, "expiry_date"));
    }
    if expiry_date < today {
        return Err(c.invalid(120, "expiry_date"));
    }
    let language_id = language_rule(p.field("language_id"), tables, c)?;
    let profile_id = group_rule(p.field("profile_id"), GroupKind::Profile, member_id, tables, c, 123, "profile_id")?;
    let department_id =
        group_rule(p.field("department_id"), GroupKind::Department, member_id, tables, c, 125, "department_id")?;
    let job_title = job_title_rule(p.field("job_title"), c)?;
    // subscriptions are only taken from administrators or from outside the Member
    let notifications = notifications_rule(p.field("notifications"), tables, c)?
        .filter(|_| actor.administrator || !actor.same_member(member_id));
    let phones = phones_rule(p.field("phones"), c)?;
    let image = image_rule(p.field("image"), c)?;
    let signature = signature_rule(p.field("signature"));
    let otp = bool_rule(p.field("otp"), c, 138, "otp")?.unwrap_or(false);
    let may_issue = actor.administrator || actor.same_member(member_id);
    let first_otp = (otp && may_issue).then(random_first_otp);

    Ok(UserDraft {
        address_id: address.id,
        member_id,
        address_linked,
        first_name,
        surname,
        email,
        password,
        global_user,
        global_active,
        is_private,
        timezone,
        start_date,
        expiry_date,
        language_id,
        profile_id,
        department_id,
        job_title,
        notifications,
        phones,
        image,
        signature,
        otp,
        first_otp,
    })
}

pub fn update(body: &Value, actor: &ActorContext, current: &User, tables: &Tables) -> AppResult<UserChanges> {
    let p = Payload::new(body);
    let c = UPDATE;
    let admin = actor.administrator;
    // admin, or someone inside the subject's own Member
    let privileged = admin || actor.same_member(current.member_id);

    let address: &Address = match p.field("address_id") {
        Field::Absent => tables
            .addresses
            .get_any(current.address_id)
            .ok_or_else(|| AppError::internal("membership_internal_error", "user address is missing"))?,
        f => {
            let (address, _) = target_address(f, actor, tables, c)?;
            if address.member_id != current.member_id {
                return Err(c.invalid(104, "address_id"));
            }
            address
        }
    };
    let first_name = or_current(p.field("first_name"), || current.first_name.clone(), |f| name_rule(f, c, 105, "first_name"))?;
    let surname = or_current(p.field("surname"), || current.surname.clone(), |f| name_rule(f, c, 107, "surname"))?;
    let email = match p.field("email") {
        f if admin && !f.is_absent() => {
            email_rule(f, c, 109, |e| tables.email_taken(address.member_id, e, Some(current.id)))?
        }
        _ => current.email.clone(),
    };
    let password = p.field("password").value().map(super::coerce_str).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let global_user = match admin {
        true => bool_rule(p.field("global_user"), c, 113, "global_user")?.unwrap_or(current.global_user),
        false => current.global_user,
    };
    let global_active = match admin {
        true => bool_rule(p.field("global_active"), c, 114, "global_active")?.unwrap_or(current.global_active),
        false => current.global_active,
    } && global_user;
    let is_private = bool_rule(p.field("is_private"), c, 115, "is_private")?.unwrap_or(current.is_private);
    let timezone = or_current(p.field("timezone"), || current.timezone.clone(), |f| timezone_rule(f, c))?;

    let start_sent = admin && !p.field("start_date").is_absent();
    let start_date = match start_sent {
        true => super::date(p.field("start_date")).ok_or_else(|| c.invalid(117, "start_date"))?,
        false => current.start_date,
    };
    let expiry_date = match p.field("expiry_date") {
        f if admin && !f.is_absent() => {
            let expiry = super::date(f).ok_or_else(|| c.invalid(118, "expiry_date"))?;
            if start_sent && expiry <= start_date {
                return Err(c.invalid(119, "expiry_date"));
            }
            if !start_sent && expiry <= current.start_date {
                return Err(c.invalid(120, "expiry_date"));
            }
            expiry
        }
        _ => {
            if start_sent && current.expiry_date <= start_date {
                return Err(c.invalid(119, "start_date"));
            }
            current.expiry_date
        }
    };
    let language_id = or_current(p.field("language_id"), || current.language_id, |f| language_rule(f, tables, c))?;
    let profile_id = match p.field("profile_id") {
        f if admin && !f.is_absent() => {
            group_rule(f, GroupKind::Profile, current.member_id, tables, c, 123, "profile_id")?
        }
        _ => current.profile_id,
    };
    let department_id = match p.field("department_id") {
        f if admin && !f.is_absent() => {
            group_rule(f, GroupKind::Department, current.member_id, tables, c, 125, "department_id")?
        }
        _ => current.department_id,
    };
    let job_title = match p.field("job_title") {
        f if admin && !f.is_absent() => job_title_rule(f, c)?,
        _ => current.job_title.clone(),
    };
    let notifications = notifications_rule(p.field("notifications"), tables, c)?
        .filter(|_| admin || !actor.same_member(current.member_id));
    let phones = or_current(p.field("phones"), || current.phones.clone(), |f| phones_rule(f, c))?;
    let image = image_rule(p.field("image"), c)?;
    let signature = or_current(p.field("signature"), || current.signature.clone(), |f| Ok::<_, AppError>(signature_rule(f)))?;
    let login = actor.is_super() && matches!(p.field("login"), Field::Value(Value::Bool(true)));
    let send_confirmation = matches!(p.field("send_email_confirmation"), Field::Value(Value::Bool(true)));

    let otp = match privileged {
        true => bool_rule(p.field("otp"), c, 138, "otp")?.unwrap_or(current.otp),
        false => current.otp,
    };
    let first_otp = match (privileged, p.field("first_otp")) {
        (false, _) => current.first_otp,
        (true, Field::Null) => None,
        (true, Field::Absent) if !otp => None,
        (true, Field::Absent) if !current.otp => Some(random_first_otp()),
        (true, Field::Absent) => current.first_otp,
        (true, Field::Value(v)) => {
            let code = v.as_i64().ok_or_else(|| c.invalid(139, "first_otp"))?;
            if !otp {
                return Err(c.invalid(141, "first_otp"));
            }
            if !(100_000..=999_999).contains(&code) {
                return Err(c.invalid(140, "first_otp"));
            }
            Some(code as u32)
        }
    };
    let administrator = bool_rule(p.field("administrator"), c, 142, "administrator")?.unwrap_or(current.administrator);
    let robot = match bool_rule(p.field("robot"), c, 143, "robot")? {
        None => current.robot,
        Some(robot) => {
            if robot && !address.cloud_region {
                return Err(c.invalid(144, "robot"));
            }
            if robot && tables.robot_at_address(address.id, Some(current.id)) {
                return Err(c.invalid(145, "robot"));
            }
            robot
        }
    };
    check_otp_invariant(current.id, otp, robot, c, 146)?;

    Ok(UserChanges {
        address_id: address.id,
        first_name,
        surname,
        email,
        password,
        global_user,
        global_active,
        is_private,
        timezone,
        start_date,
        expiry_date,
        language_id,
        profile_id,
        department_id,
        job_title,
        notifications,
        phones,
        image,
        signature,
        login,
        send_confirmation,
        otp,
        first_otp,
        administrator,
        robot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{self, date};
    use serde_json::json;

    struct World {
        t: Tables,
        admin: ActorContext,
        plain: ActorContext,
        subject: Id,
        address: Id,
    }

    fn world() -> World {
        let mut t = fixtures::tables();
        let m = fixtures::member(&mut t, true);
        let a = fixtures::address(&mut t, m, false);
        let admin = fixtures::user(&mut t, a, true);
        let plain = fixtures::user(&mut t, a, false);
        let subject = fixtures::user(&mut t, a, false);
        let (admin, plain) = (fixtures::actor(&t, admin), fixtures::actor(&t, plain));
        World { t, admin, plain, subject, address: a }
    }

    fn create_body(address: Id) -> Value {
        json!({
            "address_id": address,
            "first_name": "Ann",
            "surname": "Byrne",
            "email": "Ann.Byrne@Example.com",
            "password": "pw",
            "timezone": "Europe/Dublin",
            "start_date": "2024-01-01",
            "expiry_date": "2030-01-01",
            "language_id": 1,
        })
    }

    fn code<T: std::fmt::Debug>(r: AppResult<T>) -> String {
        match r {
            Err(e) => e.code_str().to_string(),
            Ok(v) => panic!("expected rejection, got {:?}", v),
        }
    }

    #[test]
    fn create_cleans_and_lowercases() {
        let w = world();
        let d = create(&create_body(w.address), &w.admin, &w.t, date(2025, 1, 1)).unwrap();
        assert_eq!(d.email, "ann.byrne@example.com");
        assert!(d.address_linked);
        assert!(!d.global_active);
        assert_eq!(d.first_otp, None);
    }

    #[test]
    fn create_expiry_rules() {
        let w = world();
        let today = date(2025, 6, 1);
        let mut body = create_body(w.address);
        body["expiry_date"] = json!("2023-12-31");
        assert_eq!(code(create(&body, &w.admin, &w.t, today)), "membership_user_create_119");
        body["expiry_date"] = json!("2025-05-31");
        assert_eq!(code(create(&body, &w.admin, &w.t, today)), "membership_user_create_120");
        body["expiry_date"] = json!("2025-06-01");
        assert!(create(&body, &w.admin, &w.t, today).is_ok());
        body["expiry_date"] = json!("June");
        assert_eq!(code(create(&body, &w.admin, &w.t, today)), "membership_user_create_118");
    }

    #[test]
    fn create_email_unique_per_member_case_insensitive() {
        let w = world();
        let mut body = create_body(w.address);
        body["email"] = json!(format!("USER{}@example.com", w.subject));
        assert_eq!(code(create(&body, &w.admin, &w.t, date(2025, 1, 1))), "membership_user_create_111");
        body["email"] = json!("not-an-email");
        assert_eq!(code(create(&body, &w.admin, &w.t, date(2025, 1, 1))), "membership_user_create_110");
    }

    #[test]
    fn create_with_otp_issues_challenge() {
        let w = world();
        let mut body = create_body(w.address);
        body["otp"] = json!(true);
        let d = create(&body, &w.admin, &w.t, date(2025, 1, 1)).unwrap();
        let code = d.first_otp.unwrap();
        assert!((100_000..=999_999).contains(&code));
    }

    #[test]
    fn create_unlinked_address_needs_global_or_super() {
        let mut w = world();
        let other = fixtures::member(&mut w.t, false);
        let far = fixtures::address(&mut w.t, other, false);
        assert_eq!(
            code(create(&create_body(far), &w.admin, &w.t, date(2025, 1, 1))),
            "membership_user_create_103"
        );
        // same-member address without an edge: global users only
        let m = w.admin.member_id;
        let annex = w.t.addresses.insert_with(|id| fixtures::address_row(id, m, false)).id;
        assert_eq!(
            code(create(&create_body(annex), &w.admin, &w.t, date(2025, 1, 1))),
            "membership_user_create_103"
        );
        let mut global = w.admin;
        global.global_user = true;
        global.global_active = true;
        let d = create(&create_body(annex), &global, &w.t, date(2025, 1, 1)).unwrap();
        assert!(!d.address_linked);
    }

    #[test]
    fn non_admin_email_change_is_ignored() {
        let w = world();
        let current = w.t.users.get(w.subject).cloned().unwrap();
        let c = update(&json!({"email": "new@example.com", "job_title": "Boss"}), &w.plain, &current, &w.t).unwrap();
        assert_eq!(c.email, current.email);
        assert_eq!(c.job_title, current.job_title);
        let c = update(&json!({"email": "New@Example.com"}), &w.admin, &current, &w.t).unwrap();
        assert_eq!(c.email, "new@example.com");
    }

    #[test]
    fn subscriptions_need_admin_or_outside_actor() {
        let w = world();
        let current = w.t.users.get(w.subject).cloned().unwrap();
        let body = json!({"notifications": [{"transaction_type_id": 1}]});
        assert_eq!(update(&body, &w.plain, &current, &w.t).unwrap().notifications, None);
        let c = update(&body, &w.admin, &current, &w.t).unwrap();
        assert_eq!(c.notifications, Some(vec![Notification { transaction_type_id: 1, external: true }]));
        // still validated for everyone
        let bad = json!({"notifications": "all"});
        assert_eq!(code(update(&bad, &w.plain, &current, &w.t)), "membership_user_update_128");

        let mut body = create_body(w.address);
        body["notifications"] = json!([{"transaction_type_id": 1, "external": false}]);
        let d = create(&body, &w.admin, &w.t, date(2025, 1, 1)).unwrap();
        assert_eq!(d.notifications, Some(vec![Notification { transaction_type_id: 1, external: false }]));
        let d = create(&body, &w.plain, &w.t, date(2025, 1, 1)).unwrap();
        assert_eq!(d.notifications, None);
    }

    #[test]
    fn update_expiry_checks_stored_start_when_start_not_sent() {
        let w = world();
        let mut current = w.t.users.get(w.subject).cloned().unwrap();
        current.start_date = date(2024, 6, 1);
        assert_eq!(
            code(update(&json!({"expiry_date": "2024-06-01"}), &w.admin, &current, &w.t)),
            "membership_user_update_120"
        );
        assert_eq!(
            code(update(&json!({"start_date": "2024-07-01", "expiry_date": "2024-06-15"}), &w.admin, &current, &w.t)),
            "membership_user_update_119"
        );
        // past expiry is allowed on update
        let c = update(&json!({"expiry_date": "2024-06-02"}), &w.admin, &current, &w.t).unwrap();
        assert_eq!(c.expiry_date, date(2024, 6, 2));
    }

    #[test]
    fn update_start_checks_stored_expiry_when_expiry_not_sent() {
        let w = world();
        let mut current = w.t.users.get(w.subject).cloned().unwrap();
        current.start_date = date(2024, 6, 1);
        current.expiry_date = date(2090, 1, 1);
        let err = update(&json!({"start_date": "2095-06-01"}), &w.admin, &current, &w.t).unwrap_err();
        assert_eq!(err.code_str(), "membership_user_update_119");
        assert_eq!(err.field(), Some("start_date"));
        assert_eq!(code(update(&json!({"start_date": "2090-01-01"}), &w.admin, &current, &w.t)), "membership_user_update_119");
        let c = update(&json!({"start_date": "2089-12-31"}), &w.admin, &current, &w.t).unwrap();
        assert_eq!((c.start_date, c.expiry_date), (date(2089, 12, 31), date(2090, 1, 1)));
    }

    #[test]
    fn global_active_follows_global_user() {
        let w = world();
        let current = w.t.users.get(w.subject).cloned().unwrap();
        let c = update(&json!({"global_active": true}), &w.admin, &current, &w.t).unwrap();
        assert!(!c.global_active);
        let c = update(&json!({"global_user": true, "global_active": true}), &w.admin, &current, &w.t).unwrap();
        assert!(c.global_user && c.global_active);
    }

    #[test]
    fn first_otp_rules() {
        let w = world();
        let current = w.t.users.get(w.subject).cloned().unwrap();
        assert_eq!(code(update(&json!({"first_otp": 123456}), &w.admin, &current, &w.t)), "membership_user_update_141");
        assert_eq!(
            code(update(&json!({"otp": true, "first_otp": 12345}), &w.admin, &current, &w.t)),
            "membership_user_update_140"
        );
        assert_eq!(
            code(update(&json!({"otp": true, "first_otp": "123456"}), &w.admin, &current, &w.t)),
            "membership_user_update_139"
        );
        let c = update(&json!({"otp": true, "first_otp": 654321}), &w.admin, &current, &w.t).unwrap();
        assert_eq!((c.otp, c.first_otp), (true, Some(654321)));
        // enabling without a code issues one
        let c = update(&json!({"otp": true}), &w.admin, &current, &w.t).unwrap();
        assert!(c.first_otp.is_some());
        // disabling clears the challenge
        let mut pending = current.clone();
        pending.otp = true;
        pending.first_otp = Some(111111);
        let c = update(&json!({"otp": false}), &w.admin, &pending, &w.t).unwrap();
        assert_eq!(c.first_otp, None);
    }

    #[test]
    fn otp_and_robot_are_exclusive() {
        let mut t = fixtures::tables();
        let m = fixtures::member(&mut t, true);
        let region = fixtures::address(&mut t, m, true);
        let admin = fixtures::user(&mut t, region, true);
        let bot = fixtures::user(&mut t, region, false);
        let admin = fixtures::actor(&t, admin);
        let current = t.users.get(bot).cloned().unwrap();
        assert_eq!(
            code(update(&json!({"robot": true, "otp": true}), &admin, &current, &t)),
            "membership_user_update_146"
        );
        let c = update(&json!({"robot": true}), &admin, &current, &t).unwrap();
        assert!(c.robot);
        assert_eq!(check_otp_invariant(SUPERUSER_ID, true, false, UPDATE, 146).unwrap_err().code_str(), "membership_user_update_146");
        assert!(check_otp_invariant(SUPERUSER_ID, false, false, UPDATE, 146).is_ok());
    }

    #[test]
    fn robot_needs_cloud_region_and_is_unique() {
        let mut t = fixtures::tables();
        let m = fixtures::member(&mut t, true);
        let plain_address = fixtures::address(&mut t, m, false);
        let region = fixtures::address(&mut t, m, true);
        fixtures::link(&mut t, plain_address, region);
        let admin = fixtures::user(&mut t, plain_address, true);
        let first = fixtures::user(&mut t, region, false);
        let second = fixtures::user(&mut t, region, false);
        let other = fixtures::user(&mut t, plain_address, false);
        let admin = fixtures::actor(&t, admin);

        let cur = t.users.get(other).cloned().unwrap();
        assert_eq!(code(update(&json!({"robot": true}), &admin, &cur, &t)), "membership_user_update_144");
        t.users.get_mut(first).unwrap().robot = true;
        let cur = t.users.get(second).cloned().unwrap();
        assert_eq!(code(update(&json!({"robot": true}), &admin, &cur, &t)), "membership_user_update_145");
        // clearing the flag on a second account is not blocked by the existing robot
        assert!(!update(&json!({"robot": false}), &admin, &cur, &t).unwrap().robot);
    }

    #[test]
    fn address_moves_stay_in_member() {
        let mut w = world();
        let other = fixtures::member(&mut w.t, false);
        let far = fixtures::address(&mut w.t, other, false);
        fixtures::link(&mut w.t, w.address, far);
        let current = w.t.users.get(w.subject).cloned().unwrap();
        assert_eq!(code(update(&json!({"address_id": far}), &w.admin, &current, &w.t)), "membership_user_update_104");
        assert_eq!(code(update(&json!({"address_id": "x"}), &w.admin, &current, &w.t)), "membership_user_update_101");
    }
}
