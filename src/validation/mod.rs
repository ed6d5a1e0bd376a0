//! Field validation pipelines.
//!
//! Every pipeline walks its fields in a fixed order and stops at the first failure,
//! returning a single namespaced code. Values a later field depends on are threaded
//! explicitly as locals rather than through a shared bag, so the ordering is visible
//! in the code.
//!
//! Update pipelines treat an absent key as "keep the current value". An explicit `null`
//! is passed to the field rule, which decides whether it clears or defaults.

use base64::Engine;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::AppError;
use crate::model::{Id, Notification, Phone};

pub mod address;
pub mod address_link;
pub mod member;
pub mod user;
pub mod group;

static PHONE_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\(?\+?[0-9]*\)?)?[0-9_\- ()]*$").ok());

static EMAIL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .ok()
});

/// Code namespace for one operation, e.g. `membership_user_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codes {
    entity: &'static str,
    op: &'static str,
}

impl Codes {
    pub const fn new(entity: &'static str, op: &'static str) -> Self { Self { entity, op } }

    pub fn code(&self, n: u16) -> String { format!("membership_{}_{}_{:03}", self.entity, self.op, n) }

    pub fn invalid(&self, n: u16, field: &str) -> AppError {
        AppError::validation(self.code(n), field.to_string())
    }

    pub fn denied(&self, n: u16) -> AppError { AppError::forbidden(self.code(n)) }

    pub fn missing(&self, n: u16) -> AppError { AppError::not_found(self.code(n)) }
}

/// One key of a request body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Absent,
    Null,
    Value(&'a Value),
}

impl<'a> Field<'a> {
    pub fn is_absent(&self) -> bool { matches!(self, Field::Absent) }

    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness as JSON clients expect it: null, false, 0, "" and empty containers are falsy.
    pub fn is_falsy(&self) -> bool {
        match *self {
            Field::Absent | Field::Null => true,
            Field::Value(v) => match v {
                Value::Null => true,
                Value::Bool(b) => !b,
                Value::Number(n) => n.as_f64() == Some(0.0),
                Value::String(s) => s.is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
            },
        }
    }
}

/// Read-only view over a JSON request body. Non-object bodies behave as empty.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Payload<'a> {
    pub fn new(body: &'a Value) -> Self { Self { map: body.as_object() } }

    pub fn field(&self, key: &str) -> Field<'a> {
        match self.map.and_then(|m| m.get(key)) {
            None => Field::Absent,
            Some(Value::Null) => Field::Null,
            Some(v) => Field::Value(v),
        }
    }

    pub fn has(&self, key: &str) -> bool { !self.field(key).is_absent() }
}

/// Update helper: an absent key keeps `current`, anything else goes through `clean`.
pub fn or_current<'a, T, E>(f: Field<'a>, current: impl FnOnce() -> T, clean: impl FnOnce(Field<'a>) -> Result<T, E>) -> Result<T, E> {
    if f.is_absent() { Ok(current()) } else { clean(f) }
}

/// Render a scalar the way a lenient form parser would: strings verbatim, everything
/// else through its JSON text.
pub fn coerce_str(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextError {
    Empty,
    TooLong,
}

/// Trimmed text with a character limit. Absent and null read as the empty string.
pub fn text(f: Field, max: usize, required: bool) -> Result<String, TextError> {
    let s = f.value().map(coerce_str).unwrap_or_default().trim().to_string();
    if required && s.is_empty() {
        return Err(TextError::Empty);
    }
    if s.chars().count() > max {
        return Err(TextError::TooLong);
    }
    Ok(s)
}

/// Integer view of an id-shaped value. Numeric strings are accepted.
pub fn int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefError {
    Type,
    Missing,
}

/// Resolve a foreign key. Null, absent and non-integer values are `Type`; anything that
/// does not resolve through `lookup` is `Missing`.
pub fn reference<T>(f: Field, lookup: impl FnOnce(Id) -> Option<T>) -> Result<T, RefError> {
    let n = f.value().and_then(int).ok_or(RefError::Type)?;
    if n <= 0 {
        return Err(RefError::Missing);
    }
    lookup(n as Id).ok_or(RefError::Missing)
}

/// Strict boolean. `Ok(None)` when absent or null.
pub fn flag(f: Field) -> Result<Option<bool>, ()> {
    match f {
        Field::Absent | Field::Null => Ok(None),
        Field::Value(Value::Bool(b)) => Ok(Some(*b)),
        Field::Value(_) => Err(()),
    }
}

/// `YYYY-MM-DD`, tolerating a trailing time part.
pub fn date(f: Field) -> Option<NaiveDate> {
    let s = f.value()?.as_str()?;
    let day = s.split('T').next().unwrap_or(s).trim();
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// IANA zone name.
pub fn timezone(f: Field) -> Option<String> {
    let s = f.value()?.as_str()?.trim();
    chrono_tz::Tz::from_str(s).ok().map(|_| s.to_string())
}

pub fn is_email(s: &str) -> bool {
    EMAIL_PATTERN.as_ref().is_some_and(|re| re.is_match(s))
}

pub fn is_phone_number(s: &str) -> bool {
    PHONE_PATTERN.as_ref().is_some_and(|re| re.is_match(s))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneError {
    NotList,
    NotObject,
    Incomplete,
    Pattern,
}

/// Phone list with trimmed, de-duplicated `(name, number)` pairs in first-seen order.
/// Falsy input yields an empty list.
pub fn phones(f: Field) -> Result<Vec<Phone>, PhoneError> {
    if f.is_falsy() {
        return Ok(Vec::new());
    }
    let Some(Value::Array(items)) = f.value() else { return Err(PhoneError::NotList) };
    let mut out: Vec<Phone> = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(entry) = item else { return Err(PhoneError::NotObject) };
        let (Some(Value::String(name)), Some(number)) = (entry.get("name"), entry.get("number")) else {
            return Err(PhoneError::Incomplete);
        };
        let Value::String(number) = number else { return Err(PhoneError::Pattern) };
        if !is_phone_number(number) {
            return Err(PhoneError::Pattern);
        }
        let phone = Phone { name: name.trim().to_string(), number: number.trim().to_string() };
        if !out.contains(&phone) {
            out.push(phone);
        }
    }
    Ok(out)
}

/// Cleaned avatar instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Clear,
    Url(String),
    Upload { extension: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    Incomplete,
    Encoding,
    Empty,
    Type,
}

/// `None` when the key is absent. An upload object needs a `name` with an extension and
/// non-empty base64 `data`.
pub fn image(f: Field) -> Result<Option<ImageInput>, ImageError> {
    match f {
        Field::Absent => Ok(None),
        Field::Null => Ok(Some(ImageInput::Clear)),
        Field::Value(Value::String(url)) => Ok(Some(ImageInput::Url(url.clone()))),
        Field::Value(Value::Object(o)) => {
            let name = o.get("name").and_then(Value::as_str).ok_or(ImageError::Incomplete)?;
            let extension = name.split('.').nth(1).ok_or(ImageError::Incomplete)?.to_string();
            let data = o.get("data").ok_or(ImageError::Incomplete)?;
            let data = data.as_str().ok_or(ImageError::Encoding)?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map_err(|_| ImageError::Encoding)?;
            if bytes.is_empty() {
                return Err(ImageError::Empty);
            }
            Ok(Some(ImageInput::Upload { extension, bytes }))
        }
        Field::Value(_) => Err(ImageError::Type),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationError {
    Malformed,
    Unknown,
}

/// Transaction Type subscriptions. `external` defaults to true; repeated ids keep the
/// first entry. `None` when absent or null.
pub fn notifications(f: Field, known: impl Fn(Id) -> bool) -> Result<Option<Vec<Notification>>, NotificationError> {
    let Some(v) = f.value() else { return Ok(None) };
    let Value::Array(items) = v else { return Err(NotificationError::Malformed) };
    let mut out: Vec<Notification> = Vec::with_capacity(items.len());
    for item in items {
        let entry = item.as_object().ok_or(NotificationError::Malformed)?;
        let id = entry.get("transaction_type_id").and_then(int).ok_or(NotificationError::Malformed)?;
        if id <= 0 {
            return Err(NotificationError::Malformed);
        }
        let external = match entry.get("external") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(NotificationError::Malformed),
        };
        let transaction_type_id = id as Id;
        if out.iter().any(|n| n.transaction_type_id == transaction_type_id) {
            continue;
        }
        out.push(Notification { transaction_type_id, external });
    }
    if out.iter().any(|n| !known(n.transaction_type_id)) {
        return Err(NotificationError::Unknown);
    }
    Ok(Some(out))
}

/// Decimal from a number or numeric string. `Ok(None)` for null or absent.
pub fn decimal(f: Field) -> Result<Option<Decimal>, ()> {
    let Some(v) = f.value() else { return Ok(None) };
    let raw = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(()),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| ())
}

/// JSON object. `Ok(None)` for null or absent.
pub fn object(f: Field) -> Result<Option<Map<String, Value>>, ()> {
    match f {
        Field::Absent | Field::Null => Ok(None),
        Field::Value(Value::Object(o)) => Ok(Some(o.clone())),
        Field::Value(_) => Err(()),
    }
}
