//! Contact records as the `contacts` resource serves them, and the payloads
//! sent back to it.
//!
//! Reads and updates use `fname`/`lname`, while creates send
//! `firstName`/`lastName`. The server contract is lopsided and we keep it
//! that way.

use std::fmt;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::ValidationError;

/// Server-assigned contact id. Records without a usable id decode as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ContactId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ContactId(id_from_value(&value).unwrap_or(0)))
    }
}

fn id_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl std::str::FromStr for ContactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ContactId)
    }
}

/// `createdAt` as found on the wire: a millisecond epoch number (what this
/// client sends) or a date string.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedAt {
    Millis(i64),
    Text(String),
}

impl CreatedAt {
    /// Milliseconds since the Unix epoch, 0 when the value cannot be parsed.
    pub fn epoch_millis(&self) -> i64 {
        match self {
            CreatedAt::Millis(ms) => *ms,
            CreatedAt::Text(text) => parse_timestamp(text).unwrap_or(0),
        }
    }
}

impl Serialize for CreatedAt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            CreatedAt::Millis(ms) => serializer.serialize_i64(*ms),
            CreatedAt::Text(text) => serializer.serialize_str(text),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some((dt.unix_timestamp_nanos() / 1_000_000) as i64);
    }
    let date_only = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(trimmed, date_only) {
        let dt = date.midnight().assume_utc();
        return Some(dt.unix_timestamp() * 1000);
    }
    None
}

fn created_at_from_value<'de, D>(deserializer: D) -> Result<Option<CreatedAt>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(CreatedAt::Millis),
        Some(Value::String(s)) => Some(CreatedAt::Text(s)),
        _ => None,
    })
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub id: ContactId,
    #[serde(default, deserialize_with = "string_or_null")]
    pub fname: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub lname: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub email: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub phone: String,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "created_at_from_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<CreatedAt>,
}

impl Contact {
    pub fn created_millis(&self) -> i64 {
        self.created_at.as_ref().map_or(0, CreatedAt::epoch_millis)
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.fname.trim(), self.lname.trim());
        let name = name.trim();
        if name.is_empty() {
            format!("#{}", self.id)
        } else {
            name.to_string()
        }
    }
}

/// Body of `POST /contacts`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub created_at: i64,
}

/// Body of `PATCH /contacts/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPatch {
    pub id: ContactId,
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Phone,
}

impl FormField {
    pub const ALL: [FormField; 4] = [
        FormField::FirstName,
        FormField::LastName,
        FormField::Email,
        FormField::Phone,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::FirstName => "First Name",
            FormField::LastName => "Last Name",
            FormField::Email => "Email",
            FormField::Phone => "Phone",
        }
    }

    /// Wire name, as used in validation messages.
    pub fn key(self) -> &'static str {
        match self {
            FormField::FirstName => "fname",
            FormField::LastName => "lname",
            FormField::Email => "email",
            FormField::Phone => "phone",
        }
    }

    pub fn next(self) -> Self {
        match self {
            FormField::FirstName => FormField::LastName,
            FormField::LastName => FormField::Email,
            FormField::Email => FormField::Phone,
            FormField::Phone => FormField::FirstName,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormField::FirstName => FormField::Phone,
            FormField::LastName => FormField::FirstName,
            FormField::Email => FormField::LastName,
            FormField::Phone => FormField::Email,
        }
    }
}

/// Values of the create and edit forms. `id` is the hidden field; it is
/// `None` on the new-contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub id: Option<ContactId>,
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub phone: String,
}

impl ContactForm {
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            id: Some(contact.id),
            fname: contact.fname.clone(),
            lname: contact.lname.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
        }
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::FirstName => &self.fname,
            FormField::LastName => &self.lname,
            FormField::Email => &self.email,
            FormField::Phone => &self.phone,
        }
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::FirstName => self.fname = value,
            FormField::LastName => self.lname = value,
            FormField::Email => self.email = value,
            FormField::Phone => self.phone = value,
        }
    }

    /// Build the create payload. Every field must be non-empty after trimming.
    pub fn to_new_contact(&self, created_at: i64) -> Result<NewContact, ValidationError> {
        let missing: Vec<&'static str> = FormField::ALL
            .iter()
            .filter(|field| self.get(**field).trim().is_empty())
            .map(|field| field.key())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(NewContact {
            first_name: self.fname.trim().to_string(),
            last_name: self.lname.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            created_at,
        })
    }

    /// Build the update payload. Only the hidden id is required.
    pub fn to_patch(&self) -> Result<ContactPatch, ValidationError> {
        let id = self.id.ok_or(ValidationError::MissingId)?;
        Ok(ContactPatch {
            id,
            fname: self.fname.trim().to_string(),
            lname: self.lname.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_lenient_fields() {
        let contact: Contact = serde_json::from_value(json!({
            "id": "7",
            "fname": null,
            "lname": "Doe",
            "email": "jane@example.com"
        }))
        .unwrap();

        assert_eq!(contact.id, ContactId(7));
        assert_eq!(contact.fname, "");
        assert_eq!(contact.lname, "Doe");
        assert_eq!(contact.phone, "");
        assert!(contact.created_at.is_none());
        assert_eq!(contact.created_millis(), 0);
    }

    #[test]
    fn test_decode_created_record_keeps_quirk() {
        // A record created via POST carries firstName/lastName, not fname/lname
        let contact: Contact = serde_json::from_value(json!({
            "id": 3,
            "firstName": "Amy",
            "lastName": "Pond",
            "email": "amy@example.com",
            "phone": "555",
            "createdAt": 1_700_000_000_000i64
        }))
        .unwrap();

        assert_eq!(contact.fname, "");
        assert_eq!(contact.lname, "");
        assert_eq!(contact.created_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_missing_or_garbage_id_is_zero() {
        let contact: Contact = serde_json::from_value(json!({ "fname": "A" })).unwrap();
        assert_eq!(contact.id, ContactId(0));

        let contact: Contact = serde_json::from_value(json!({ "id": "abc" })).unwrap();
        assert_eq!(contact.id, ContactId(0));
    }

    #[test]
    fn test_created_at_text_formats() {
        assert_eq!(
            CreatedAt::Text("1970-01-01T00:00:01Z".into()).epoch_millis(),
            1000
        );
        assert_eq!(
            CreatedAt::Text("1970-01-02".into()).epoch_millis(),
            86_400_000
        );
        assert_eq!(CreatedAt::Text("yesterday".into()).epoch_millis(), 0);
        assert_eq!(CreatedAt::Text(String::new()).epoch_millis(), 0);
    }

    #[test]
    fn test_new_contact_payload_uses_camel_case() {
        let form = ContactForm {
            id: None,
            fname: "  Amy ".into(),
            lname: "Pond".into(),
            email: "amy@example.com".into(),
            phone: " 555 ".into(),
        };
        let payload = serde_json::to_value(form.to_new_contact(42).unwrap()).unwrap();

        assert_eq!(
            payload,
            json!({
                "firstName": "Amy",
                "lastName": "Pond",
                "email": "amy@example.com",
                "phone": "555",
                "createdAt": 42
            })
        );
    }

    #[test]
    fn test_new_contact_requires_every_field() {
        let form = ContactForm {
            id: None,
            fname: "Amy".into(),
            lname: "Pond".into(),
            email: "   ".into(),
            phone: "".into(),
        };

        match form.to_new_contact(0) {
            Err(ValidationError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["email", "phone"]);
            }
            other => panic!("expected missing fields, got {:?}", other),
        }
    }

    #[test]
    fn test_patch_payload_is_trimmed_and_keyed_by_id() {
        let form = ContactForm {
            id: Some(ContactId(5)),
            fname: " Bob".into(),
            lname: "Stone ".into(),
            email: "".into(),
            phone: "1".into(),
        };
        let payload = serde_json::to_value(form.to_patch().unwrap()).unwrap();

        assert_eq!(
            payload,
            json!({ "id": 5, "fname": "Bob", "lname": "Stone", "email": "", "phone": "1" })
        );
        assert!(ContactForm::default().to_patch().is_err());
    }
}
