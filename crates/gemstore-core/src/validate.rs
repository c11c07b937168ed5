//! Per-entity input validation.
//!
//! Each function checks a raw JSON payload before anything is written and
//! returns either a typed value or the [`FieldErrors`] explaining the
//! rejection.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::document::Fields;
use crate::error::FieldErrors;

// A pattern that fails to compile rejects every input.
static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

static PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").ok());

static PHONE_NOISE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\s\-()]").ok());

pub const MESSAGE_MIN_CHARS: usize = 10;
pub const MESSAGE_MAX_CHARS: usize = 1000;

fn non_empty_str<'a>(payload: &'a Fields, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(email))
}

/// International digits, optionally `+`-prefixed, after removing spaces,
/// dashes, and parentheses.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = match PHONE_NOISE.as_ref() {
        Some(re) => re.replace_all(phone, ""),
        None => Cow::Borrowed(phone),
    };
    PHONE.as_ref().is_some_and(|re| re.is_match(&digits))
}

/// Interprets a boolean flag that may arrive as a JSON bool or as the
/// strings `"true"`/`"false"` (multipart form fields are always strings).
pub fn parse_bool_flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        Some(_) => false,
    }
}

/// A required search term.
pub fn require_search_term(q: Option<&str>) -> Result<&str, FieldErrors> {
    q.filter(|q| !q.is_empty())
        .ok_or_else(|| FieldErrors::new("Search query is required").with_field("q", "required"))
}

/// A validated contact-form submission, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub message: String,
}

pub fn validate_contact(payload: &Fields) -> Result<ContactSubmission, FieldErrors> {
    let required = [
        ("fullName", "Full name is required"),
        ("email", "Email is required"),
        ("phoneNumber", "Phone number is required"),
        ("message", "Message is required"),
    ];
    let mut missing = FieldErrors::new("All fields are required");
    for (field, reason) in required {
        if non_empty_str(payload, field).is_none() {
            missing = missing.with_field(field, reason);
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }

    let full_name = non_empty_str(payload, "fullName").unwrap_or_default();
    // Checked and stored without surrounding whitespace.
    let email = non_empty_str(payload, "email").unwrap_or_default().trim();
    let phone = non_empty_str(payload, "phoneNumber").unwrap_or_default();
    let message = non_empty_str(payload, "message").unwrap_or_default();

    if !is_valid_email(email) {
        return Err(FieldErrors::new("Invalid email format").with_field("email", "invalid format"));
    }
    if !is_valid_phone(phone) {
        return Err(FieldErrors::new("Invalid phone number format")
            .with_field("phoneNumber", "invalid format"));
    }
    let len = message.chars().count();
    if len < MESSAGE_MIN_CHARS {
        return Err(
            FieldErrors::new("Message must be at least 10 characters long")
                .with_field("message", "too short"),
        );
    }
    if len > MESSAGE_MAX_CHARS {
        return Err(
            FieldErrors::new("Message must be at most 1000 characters long")
                .with_field("message", "too long"),
        );
    }

    Ok(ContactSubmission {
        full_name: full_name.trim().to_string(),
        email: email.to_lowercase(),
        phone_number: phone.trim().to_string(),
        message: message.trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    New,
    Read,
    Replied,
    Closed,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 4] = [
        ContactStatus::New,
        ContactStatus::Read,
        ContactStatus::Replied,
        ContactStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
            ContactStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

pub fn validate_contact_status(payload: &Fields) -> Result<ContactStatus, FieldErrors> {
    let raw = non_empty_str(payload, "status")
        .ok_or_else(|| FieldErrors::new("Status is required").with_field("status", "required"))?;
    ContactStatus::parse(raw).ok_or_else(|| {
        let allowed: Vec<&str> = ContactStatus::ALL.iter().map(|s| s.as_str()).collect();
        FieldErrors::new(format!(
            "Invalid status. Must be one of: {}",
            allowed.join(", ")
        ))
        .with_field("status", "invalid value")
    })
}

/// A validated jewelry type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJewelryType {
    pub type_name: String,
    pub description: String,
    pub image: String,
    pub is_active: bool,
}

/// `uploaded_image` is the public path of an uploaded file; it takes
/// precedence over an inline `image` URL.
pub fn validate_jewelry_type(
    payload: &Fields,
    uploaded_image: Option<String>,
) -> Result<NewJewelryType, FieldErrors> {
    let image = uploaded_image.or_else(|| non_empty_str(payload, "image").map(str::to_string));
    let type_name = non_empty_str(payload, "type");
    let description = non_empty_str(payload, "description");

    let mut errors = FieldErrors::new("type, description, and image are required fields.");
    if type_name.is_none() {
        errors = errors.with_field("type", "required");
    }
    if description.is_none() {
        errors = errors.with_field("description", "required");
    }
    if image.is_none() {
        errors = errors.with_field("image", "required");
    }
    match (type_name, description, image) {
        (Some(t), Some(d), Some(image)) => Ok(NewJewelryType {
            type_name: t.to_string(),
            description: d.to_string(),
            image,
            is_active: parse_bool_flag(payload.get("isActive"), true),
        }),
        _ => Err(errors),
    }
}

/// A validated customization request. `extra` holds every other payload
/// field, stored as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomization {
    pub gem_id: String,
    pub jewelry_id: String,
    pub gem_name: Option<String>,
    pub jewelry_name: Option<String>,
    pub extra: Fields,
}

pub fn validate_customization(mut payload: Fields) -> Result<NewCustomization, FieldErrors> {
    let gem_id = non_empty_str(&payload, "gemId").map(str::to_string);
    let jewelry_id = non_empty_str(&payload, "jewelryId").map(str::to_string);
    let (Some(gem_id), Some(jewelry_id)) = (gem_id, jewelry_id) else {
        let mut errors = FieldErrors::new("gemId and jewelryId are required");
        if non_empty_str(&payload, "gemId").is_none() {
            errors = errors.with_field("gemId", "required");
        }
        if non_empty_str(&payload, "jewelryId").is_none() {
            errors = errors.with_field("jewelryId", "required");
        }
        return Err(errors);
    };
    let gem_name = non_empty_str(&payload, "gemName").map(str::to_string);
    let jewelry_name = non_empty_str(&payload, "jewelryName").map(str::to_string);
    for key in ["gemId", "jewelryId", "gemName", "jewelryName", "id"] {
        payload.remove(key);
    }
    Ok(NewCustomization {
        gem_id,
        jewelry_id,
        gem_name,
        jewelry_name,
        extra: payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn contact_with_message(message: &str) -> Fields {
        fields(json!({
            "fullName": " Ada Lovelace ",
            "email": " Ada@Example.COM ",
            "phoneNumber": "+44 (20) 7946-0958",
            "message": message,
        }))
    }

    #[test]
    fn test_message_length_bounds() {
        for (len, ok) in [(9, false), (10, true), (1000, true), (1001, false)] {
            let result = validate_contact(&contact_with_message(&"m".repeat(len)));
            assert_eq!(result.is_ok(), ok, "length {}", len);
        }
    }

    #[test]
    fn test_contact_normalization() {
        let c = validate_contact(&contact_with_message("Hello there, I need a ring.")).unwrap();
        assert_eq!(c.full_name, "Ada Lovelace");
        assert_eq!(c.email, "ada@example.com");
        assert_eq!(c.phone_number, "+44 (20) 7946-0958");
    }

    #[test]
    fn test_contact_missing_fields_listed() {
        let err = validate_contact(&fields(json!({"fullName": "Ada"}))).unwrap_err();
        assert_eq!(err.message, "All fields are required");
        assert_eq!(err.fields.len(), 3);
        assert!(err.fields.contains_key("email"));
        assert!(!err.fields.contains_key("fullName"));
    }

    #[test]
    fn test_patterns_compile() {
        assert!(EMAIL.is_some());
        assert!(PHONE.is_some());
        assert!(PHONE_NOISE.is_some());
    }

    #[test]
    fn test_email_and_phone_patterns() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(is_valid_phone("+1 (555) 123-4567"));
        assert!(is_valid_phone("94771234567"));
        assert!(!is_valid_phone("0771234567"));
        assert!(!is_valid_phone("call me"));
        assert!(!is_valid_phone("+12345678901234567"));
    }

    #[test]
    fn test_contact_status() {
        assert_eq!(
            validate_contact_status(&fields(json!({"status": "replied"}))).unwrap(),
            ContactStatus::Replied
        );
        let err = validate_contact_status(&fields(json!({"status": "archived"}))).unwrap_err();
        assert!(err.message.contains("new, read, replied, closed"));
        assert!(validate_contact_status(&fields(json!({}))).is_err());
    }

    #[test]
    fn test_jewelry_type_requires_image_from_somewhere() {
        let payload = fields(json!({"type": "Ring", "description": "Bands"}));
        let err = validate_jewelry_type(&payload, None).unwrap_err();
        assert_eq!(err.fields.keys().collect::<Vec<_>>(), vec!["image"]);

        let ok = validate_jewelry_type(&payload, Some("/uploads/type/x.png".into())).unwrap();
        assert_eq!(ok.image, "/uploads/type/x.png");
        assert!(ok.is_active);
    }

    #[test]
    fn test_jewelry_type_is_active_flag() {
        let payload = fields(json!({
            "type": "Ring", "description": "Bands", "image": "http://x/y.png", "isActive": "false"
        }));
        assert!(!validate_jewelry_type(&payload, None).unwrap().is_active);

        let payload = fields(json!({
            "type": "Ring", "description": "Bands", "image": "http://x/y.png", "isActive": true
        }));
        assert!(validate_jewelry_type(&payload, None).unwrap().is_active);
    }

    #[test]
    fn test_customization_splits_known_fields() {
        let payload = fields(json!({
            "gemId": "g1", "jewelryId": "j1", "gemName": "Ruby", "engraving": "A&B"
        }));
        let c = validate_customization(payload).unwrap();
        assert_eq!(c.gem_id, "g1");
        assert_eq!(c.gem_name.as_deref(), Some("Ruby"));
        assert_eq!(c.jewelry_name, None);
        assert_eq!(c.extra, fields(json!({"engraving": "A&B"})));
    }

    #[test]
    fn test_customization_requires_both_ids() {
        let err = validate_customization(fields(json!({"gemId": "g1"}))).unwrap_err();
        assert!(err.fields.contains_key("jewelryId"));
        assert!(!err.fields.contains_key("gemId"));
    }

    #[test]
    fn test_search_term() {
        assert!(require_search_term(None).is_err());
        assert!(require_search_term(Some("")).is_err());
        assert_eq!(require_search_term(Some("Ru")).unwrap(), "Ru");
    }
}
