use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub const USERNAME_MIN_CHARS: usize = 2;
pub const USERNAME_MAX_CHARS: usize = 20;
pub const PASSWORD_MIN_CHARS: usize = 3;

/// A single rule violation, keyed by the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

fn violation(field: &'static str, message: impl Into<String>) -> FieldError {
    FieldError {
        field,
        message: message.into(),
    }
}

/// The field set a profile is validated on. `password` is `Some` only when a
/// (new) password is part of the change.
pub struct ProfileFields<'a> {
    pub username: &'a str,
    pub password: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Runs every rule and returns all violations together; nothing
/// short-circuits, so the caller can report the complete set at once.
pub fn validate_profile(fields: &ProfileFields<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let username = fields.username.trim();
    if username.is_empty() {
        errors.push(violation("username", "can't be blank"));
    }
    let len = username.chars().count();
    if len < USERNAME_MIN_CHARS || len > USERNAME_MAX_CHARS {
        errors.push(violation(
            "username",
            format!("must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"),
        ));
    }

    if let Some(password) = fields.password {
        if password.is_empty() {
            errors.push(violation("password", "can't be blank"));
        }
        if password.chars().count() < PASSWORD_MIN_CHARS {
            errors.push(violation(
                "password",
                format!("must be at least {PASSWORD_MIN_CHARS} characters"),
            ));
        }
    }

    if let Some(phone) = fields.phone {
        if !phone.is_empty() && !looks_like_phone(phone) {
            errors.push(violation("phone", "doesn't look like a phone number"));
        }
    }

    errors
}

pub(crate) fn looks_like_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ().\-]{5,18}[0-9]$").unwrap();
    }
    PHONE_RE.is_match(phone)
}
