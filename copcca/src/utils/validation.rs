//! Field validators and a small rule-driven form checker.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const PHONE_MIN_LENGTH: usize = 5;
pub const PHONE_MAX_LENGTH: usize = 15;
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 100;
pub const COMPANY_NAME_MAX_LENGTH: usize = 200;
pub const NOTES_MAX_LENGTH: usize = 5000;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()-]*$").expect("valid phone regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Digits with optional leading `+` and separators; 5 to 15 digits in total.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    PHONE_RE.is_match(phone) && (PHONE_MIN_LENGTH..=PHONE_MAX_LENGTH).contains(&digits)
}

/// Absolute http(s) URL with a host.
pub fn is_valid_url(url: &str) -> bool {
    url::Url::parse(url.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Non-blank strings and any non-null value count as present.
pub fn is_required(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

pub fn is_in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

/// Trimmed length (in characters) is at least `min` and, when given, at most `max`.
pub fn is_length_valid(value: &str, min: usize, max: Option<usize>) -> bool {
    let length = value.trim().chars().count();
    length >= min && max.is_none_or(|max| length <= max)
}

#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

impl FieldRule {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

/// Check `data` against per-field rules. Returns the first problem of each failing field;
/// an empty map means the form is valid. Absent optional fields are not checked further.
pub fn validate_form(data: &Value, rules: &[(&str, FieldRule)]) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();

    for (field, rule) in rules {
        let value = data.get(*field).unwrap_or(&Value::Null);

        if !is_required(value) {
            if rule.required {
                errors.insert(field.to_string(), format!("{field} is required"));
            }
            continue;
        }

        let Some(text) = value.as_str() else {
            continue;
        };
        let length = text.trim().chars().count();

        let problem = if rule.min_length.is_some_and(|min| length < min) {
            rule.min_length.map(|n| format!("{field} must be at least {n} characters"))
        } else if rule.max_length.is_some_and(|max| length > max) {
            rule.max_length.map(|n| format!("{field} must be at most {n} characters"))
        } else if rule.pattern.as_ref().is_some_and(|re| !re.is_match(text)) {
            Some(format!("{field} format is invalid"))
        } else {
            None
        };

        if let Some(problem) = problem {
            errors.insert(field.to_string(), problem);
        }
    }

    errors
}
