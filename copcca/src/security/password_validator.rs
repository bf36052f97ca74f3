//! Password strength scoring.
//!
//! [`validate_password`] runs the policy checks (length, character classes, common passwords,
//! personal information) and produces a 0-100 heuristic score with a strength bucket. It is
//! used on signup, password reset and the interactive strength endpoint.

use rand::prelude::RngExt;
use rand::rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password123",
    "123456",
    "12345678",
    "qwerty",
    "abc123",
    "monkey",
    "1234567",
    "letmein",
    "trustno1",
    "dragon",
    "baseball",
    "111111",
    "iloveyou",
    "master",
    "sunshine",
    "ashley",
    "bailey",
    "shadow",
    "123123",
    "654321",
    "superman",
    "qazwsx",
    "michael",
    "football",
    "welcome",
    "jesus",
    "ninja",
    "mustang",
    "password1",
    "admin",
    "administrator",
    "root",
    "toor",
];

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    fn from_score(score: i32) -> Self {
        match score {
            s if s >= 90 => Self::VeryStrong,
            s if s >= 70 => Self::Strong,
            s if s >= 50 => Self::Good,
            s if s >= 30 => Self::Fair,
            _ => Self::Weak,
        }
    }
}

/// Display label for a strength bucket
pub fn strength_label(strength: PasswordStrength) -> &'static str {
    match strength {
        PasswordStrength::VeryStrong => "Very Strong",
        PasswordStrength::Strong => "Strong",
        PasswordStrength::Good => "Good",
        PasswordStrength::Fair => "Fair",
        PasswordStrength::Weak => "Weak",
    }
}

#[derive(Debug, Clone)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special_chars: bool,
    pub min_special_chars: usize,
    pub prevent_common_passwords: bool,
    pub prevent_user_info: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
            min_special_chars: 1,
            prevent_common_passwords: true,
            prevent_user_info: true,
        }
    }
}

/// Personal details the password must not contain.
#[derive(Debug, Clone, Default)]
pub struct UserInfo<'a> {
    pub email: Option<&'a str>,
    pub name: Option<&'a str>,
    pub company: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordValidation {
    pub is_valid: bool,
    pub strength: PasswordStrength,
    pub score: u8,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn validate_password(password: &str, user_info: Option<&UserInfo<'_>>, reqs: &PasswordRequirements) -> PasswordValidation {
    let mut errors = Vec::new();
    let mut suggestions = Vec::new();
    let mut score: i32 = 0;

    let length = password.chars().count();
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let special_count = password.chars().filter(|c| !c.is_ascii_alphanumeric()).count();

    if length < reqs.min_length {
        errors.push(format!("Password must be at least {} characters long", reqs.min_length));
    } else {
        score += 20;
        if length >= 16 {
            score += 10;
        }
        if length >= 20 {
            score += 10;
        }
    }

    for (required, present, what) in [
        (reqs.require_uppercase, has_upper, "uppercase letter"),
        (reqs.require_lowercase, has_lower, "lowercase letter"),
        (reqs.require_numbers, has_digit, "number"),
    ] {
        if required && !present {
            errors.push(format!("Password must contain at least one {what}"));
        } else if present {
            score += 15;
        }
    }

    if reqs.require_special_chars && special_count < reqs.min_special_chars {
        errors.push(format!(
            "Password must contain at least {} special character(s) (!@#$%^&*)",
            reqs.min_special_chars
        ));
    } else if special_count > 0 {
        score += 15;
        if special_count >= 2 {
            score += 5;
        }
    }

    let lower_password = password.to_lowercase();

    if reqs.prevent_common_passwords && COMMON_PASSWORDS.iter().any(|common| lower_password.contains(common)) {
        errors.push("Password is too common or easily guessable".to_string());
        score = score.min(30);
    }

    if reqs.prevent_user_info
        && let Some(info) = user_info
    {
        let email_local = info.email.and_then(|e| e.split('@').next());
        for (value, label) in [(email_local, "email"), (info.name, "name"), (info.company, "company name")] {
            if let Some(value) = value.filter(|v| !v.is_empty())
                && lower_password.contains(&value.to_lowercase())
            {
                errors.push(format!("Password should not contain your {label}"));
                score = score.min(40);
            }
        }
    }

    if has_sequential_digits(password) {
        suggestions.push("Avoid sequential numbers in your password".to_string());
        score -= 10;
    }

    if has_sequential_letters(password) {
        suggestions.push("Avoid sequential letters in your password".to_string());
        score -= 10;
    }

    if has_repeated_run(password) {
        suggestions.push("Avoid repeating the same character multiple times".to_string());
        score -= 5;
    }

    if has_upper && has_lower && has_digit && special_count > 0 {
        score += 10;
    }

    let unique_chars = password.chars().collect::<HashSet<_>>().len();
    let varied = unique_chars as f64 >= length as f64 * 0.7;
    if varied {
        score += 10;
    }

    let score = score.clamp(0, 100);
    let strength = PasswordStrength::from_score(score);

    if errors.is_empty() && score < 90 {
        if length < 16 {
            suggestions.push("Consider using a longer password for extra security".to_string());
        }
        if special_count < 2 {
            suggestions.push("Adding more special characters increases security".to_string());
        }
        if !varied {
            suggestions.push("Use more varied characters throughout the password".to_string());
        }
    }

    PasswordValidation {
        is_valid: errors.is_empty(),
        strength,
        score: score as u8,
        errors,
        suggestions,
    }
}

/// Runs of three ascending digits, "012" through "789", plus the wrapping "890".
fn has_sequential_digits(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| {
        let all_digits = w.iter().all(|c| c.is_ascii_digit());
        let ascending = w[1] as u32 == w[0] as u32 + 1 && w[2] as u32 == w[1] as u32 + 1;
        all_digits && (ascending || (w[0] == '8' && w[1] == '9' && w[2] == '0'))
    })
}

/// Runs of three ascending letters, case-insensitive ("abc" through "xyz").
fn has_sequential_letters(password: &str) -> bool {
    let chars: Vec<char> = password.chars().map(|c| c.to_ascii_lowercase()).collect();
    chars.windows(3).any(|w| {
        w.iter().all(|c| c.is_ascii_lowercase()) && w[1] as u32 == w[0] as u32 + 1 && w[2] as u32 == w[1] as u32 + 1
    })
}

fn has_repeated_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Random password of `length` characters (minimum 4) containing every character class.
pub fn generate_strong_password(length: usize) -> String {
    let length = length.max(4);
    let mut rng = rng();
    let pick = |set: &[u8], rng: &mut rand::rngs::ThreadRng| set[rng.random_range(0..set.len())] as char;

    let mut chars = vec![
        pick(UPPERCASE, &mut rng),
        pick(LOWERCASE, &mut rng),
        pick(DIGITS, &mut rng),
        pick(SPECIAL, &mut rng),
    ];

    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL].concat();
    while chars.len() < length {
        chars.push(pick(&all, &mut rng));
    }

    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

/// Exact match against the common-password list. A stand-in for a breach-corpus lookup.
pub fn is_compromised(password: &str) -> bool {
    let lower = password.to_lowercase();
    COMMON_PASSWORDS.contains(&lower.as_str())
}
