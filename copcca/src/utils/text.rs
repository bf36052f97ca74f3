//! Display normalisation for names, roles and emails.

/// Lowercase everything, then capitalise the first letter of each space-separated word.
pub fn to_title_case(text: &str) -> String {
    text.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_name(name: &str) -> String {
    to_title_case(name.trim())
}

/// `sales_manager` and `sales-manager` both become `Sales Manager`.
pub fn format_role(role: &str) -> String {
    to_title_case(&role.replace(['_', '-'], " "))
}

pub fn format_email(email: &str) -> String {
    email.trim().to_lowercase()
}
