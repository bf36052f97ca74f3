//! Key layout of the document store.

use crate::types::UserId;

pub const USER_PREFIX: &str = "user:";
pub const TASK_PREFIX: &str = "task:";
pub const REPORT_PREFIX: &str = "report:";
pub const SUBSCRIPTION_PREFIX: &str = "subscription:";
pub const PAYMENT_PREFIX: &str = "payment:";

pub fn user(id: &UserId) -> String {
    format!("{USER_PREFIX}{id}")
}

pub fn user_email(email: &str) -> String {
    format!("user_email:{}", email.to_lowercase())
}

pub fn team(team_id: &str) -> String {
    format!("team:{team_id}")
}

pub fn records(collection: &str, user_id: &UserId) -> String {
    format!("records:{collection}:{user_id}")
}

pub fn activities(user_id: &UserId) -> String {
    format!("activities:{user_id}")
}

pub fn task(id: i64) -> String {
    format!("{TASK_PREFIX}{id}")
}

pub fn report(id: &str) -> String {
    format!("{REPORT_PREFIX}{id}")
}

pub fn ai_reports(user_id: &UserId) -> String {
    format!("ai-reports:{user_id}")
}

pub fn integrations(user_id: &UserId) -> String {
    format!("integrations:{user_id}")
}

pub fn invite(code: &str) -> String {
    format!("invite:{code}")
}

pub fn reset_token(token: &str) -> String {
    format!("reset:{token}")
}

pub fn company_settings(team_id: &str) -> String {
    format!("company_settings:{team_id}")
}

pub fn sms_settings(team_id: &str) -> String {
    format!("sms_settings:{team_id}")
}

pub fn sms_credits(team_id: &str) -> String {
    format!("sms_credits:{team_id}")
}

pub fn sms_logs(team_id: &str) -> String {
    format!("sms_logs:{team_id}")
}

pub fn subscription(team_id: &str) -> String {
    format!("{SUBSCRIPTION_PREFIX}{team_id}")
}

pub fn payment(payment_id: &str) -> String {
    format!("{PAYMENT_PREFIX}{payment_id}")
}

pub fn audit(user_id: &UserId) -> String {
    format!("audit:{user_id}")
}

pub fn session(token_hash: &str) -> String {
    format!("session:{token_hash}")
}

pub fn session_index(user_id: &UserId) -> String {
    format!("sessions:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_prefixes_do_not_overlap() {
        let id = Uuid::new_v4();
        assert!(user(&id).starts_with(USER_PREFIX));
        assert!(!user_email("A@B.com").starts_with(USER_PREFIX));
        assert_eq!(user_email("A@B.com"), "user_email:a@b.com");
        assert!(!session_index(&id).starts_with("session:"));
        assert!(!reset_token("x").starts_with(REPORT_PREFIX));
        assert_eq!(task(7), "task:7");
    }
}
