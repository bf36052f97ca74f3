//! Stored document structures.
//!
//! Each module holds the document as persisted (`*DBResponse`), the requests a repository
//! accepts (`*CreateDBRequest`, `*UpdateDBRequest`) and list filters. Documents are camelCase
//! JSON so they stay readable by the web client.

pub mod activities;
pub mod ai_reports;
pub mod company;
pub mod integrations;
pub mod invitations;
pub mod password_reset_tokens;
pub mod records;
pub mod reports;
pub mod sms;
pub mod subscriptions;
pub mod tasks;
pub mod users;
