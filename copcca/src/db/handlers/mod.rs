//! Repository implementations for document access.
//!
//! Each repository borrows the shared [`Store`](crate::db::Store), so creating one is free:
//!
//! ```ignore
//! use copcca::db::handlers::{Repository, Users};
//!
//! let mut users = Users::new(&state.store);
//! let user = users.get_by_id(user_id).await?;
//! ```
//!
//! Entities with their own key (users, tasks, reports, invitations, reset tokens, payments)
//! implement [`Repository`]. Collections stored as one list per owner (records, activities,
//! integrations, saved AI reports, SMS logs) expose owner-scoped methods instead, and
//! serialize their read-modify-write cycles with [`Store::lock`](crate::db::Store::lock).

pub mod activities;
pub mod ai_reports;
pub mod company_settings;
pub mod integrations;
pub mod invitations;
pub mod password_reset_tokens;
pub mod records;
pub mod reports;
pub mod repository;
pub mod sms;
pub mod subscriptions;
pub mod tasks;
pub mod users;

pub use activities::Activities;
pub use ai_reports::AiReports;
pub use company_settings::CompanySettings;
pub use integrations::Integrations;
pub use invitations::Invitations;
pub use password_reset_tokens::PasswordResetTokens;
pub use records::Records;
pub use reports::Reports;
pub use repository::Repository;
pub use sms::SmsAccounts;
pub use subscriptions::{Payments, Subscriptions};
pub use tasks::Tasks;
pub use users::{Teams, Users};
