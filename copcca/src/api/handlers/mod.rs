//! HTTP request handlers for the `/api/v1` endpoints.
//!
//! Handlers extract the [`CurrentUser`](crate::api::models::users::CurrentUser), check the
//! caller's role, run the work through a repository from [`crate::db::handlers`] and return JSON.
//! Errors are [`crate::errors::Error`], which renders as a status code with an `error` message.
//!
//! # Handler Modules
//!
//! - [`auth`]: signup, login, logout and password recovery
//! - [`profile`]: the caller's profile, sessions and security audit trail
//! - [`users`]: team user management by admins
//! - [`records`]: per-user CRM collections, the activity feed and debt follow-ups
//! - [`tasks`]: tasks assigned within a team
//! - [`integrations`]: third-party integrations per user
//! - [`reports`]: reports and their generated insights
//! - [`ai_reports`]: saved AI analysis snapshots
//! - [`company`]: company settings and invitations
//! - [`sms`] / [`whatsapp`]: customer messaging
//! - [`subscriptions`]: plans, trials, payments and platform billing administration
//! - [`currencies`]: currency list and conversion

pub mod ai_reports;
pub mod auth;
pub mod company;
pub mod currencies;
pub mod integrations;
pub mod profile;
pub mod records;
pub mod reports;
pub mod sms;
pub mod subscriptions;
pub mod tasks;
pub mod users;
pub mod whatsapp;
