//! API request and response data models.
//!
//! These structures define the public API contract and are kept apart from the stored
//! documents in [`crate::db::models`], so the storage layout can change without breaking
//! clients. Everything a client sees is camelCase JSON annotated with `utoipa` for the
//! OpenAPI document.
//!
//! Records and integrations are client-defined JSON objects and pass through as maps.

pub mod auth;
pub mod company;
pub mod messaging;
pub mod records;
pub mod reports;
pub mod security;
pub mod subscriptions;
pub mod tasks;
pub mod users;
