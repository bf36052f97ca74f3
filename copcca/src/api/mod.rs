//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: request and response bodies
//!
//! Everything is mounted under `/api/v1`. Apart from signup, login, password recovery,
//! invitation checks, currencies and the plan list, every route needs a session token.
//! The OpenAPI document is served at `/api/openapi.json`.

pub mod handlers;
pub mod models;
