//! Authentication: password hashing, JWT sessions and the authenticated-user extractor.
//!
//! Clients sign up or log in through `/api/v1/auth/*` and receive a session token, both in the
//! response body and as an HTTP-only cookie. Every other endpoint takes the token either as
//! `Authorization: Bearer <token>` or through that cookie.
//!
//! A token alone is not enough: each login registers a session fingerprint (see
//! [`crate::security::fingerprint`]), and [`current_user`] refuses tokens whose session was
//! revoked, expired, or is being presented from a different device.
//!
//! # Modules
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor and
//!   role checks
//! - [`password`]: Argon2id hashing and reset token generation
//! - [`session`]: JWT claims, signing and session cookies
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use copcca::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.name)
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod session;
