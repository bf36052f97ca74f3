//! Storage layer for data persistence and access.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - business rules over documents)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - stored documents)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │    Store    │  (db::kv - MemoryKv or PostgresKv)
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`kv`]: the [`kv::KvStore`] trait and the shared [`kv::Store`] handle
//! - [`memory`] / [`postgres`]: storage backends
//! - [`keys`]: the key layout
//! - [`handlers`]: repositories, one per entity
//! - [`models`]: stored document structures
//! - [`errors`]: storage error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use copcca::db::handlers::{Repository, Tasks};
//!
//! let mut tasks = Tasks::new(&state.store);
//! let task = tasks.get_by_id(42).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod keys;
pub mod kv;
pub mod memory;
pub mod models;
pub mod postgres;

pub use kv::{KvStore, Store};
