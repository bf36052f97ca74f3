//! The shared CRUD surface of keyed entities.

use std::collections::HashMap;

use crate::db::errors::Result;

/// CRUD over documents stored one per key (`user:{id}`, `task:{id}`, `payment:{id}` ...).
///
/// Implementors keep their secondary indexes (team membership lists, email lookups) in step
/// with the primary document, so callers only ever see whole entities.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    /// Stored document handed back to callers
    type Response;
    type Id: Send + Sync;
    /// Narrows `list`; usually a team or assignee scope
    type Filter: Send + Sync;

    /// Fails with `UniqueViolation` when the key or a unique index is taken.
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Missing ids are left out of the map.
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns whether anything was removed.
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Fails with `NotFound` for unknown ids.
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
