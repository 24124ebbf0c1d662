//! Directory port: resolves an entity id to something that accepts writes.
//!
//! The device registry implements it for filesystem devices; composite
//! entities (push buttons, lights) implement it too.

use std::future::Future;

use nest_domain::error::NestError;
use nest_domain::id::EntityId;

/// A lookup of write targets by id.
pub trait EntityDirectory {
    /// Whether `id` is known to this directory.
    fn contains(&self, id: &EntityId) -> bool;

    /// Drive the entity `id` on (`true`) or off (`false`).
    ///
    /// Fails with [`NestError::NotFound`] when `id` is unknown, and with
    /// whatever the target reports otherwise (e.g. [`NestError::NotWritable`]).
    fn apply(&self, id: &EntityId, on: bool) -> impl Future<Output = Result<(), NestError>> + Send;
}

impl<T: EntityDirectory + Send + Sync> EntityDirectory for std::sync::Arc<T> {
    fn contains(&self, id: &EntityId) -> bool {
        (**self).contains(id)
    }

    fn apply(&self, id: &EntityId, on: bool) -> impl Future<Output = Result<(), NestError>> + Send {
        (**self).apply(id, on)
    }
}
