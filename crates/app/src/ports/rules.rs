//! Rule source port: the `{source → target}` lookup used by the router.

use std::future::Future;

use nest_domain::error::NestError;
use nest_domain::id::EntityId;
use nest_domain::rules::RuleTable;

/// Resolves the target an event source is wired to.
///
/// Keeping this behind a trait lets the router run against a fixed table or
/// against one that is reloaded at runtime.
pub trait RuleSource {
    /// Target for `source`, or `None` when the source is not mapped.
    fn resolve(
        &self,
        source: &EntityId,
    ) -> impl Future<Output = Result<Option<EntityId>, NestError>> + Send;
}

impl RuleSource for RuleTable {
    async fn resolve(&self, source: &EntityId) -> Result<Option<EntityId>, NestError> {
        Ok(self.target_for(source.as_str()).cloned())
    }
}

impl<T: RuleSource + Send + Sync> RuleSource for std::sync::Arc<T> {
    fn resolve(
        &self,
        source: &EntityId,
    ) -> impl Future<Output = Result<Option<EntityId>, NestError>> + Send {
        (**self).resolve(source)
    }
}
