//! Reloadable rule source.

use std::sync::{Arc, PoisonError, RwLock};

use nest_domain::error::NestError;
use nest_domain::id::EntityId;
use nest_domain::rules::RuleTable;

use crate::ports::RuleSource;

/// A [`RuleTable`] that can be swapped while the router is running.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct SharedRuleTable {
    inner: Arc<RwLock<RuleTable>>,
}

impl SharedRuleTable {
    /// Wrap an initial table.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::Validation`] if the table is invalid.
    pub fn new(table: RuleTable) -> Result<Self, NestError> {
        table.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(table)),
        })
    }

    /// Replace the whole table atomically.
    ///
    /// Events routed after this call see the new table; the old one is kept
    /// when validation fails.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::Validation`] if the new table is invalid.
    pub fn replace(&self, table: RuleTable) -> Result<(), NestError> {
        table.validate()?;
        let rules = table.len();
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = table;
        tracing::info!(rules, "rule table replaced");
        Ok(())
    }

    /// Copy of the current table.
    #[must_use]
    pub fn snapshot(&self) -> RuleTable {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RuleSource for SharedRuleTable {
    async fn resolve(&self, source: &EntityId) -> Result<Option<EntityId>, NestError> {
        let target = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .target_for(source.as_str())
            .cloned();
        Ok(target)
    }
}
