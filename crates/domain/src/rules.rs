//! Automation rules: a direct `{source → target}` mapping.
//!
//! When the source emits `TurnOn`/`TurnOff`, the automation engine writes
//! the same value to the target. Sources and targets are [`EntityId`]s, so
//! a rule can connect devices as well as composite entities.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::NestError;
use crate::id::EntityId;

/// Immutable 1:1 rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: HashMap<EntityId, EntityId>,
}

impl RuleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any previous target for `source`.
    #[must_use]
    pub fn with_rule(mut self, source: impl Into<EntityId>, target: impl Into<EntityId>) -> Self {
        self.rules.insert(source.into(), target.into());
        self
    }

    /// Target configured for `source`, if any.
    #[must_use]
    pub fn target_for(&self, source: &str) -> Option<&EntityId> {
        self.rules.get(source)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over `(source, target)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &EntityId)> {
        self.rules.iter()
    }

    /// Check rule invariants.
    ///
    /// # Errors
    ///
    /// Returns [`NestError::Validation`] when a rule maps an entity onto
    /// itself, which would make it write back its own observations.
    pub fn validate(&self) -> Result<(), NestError> {
        let mut loops: Vec<&str> = self
            .rules
            .iter()
            .filter(|(source, target)| source == target)
            .map(|(source, _)| source.as_str())
            .collect();
        if loops.is_empty() {
            return Ok(());
        }
        loops.sort_unstable();
        Err(NestError::Validation(format!(
            "rules must not target their own source: {}",
            loops.join(", ")
        )))
    }
}

impl<S: Into<EntityId>, T: Into<EntityId>> FromIterator<(S, T)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|(source, target)| (source.into(), target.into()))
                .collect(),
        }
    }
}
