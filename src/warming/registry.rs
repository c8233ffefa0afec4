//! Target registry.
//!
//! Static list of warming targets, built once at start-up and read-only
//! afterwards. Registration order is preserved and used as the tie-breaker
//! when targets of equal priority are scheduled.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::domain::types::Priority;

use super::{error::WarmingError, target::WarmingTarget};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("target `{0}` is registered more than once")]
    Duplicate(String),
    #[error("target id must not be empty")]
    EmptyId,
}

#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<WarmingTarget>,
    index: HashMap<String, usize>,
}

impl TargetRegistry {
    /// Build a registry from targets in registration order.
    pub fn new(targets: Vec<WarmingTarget>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(targets.len());
        for (position, target) in targets.iter().enumerate() {
            if target.id().trim().is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if index.insert(target.id().to_string(), position).is_some() {
                return Err(RegistryError::Duplicate(target.id().to_string()));
            }
        }
        Ok(Self { targets, index })
    }

    pub fn list(&self) -> &[WarmingTarget] {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Result<&WarmingTarget, WarmingError> {
        self.index
            .get(id)
            .map(|&position| &self.targets[position])
            .ok_or_else(|| WarmingError::UnknownTarget(id.to_string()))
    }

    /// Targets whose priority is in `priorities`, in registration order.
    pub fn filter_by_priority(&self, priorities: &HashSet<Priority>) -> Vec<WarmingTarget> {
        self.targets
            .iter()
            .filter(|target| priorities.contains(&target.priority()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::types::TargetKind;
    use crate::warming::target::FnRefresher;

    fn target(id: &str, priority: Priority) -> WarmingTarget {
        WarmingTarget::new(
            id,
            TargetKind::Page,
            priority,
            Arc::new(FnRefresher::new(|| async { Ok::<(), crate::warming::RefreshError>(()) })),
        )
    }

    #[test]
    fn register_and_lookup() {
        let registry = TargetRegistry::new(vec![
            target("/", Priority::Critical),
            target("/blog", Priority::Normal),
        ])
        .expect("valid registry");

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("/blog").expect("registered").priority(),
            Priority::Normal
        );
        assert!(matches!(
            registry.get("/missing"),
            Err(WarmingError::UnknownTarget(id)) if id == "/missing"
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = TargetRegistry::new(vec![
            target("/", Priority::Critical),
            target("/", Priority::Low),
        ]);
        assert_eq!(result.err(), Some(RegistryError::Duplicate("/".into())));
    }

    #[test]
    fn filter_preserves_registration_order() {
        let registry = TargetRegistry::new(vec![
            target("/a", Priority::High),
            target("/b", Priority::Low),
            target("/c", Priority::High),
            target("/d", Priority::Critical),
        ])
        .expect("valid registry");

        let wanted = HashSet::from([Priority::High, Priority::Critical]);
        let ids: Vec<String> = registry
            .filter_by_priority(&wanted)
            .iter()
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(ids, vec!["/a", "/c", "/d"]);
    }
}
