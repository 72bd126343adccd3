use std::collections::HashMap;

use tracing::{debug, error};

use crate::config::CollisionPolicy;
use crate::models::CanonicalDataset;
use crate::types::{AppError, AppResult};

/// Session-scoped mapping from display name to canonical dataset.
///
/// Names are listed in first-registration order; overwriting a name keeps its
/// position. `selected`, when set, always names a registered dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    entries: HashMap<String, CanonicalDataset>,
    order: Vec<String>,
    selected: Option<String>,
    policy: CollisionPolicy,
}

impl DatasetRegistry {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Insert a dataset and return the name it was registered under.
    pub fn register(&mut self, name: &str, mut dataset: CanonicalDataset) -> AppResult<String> {
        let key = if self.entries.contains_key(name) {
            match self.policy {
                CollisionPolicy::Overwrite => {
                    debug!(dataset = %name, "Overwriting registered dataset");
                    name.to_string()
                }
                CollisionPolicy::Reject => {
                    return Err(AppError::DuplicateDataset(name.to_string()))
                }
                CollisionPolicy::Rename => self.free_name(name),
            }
        } else {
            name.to_string()
        };

        dataset.display_name = key.clone();
        if self.entries.insert(key.clone(), dataset).is_none() {
            self.order.push(key.clone());
        }
        Ok(key)
    }

    fn free_name(&self, name: &str) -> String {
        (2..)
            .map(|n| format!("{} ({})", name, n))
            .find(|candidate| !self.entries.contains_key(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn select(&mut self, name: &str) -> AppResult<()> {
        if !self.entries.contains_key(name) {
            error!(dataset = %name, "Selection names a dataset that is not registered");
            return Err(AppError::UnknownDataset(name.to_string()));
        }
        self.selected = Some(name.to_string());
        Ok(())
    }

    pub fn get_selected(&self) -> Option<&CanonicalDataset> {
        self.selected.as_ref().and_then(|name| self.entries.get(name))
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&CanonicalDataset> {
        self.entries.get(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Datasets in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CanonicalDataset> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dataset(path: &str) -> CanonicalDataset {
        CanonicalDataset {
            display_name: String::new(),
            source_path: PathBuf::from(path),
            row_count: 1,
            column_count: 1,
            columns: vec!["a".to_string()],
        }
    }

    #[test]
    fn test_registration_order_and_overwrite() {
        let mut registry = DatasetRegistry::new(CollisionPolicy::Overwrite);
        registry.register("b.csv", dataset("/tmp/1.csv")).unwrap();
        registry.register("a.csv", dataset("/tmp/2.csv")).unwrap();
        registry.register("b.csv", dataset("/tmp/3.csv")).unwrap();

        assert_eq!(registry.list_names(), vec!["b.csv", "a.csv"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("b.csv").unwrap().source_path,
            PathBuf::from("/tmp/3.csv")
        );
    }

    #[test]
    fn test_reject_policy() {
        let mut registry = DatasetRegistry::new(CollisionPolicy::Reject);
        registry.register("a.csv", dataset("/tmp/1.csv")).unwrap();
        let err = registry.register("a.csv", dataset("/tmp/2.csv")).unwrap_err();
        assert!(matches!(err, AppError::DuplicateDataset(_)));
        assert_eq!(
            registry.get("a.csv").unwrap().source_path,
            PathBuf::from("/tmp/1.csv")
        );
    }

    #[test]
    fn test_rename_policy() {
        let mut registry = DatasetRegistry::new(CollisionPolicy::Rename);
        registry.register("a.csv", dataset("/tmp/1.csv")).unwrap();
        let second = registry.register("a.csv", dataset("/tmp/2.csv")).unwrap();
        let third = registry.register("a.csv", dataset("/tmp/3.csv")).unwrap();
        assert_eq!(second, "a.csv (2)");
        assert_eq!(third, "a.csv (3)");
        assert_eq!(registry.get("a.csv (2)").unwrap().display_name, "a.csv (2)");
    }

    #[test]
    fn test_select_unknown() {
        let mut registry = DatasetRegistry::default();
        assert!(registry.get_selected().is_none());
        assert!(matches!(
            registry.select("missing.csv"),
            Err(AppError::UnknownDataset(_))
        ));

        registry.register("a.csv", dataset("/tmp/1.csv")).unwrap();
        registry.select("a.csv").unwrap();
        assert_eq!(registry.get_selected().unwrap().display_name, "a.csv");

        registry.clear();
        assert!(registry.get_selected().is_none());
        assert!(registry.is_empty());
    }
}
