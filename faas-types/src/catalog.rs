//! The merged, flat catalog of one deployment cycle.

use crate::descriptor::FunctionDescriptor;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Export name to descriptor. Built fresh on every resolution and handed
/// to mounting by reference; nothing mutates it afterwards.
///
/// Iteration is by name, so mounting order never depends on the order
/// files were discovered in.
#[derive(Debug, Clone, Default)]
pub struct FunctionCatalog {
    entries: BTreeMap<String, FunctionDescriptor>,
}

impl FunctionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor. A later insert under the same name replaces the
    /// earlier one and returns it (last writer wins).
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        descriptor: FunctionDescriptor,
    ) -> Option<FunctionDescriptor> {
        self.entries.insert(name.into(), descriptor)
    }

    /// Remove a descriptor.
    pub fn remove(&mut self, name: &str) -> Option<FunctionDescriptor> {
        self.entries.remove(name)
    }

    /// Look up a descriptor.
    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.entries.get(name)
    }

    /// Whether a name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionDescriptor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The catalog as a JSON map of name to sanitized descriptor.
    pub fn sanitized(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, d)| (name.clone(), d.sanitized()))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> FunctionDescriptor {
        let mut d = FunctionDescriptor::default();
        d.docs.insert("description".into(), Value::String(text.into()));
        d
    }

    #[test]
    fn later_insert_wins() {
        let mut catalog = FunctionCatalog::new();
        assert!(catalog.insert("a", doc("first")).is_none());
        let replaced = catalog.insert("a", doc("second"));
        assert!(replaced.is_some());
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("a").map(|d| d.docs["description"].clone()),
            Some(Value::String("second".into()))
        );
    }

    #[test]
    fn names_are_sorted() {
        let mut catalog = FunctionCatalog::new();
        catalog.insert("zeta", doc("z"));
        catalog.insert("alpha", doc("a"));
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
