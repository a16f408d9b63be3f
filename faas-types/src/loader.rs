//! The boundary between the engine and loaded user code.
//!
//! Implementations:
//! - `faas-resolver`: `JsonModuleLoader`, `TomlModuleLoader`, `YamlModuleLoader`
//! - `test_utils::StaticModuleLoader` (feature `test-utils`)

use crate::descriptor::FunctionDescriptor;
use crate::error::LoadError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// One named export of a module.
#[derive(Debug, Clone)]
pub enum ExportValue {
    /// An object-shaped export. The only kind that enters the catalog.
    Descriptor(FunctionDescriptor),
    /// A bare callable export. Ignored by the resolver.
    Function,
    /// A scalar or array export. Ignored by the resolver.
    Primitive(Value),
}

/// Every export of one module, in the order the module declares them.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    entries: Vec<(String, ExportValue)>,
}

impl ModuleExports {
    /// Create an empty export list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an export.
    pub fn push(&mut self, name: impl Into<String>, value: ExportValue) {
        self.entries.push((name.into(), value));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, value: ExportValue) -> Self {
        self.push(name, value);
        self
    }

    /// Number of exports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no exports.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exports in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for ModuleExports {
    type Item = (String, ExportValue);
    type IntoIter = std::vec::IntoIter<(String, ExportValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Loads module files of the formats it recognizes.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// File name suffixes this loader handles, e.g. `.fn.json`.
    fn suffixes(&self) -> &[&'static str];

    /// Whether this loader handles the file.
    fn handles(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.suffixes().iter().any(|s| name.ends_with(s)))
    }

    /// Load every export of the module at `path`.
    async fn load(&self, path: &Path) -> Result<ModuleExports, LoadError>;
}
