//! StaticModuleLoader: serves canned exports keyed by file name.

use crate::error::LoadError;
use crate::loader::{ModuleExports, ModuleLoader};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// A loader whose modules are registered up front by file name.
///
/// The files must still exist on disk to be discovered; their content is
/// ignored. A file name with no registration loads as an empty module.
pub struct StaticModuleLoader {
    suffixes: Vec<&'static str>,
    modules: HashMap<String, Result<ModuleExports, String>>,
}

impl StaticModuleLoader {
    /// Create a loader for files ending in `suffix`.
    pub fn new(suffix: &'static str) -> Self {
        Self {
            suffixes: vec![suffix],
            modules: HashMap::new(),
        }
    }

    /// Register the exports of `file_name`.
    pub fn with_module(mut self, file_name: &str, exports: ModuleExports) -> Self {
        self.modules.insert(file_name.to_owned(), Ok(exports));
        self
    }

    /// Make `file_name` fail to load with `message`.
    pub fn with_failure(mut self, file_name: &str, message: &str) -> Self {
        self.modules
            .insert(file_name.to_owned(), Err(message.to_owned()));
        self
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    fn suffixes(&self) -> &[&'static str] {
        &self.suffixes
    }

    async fn load(&self, path: &Path) -> Result<ModuleExports, LoadError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match self.modules.get(name) {
            Some(Ok(exports)) => Ok(exports.clone()),
            Some(Err(message)) => Err(LoadError::InvalidModule {
                path: path.display().to_string(),
                message: message.clone(),
            }),
            None => Ok(ModuleExports::new()),
        }
    }
}
