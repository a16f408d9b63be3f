//! The resolver: discovery, loading and merge.

use crate::builtins;
use crate::discovery::discover;
use crate::error::ResolutionError;
use crate::loaders::{JsonModuleLoader, TomlModuleLoader, YamlModuleLoader};
use crate::manifest::IgnoreRules;
use faas_types::{ExportValue, FunctionCatalog, LoadError, ModuleExports, ModuleLoader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options applied to every handler the built-in loaders create.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Timeout for command handlers that do not declare `timeoutMs`.
    /// `None` lets them run unbounded.
    pub handler_timeout: Option<Duration>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            handler_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// A module file that failed to load. Its exports are absent from the catalog.
#[derive(Debug)]
pub struct LoadFailure {
    /// The file.
    pub path: PathBuf,
    /// Why it failed.
    pub error: LoadError,
}

/// The outcome of one resolution pass.
#[derive(Debug)]
pub struct Resolution {
    /// The merged catalog, reserved entries included.
    pub catalog: FunctionCatalog,
    /// Files loaded successfully, in discovery order.
    pub loaded: Vec<PathBuf>,
    /// Files that failed to load.
    pub failures: Vec<LoadFailure>,
}

/// Discovers, loads and merges module files.
///
/// Loaders are tried in registration order; the first whose
/// [`handles`](ModuleLoader::handles) accepts a file loads it.
pub struct Resolver {
    loaders: Vec<Arc<dyn ModuleLoader>>,
}

impl Resolver {
    /// A resolver with no loaders.
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// A resolver with the JSON, TOML and YAML loaders.
    pub fn with_options(options: ResolverOptions) -> Self {
        Self::new()
            .with_loader(Arc::new(JsonModuleLoader::new(options.clone())))
            .with_loader(Arc::new(TomlModuleLoader::new(options.clone())))
            .with_loader(Arc::new(YamlModuleLoader::new(options)))
    }

    /// Add a loader after the existing ones.
    pub fn add_loader(&mut self, loader: Arc<dyn ModuleLoader>) {
        self.loaders.push(loader);
    }

    /// Builder form of [`add_loader`](Self::add_loader).
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.add_loader(loader);
        self
    }

    fn loader_for(&self, path: &Path) -> Option<Arc<dyn ModuleLoader>> {
        self.loaders.iter().find(|l| l.handles(path)).cloned()
    }

    /// Resolve `dirs` into a catalog, reading ignore rules from `manifest`.
    ///
    /// Relative paths are taken against the process working directory.
    /// Directories are scanned in the order given.
    pub async fn resolve<P: AsRef<Path>>(
        &self,
        dirs: &[P],
        manifest: impl AsRef<Path>,
    ) -> Result<Resolution, ResolutionError> {
        let manifest = std::path::absolute(manifest.as_ref())?;
        let ignore = IgnoreRules::from_manifest(&manifest).await;

        let mut files = Vec::new();
        for dir in dirs {
            let root = std::path::absolute(dir.as_ref())?;
            let is_dir = tokio::fs::metadata(&root)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(ResolutionError::DirectoryNotFound(root));
            }
            let (ignore, manifest, loaders) =
                (ignore.clone(), manifest.clone(), self.loaders.clone());
            let found =
                tokio::task::spawn_blocking(move || discover(&root, &ignore, &manifest, &loaders))
                    .await
                    .map_err(|e| ResolutionError::Discovery(e.to_string()))?;
            files.extend(found);
        }

        let mut catalog = FunctionCatalog::new();
        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for path in files {
            match self.load_contained(&path).await {
                Ok(exports) => {
                    merge(&mut catalog, &path, exports);
                    loaded.push(path);
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "failed to load module, skipping");
                    failures.push(LoadFailure { path, error });
                }
            }
        }

        builtins::install(&mut catalog);
        info!(
            functions = catalog.len(),
            files = loaded.len(),
            failures = failures.len(),
            "resolved function catalog"
        );
        Ok(Resolution {
            catalog,
            loaded,
            failures,
        })
    }

    /// Load one file in its own task, so a panicking loader only costs
    /// this file.
    async fn load_contained(&self, path: &Path) -> Result<ModuleExports, LoadError> {
        let Some(loader) = self.loader_for(path) else {
            return Err(LoadError::InvalidModule {
                path: path.display().to_string(),
                message: "no loader handles this file".into(),
            });
        };
        let owned = path.to_path_buf();
        tokio::spawn(async move { loader.load(&owned).await })
            .await
            .map_err(|e| LoadError::Crashed(e.to_string()))?
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::with_options(ResolverOptions::default())
    }
}

fn merge(catalog: &mut FunctionCatalog, path: &Path, exports: ModuleExports) {
    for (name, value) in exports {
        match value {
            ExportValue::Descriptor(descriptor) => {
                if catalog.insert(name.clone(), descriptor).is_some() {
                    debug!(function = %name, path = %path.display(), "export overrides an earlier definition");
                }
            }
            ExportValue::Function | ExportValue::Primitive(_) => {
                debug!(export = %name, path = %path.display(), "skipping non-object export");
            }
        }
    }
}
