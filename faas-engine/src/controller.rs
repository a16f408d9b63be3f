//! The deploy cycle: acquire, resolve, mount.

use crate::error::EngineError;
use axum::Router;
use faas_mux::{MountReport, mount};
use faas_resolver::{MANIFEST_FILE, Resolution, Resolver};
use faas_source::{SourceAcquirer, SourcePlan};
use faas_surface::{CronScheduler, ServingSurface};
use faas_types::FunctionCatalog;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Where the engine listens and which optional files it uses.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Listening port.
    pub port: u16,
    /// Manifest to read instead of `<source>/bfast.json`.
    pub manifest_path: Option<PathBuf>,
    /// Static files served under `/assets`. Defaults to `<source>/assets`
    /// when that directory exists.
    pub assets_dir: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            port: 3000,
            manifest_path: None,
            assets_dir: None,
        }
    }
}

/// One mounted generation of functions, ready to serve.
pub struct Deployment {
    /// The directory the functions were resolved from.
    pub source_dir: PathBuf,
    /// The resolution that produced the catalog.
    pub resolution: Resolution,
    /// What got mounted.
    pub report: MountReport,
    /// The application.
    pub app: Router,
    /// Running jobs. Shut down when the deployment is retired.
    pub scheduler: Arc<CronScheduler>,
}

impl Deployment {
    /// The merged catalog.
    pub fn catalog(&self) -> &FunctionCatalog {
        &self.resolution.catalog
    }
}

/// Runs deploy cycles one at a time.
///
/// Every cycle holds a single-flight gate from acquisition to the end of
/// mounting, so two cycles never share the working directory and a
/// catalog is mounted only after it is fully resolved. A request that
/// arrives mid-cycle waits, then runs its own cycle.
pub struct DeploymentController {
    acquirer: SourceAcquirer,
    resolver: Resolver,
    gate: Mutex<()>,
}

impl DeploymentController {
    /// Compose an acquirer and a resolver.
    pub fn new(acquirer: SourceAcquirer, resolver: Resolver) -> Self {
        Self {
            acquirer,
            resolver,
            gate: Mutex::new(()),
        }
    }

    /// The acquirer.
    pub fn acquirer(&self) -> &SourceAcquirer {
        &self.acquirer
    }

    /// Take the gate. Hold the guard for the whole of an externally driven
    /// cycle, e.g. a supervisor's stage, restart, commit sequence.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Acquire `plan`, then resolve and mount the result.
    pub async fn deploy(
        &self,
        plan: &SourcePlan,
        options: &EngineOptions,
    ) -> Result<Deployment, EngineError> {
        let _cycle = self.lock().await;
        let source_dir = self.acquirer.acquire(plan).await?;
        self.assemble(source_dir, options).await
    }

    /// Resolve and mount an existing directory.
    pub async fn load(
        &self,
        dir: impl AsRef<Path>,
        options: &EngineOptions,
    ) -> Result<Deployment, EngineError> {
        let _cycle = self.lock().await;
        self.assemble(dir.as_ref().to_path_buf(), options).await
    }

    async fn assemble(
        &self,
        source_dir: PathBuf,
        options: &EngineOptions,
    ) -> Result<Deployment, EngineError> {
        let manifest = options
            .manifest_path
            .clone()
            .unwrap_or_else(|| source_dir.join(MANIFEST_FILE));
        let resolution = self
            .resolver
            .resolve(std::slice::from_ref(&source_dir), manifest)
            .await?;
        for failure in &resolution.failures {
            warn!(path = %failure.path.display(), error = %failure.error, "module skipped");
        }

        let mut serving = ServingSurface::new();
        let report = mount(&resolution.catalog, serving.surface());
        let scheduler = serving.scheduler();

        let assets = match &options.assets_dir {
            Some(dir) => Some(dir.clone()),
            None => {
                let default = source_dir.join("assets");
                tokio::fs::metadata(&default)
                    .await
                    .is_ok_and(|m| m.is_dir())
                    .then_some(default)
            }
        };
        let app = serving.into_router(assets);

        info!(
            dir = %source_dir.display(),
            functions = resolution.catalog.len(),
            mounted = report.mounted(),
            failures = report.failures.len(),
            "deployment ready"
        );
        Ok(Deployment {
            source_dir,
            resolution,
            report,
            app,
            scheduler,
        })
    }
}
