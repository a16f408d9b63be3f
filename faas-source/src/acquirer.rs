//! Staging and committing source directories.

use crate::error::AcquisitionError;
use crate::fetch;
use crate::plan::SourcePlan;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs for the external steps of acquisition.
#[derive(Debug, Clone)]
pub struct AcquirerOptions {
    /// `INSTALL_SCRIPT`: replaces the default `npm install --omit=dev`.
    pub install_script: Option<String>,
    /// Upper bound on each external command (install, pack, extract).
    pub shell_timeout: Option<Duration>,
}

impl Default for AcquirerOptions {
    fn default() -> Self {
        Self {
            install_script: None,
            shell_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Fetches function source into a working directory.
///
/// Remote plans are fetched into a sibling staging directory first; the
/// working directory only changes when the caller commits the
/// [`StagedSource`].
pub struct SourceAcquirer {
    work_dir: PathBuf,
    options: AcquirerOptions,
    http: reqwest::Client,
}

impl SourceAcquirer {
    /// Acquire into `work_dir` with default options.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_options(work_dir, AcquirerOptions::default())
    }

    /// Acquire into `work_dir` with explicit options.
    pub fn with_options(work_dir: impl Into<PathBuf>, options: AcquirerOptions) -> Self {
        Self {
            work_dir: work_dir.into(),
            options,
            http: reqwest::Client::new(),
        }
    }

    /// The committed working directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Fetch `plan` without touching the working directory.
    pub async fn stage(&self, plan: &SourcePlan) -> Result<StagedSource, AcquisitionError> {
        if let SourcePlan::Local { dir } = plan {
            debug!(dir = %dir.display(), "local source, nothing to stage");
            return Ok(StagedSource {
                staging: None,
                target: dir.clone(),
            });
        }

        let staging = self.sibling("staging")?;
        tokio::fs::create_dir_all(&staging).await?;
        // Built before fetching so an early return cleans the directory up.
        let staged = StagedSource {
            staging: Some(staging.clone()),
            target: self.work_dir.clone(),
        };
        info!(mode = %plan.mode(), staging = %staging.display(), "acquiring source");

        let timeout = self.options.shell_timeout;
        match plan {
            SourcePlan::Git {
                url,
                username,
                token,
            } => {
                fetch::validate_url(url)?;
                let credentials = username.clone().zip(token.clone());
                let url = url.clone();
                let into = staging.clone();
                tokio::task::spawn_blocking(move || fetch::clone_repo(&url, credentials, &into))
                    .await
                    .map_err(|e| AcquisitionError::Other(Box::new(e)))??;
                fetch::install(&staging, self.options.install_script.as_deref(), timeout).await?;
            }
            SourcePlan::TarballUrl { url } => {
                fetch::validate_url(url)?;
                let archive = staging.join("pack.tgz");
                fetch::download(&self.http, url, &archive).await?;
                fetch::unpack(&archive, &staging, timeout).await?;
            }
            SourcePlan::TarballPackage { package } => {
                let archive = fetch::pack(package, &staging, timeout).await?;
                fetch::unpack(&archive, &staging, timeout).await?;
            }
            SourcePlan::Local { .. } => {}
        }

        Ok(staged)
    }

    /// Stage and commit in one step.
    pub async fn acquire(&self, plan: &SourcePlan) -> Result<PathBuf, AcquisitionError> {
        self.stage(plan).await?.commit().await
    }

    fn sibling(&self, kind: &str) -> Result<PathBuf, AcquisitionError> {
        sibling_of(&self.work_dir, kind)
    }
}

fn sibling_of(target: &Path, kind: &str) -> Result<PathBuf, AcquisitionError> {
    let name = target
        .file_name()
        .ok_or_else(|| {
            AcquisitionError::Other(
                format!("working directory {} has no name", target.display()).into(),
            )
        })?
        .to_string_lossy();
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(".{name}.{kind}-{}", uuid::Uuid::new_v4())))
}

/// Fetched source waiting to replace the working directory.
///
/// Dropping it without [`commit`](Self::commit) deletes the staging copy.
#[derive(Debug)]
pub struct StagedSource {
    staging: Option<PathBuf>,
    target: PathBuf,
}

impl StagedSource {
    /// Where the fetched files are right now.
    pub fn path(&self) -> &Path {
        self.staging.as_deref().unwrap_or(&self.target)
    }

    /// True for local plans, which are served where they are.
    pub fn is_in_place(&self) -> bool {
        self.staging.is_none()
    }

    /// Swap the staged files into the working directory and return it.
    ///
    /// The previous contents are moved aside first and restored if the
    /// swap fails.
    pub async fn commit(mut self) -> Result<PathBuf, AcquisitionError> {
        let Some(staging) = self.staging.clone() else {
            return Ok(self.target.clone());
        };

        let backup = if tokio::fs::try_exists(&self.target).await? {
            let backup = sibling_of(&self.target, "previous")?;
            tokio::fs::rename(&self.target, &backup).await?;
            Some(backup)
        } else {
            if let Some(parent) = self.target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            None
        };

        if let Err(e) = tokio::fs::rename(&staging, &self.target).await {
            if let Some(backup) = &backup {
                if let Err(restore) = tokio::fs::rename(backup, &self.target).await {
                    warn!(error = %restore, backup = %backup.display(), "could not restore previous source");
                }
            }
            return Err(e.into());
        }
        self.staging = None;

        if let Some(backup) = backup {
            if let Err(e) = tokio::fs::remove_dir_all(&backup).await {
                warn!(error = %e, backup = %backup.display(), "could not remove previous source");
            }
        }
        info!(dir = %self.target.display(), "source committed");
        Ok(self.target.clone())
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        if let Some(staging) = self.staging.take() {
            if let Err(e) = std::fs::remove_dir_all(&staging) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, staging = %staging.display(), "could not discard staged source");
                }
            } else {
                debug!(staging = %staging.display(), "discarded staged source");
            }
        }
    }
}
