//! Deployment modes and the plans they produce.

use crate::error::AcquisitionError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Where function source comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Clone a git repository.
    #[default]
    Git,
    /// `npm pack` a published package.
    Npm,
    /// Download a tarball.
    Url,
    /// Use a directory already on disk.
    Local,
}

/// An unrecognized mode name.
#[derive(Debug, Error)]
#[error("unknown deployment mode {0:?}, expected git, npm, url or local")]
pub struct ParseModeError(pub String);

impl FromStr for DeploymentMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "npm" => Ok(Self::Npm),
            "url" => Ok(Self::Url),
            "local" => Ok(Self::Local),
            _ => Err(ParseModeError(s.to_owned())),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Git => "git",
            Self::Npm => "npm",
            Self::Url => "url",
            Self::Local => "local",
        })
    }
}

/// One concrete acquisition.
#[derive(Clone, PartialEq, Eq)]
pub enum SourcePlan {
    /// Shallow clone, with plaintext credentials when both are set.
    Git {
        /// http(s) clone URL.
        url: String,
        /// Username.
        username: Option<String>,
        /// Token or password.
        token: Option<String>,
    },
    /// Download and unpack a `.tgz`.
    TarballUrl {
        /// http(s) URL.
        url: String,
    },
    /// `npm pack` a package spec and unpack it.
    TarballPackage {
        /// Anything `npm pack` accepts.
        package: String,
    },
    /// Serve a directory as-is.
    Local {
        /// The directory.
        dir: PathBuf,
    },
}

impl SourcePlan {
    /// The mode this plan belongs to.
    pub fn mode(&self) -> DeploymentMode {
        match self {
            Self::Git { .. } => DeploymentMode::Git,
            Self::TarballUrl { .. } => DeploymentMode::Url,
            Self::TarballPackage { .. } => DeploymentMode::Npm,
            Self::Local { .. } => DeploymentMode::Local,
        }
    }
}

impl fmt::Debug for SourcePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git { url, username, token } => f
                .debug_struct("Git")
                .field("url", url)
                .field("username", username)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::TarballUrl { url } => f.debug_struct("TarballUrl").field("url", url).finish(),
            Self::TarballPackage { package } => f
                .debug_struct("TarballPackage")
                .field("package", package)
                .finish(),
            Self::Local { dir } => f.debug_struct("Local").field("dir", dir).finish(),
        }
    }
}

/// Source settings as configured, before a mode is turned into a plan.
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    /// Selected mode.
    pub mode: DeploymentMode,
    /// `GIT_CLONE_URL`.
    pub git_clone_url: Option<String>,
    /// `GIT_USERNAME`.
    pub git_username: Option<String>,
    /// `GIT_TOKEN`.
    pub git_token: Option<String>,
    /// `NPM_TAR`: package spec for `npm pack`.
    pub npm_tar: Option<String>,
    /// `URL_TAR`: tarball URL.
    pub url_tar: Option<String>,
    /// `FUNCTIONS_DIR`: directory for local mode.
    pub functions_dir: Option<PathBuf>,
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, AcquisitionError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(AcquisitionError::MissingParameter(name))
}

impl SourceSettings {
    /// Turn the settings into a plan. Local mode falls back to `work_dir`
    /// when no functions directory is set.
    pub fn plan(&self, work_dir: &Path) -> Result<SourcePlan, AcquisitionError> {
        Ok(match self.mode {
            DeploymentMode::Git => SourcePlan::Git {
                url: required(&self.git_clone_url, "GIT_CLONE_URL")?,
                username: self.git_username.clone().filter(|v| !v.is_empty()),
                token: self.git_token.clone().filter(|v| !v.is_empty()),
            },
            DeploymentMode::Npm => SourcePlan::TarballPackage {
                package: required(&self.npm_tar, "NPM_TAR")?,
            },
            DeploymentMode::Url => SourcePlan::TarballUrl {
                url: required(&self.url_tar, "URL_TAR")?,
            },
            DeploymentMode::Local => SourcePlan::Local {
                dir: self
                    .functions_dir
                    .clone()
                    .unwrap_or_else(|| work_dir.to_path_buf()),
            },
        })
    }
}
