//! The individual fetch steps: clone, download, pack, unpack, install.

use crate::error::AcquisitionError;
use faas_shell::ShellCommand;
use futures_util::StreamExt;
use git2::build::RepoBuilder;
use git2::{Cred, FetchOptions, RemoteCallbacks};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Check that `raw` is an absolute http(s) URL with a host.
pub fn validate_url(raw: &str) -> Result<url::Url, AcquisitionError> {
    let invalid = |reason: &str| AcquisitionError::InvalidUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}

/// Shallow-clone `url` into `into`. Blocking.
pub(crate) fn clone_repo(
    url: &str,
    credentials: Option<(String, String)>,
    into: &Path,
) -> Result<(), git2::Error> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some((username, token)) = credentials {
        let mut offered = false;
        callbacks.credentials(move |_, _, _| {
            if offered {
                return Err(git2::Error::from_str("credentials rejected"));
            }
            offered = true;
            Cred::userpass_plaintext(&username, &token)
        });
    }
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks).depth(1);
    RepoBuilder::new().fetch_options(fetch).clone(url, into)?;
    Ok(())
}

/// Stream `url` into the file at `to`.
pub(crate) async fn download(
    client: &reqwest::Client,
    url: &str,
    to: &Path,
) -> Result<(), AcquisitionError> {
    let failed = |reason: String| AcquisitionError::Download {
        url: url.to_owned(),
        reason,
    };
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("HTTP {status}")));
    }

    let mut file = tokio::fs::File::create(to).await?;
    let mut written = 0usize;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| failed(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    debug!(url, bytes = written, "downloaded archive");
    Ok(())
}

/// `npm pack` a package into `dir` and return the archive path.
pub(crate) async fn pack(
    package: &str,
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<PathBuf, AcquisitionError> {
    let mut command = ShellCommand::new("npm pack \"$FAAS_PACKAGE\"")
        .current_dir(dir)
        .env("FAAS_PACKAGE", package);
    if let Some(limit) = timeout {
        command = command.timeout(limit);
    }
    let output = command.run().await?;
    if let Some(name) = output.stdout.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        let archive = dir.join(name);
        if tokio::fs::try_exists(&archive).await? {
            return Ok(archive);
        }
    }
    find_archive(dir).await?.ok_or(AcquisitionError::EmptyArchive)
}

async fn find_archive(dir: &Path) -> Result<Option<PathBuf>, AcquisitionError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tgz") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Extract `archive` into `dir`, delete it, and lift the contents of a
/// single wrapping directory up one level.
pub(crate) async fn unpack(
    archive: &Path,
    dir: &Path,
    timeout: Option<Duration>,
) -> Result<(), AcquisitionError> {
    let mut command = ShellCommand::new("tar -xzf \"$FAAS_ARCHIVE\"")
        .current_dir(dir)
        .env("FAAS_ARCHIVE", archive.display().to_string());
    if let Some(limit) = timeout {
        command = command.timeout(limit);
    }
    command.run().await?;
    tokio::fs::remove_file(archive).await?;
    flatten(dir).await
}

/// Lift the children of a lone subdirectory of `dir` into `dir`.
pub(crate) async fn flatten(dir: &Path) -> Result<(), AcquisitionError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        children.push(entry);
    }
    let [only] = children.as_slice() else {
        return if children.is_empty() {
            Err(AcquisitionError::EmptyArchive)
        } else {
            Ok(())
        };
    };
    if !only.file_type().await?.is_dir() {
        return Ok(());
    }

    // Move the wrapper aside first so a child with the same name can land.
    let wrapper = dir.join(format!(".unwrap-{}", uuid::Uuid::new_v4()));
    tokio::fs::rename(only.path(), &wrapper).await?;
    let mut inner = tokio::fs::read_dir(&wrapper).await?;
    while let Some(entry) = inner.next_entry().await? {
        tokio::fs::rename(entry.path(), dir.join(entry.file_name())).await?;
    }
    tokio::fs::remove_dir(&wrapper).await?;
    debug!(dir = %dir.display(), "flattened wrapping directory");
    Ok(())
}

/// Install production dependencies in `dir`: the configured script, else
/// `npm install --omit=dev` when a `package.json` is present.
pub(crate) async fn install(
    dir: &Path,
    script: Option<&str>,
    timeout: Option<Duration>,
) -> Result<(), AcquisitionError> {
    let line = match script {
        Some(script) => script.to_owned(),
        None if tokio::fs::try_exists(dir.join("package.json")).await? => {
            "npm install --omit=dev".to_owned()
        }
        None => {
            debug!(dir = %dir.display(), "no package.json, skipping install");
            return Ok(());
        }
    };
    info!(dir = %dir.display(), command = %line, "installing dependencies");
    let mut command = ShellCommand::new(line).current_dir(dir);
    if let Some(limit) = timeout {
        command = command.timeout(limit);
    }
    command.run().await?;
    Ok(())
}
