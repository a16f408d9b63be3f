//! Supervisor configuration.

use faas_source::SourceSettings;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the supervisor needs, already read from flags or the
/// environment.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Shared secret for deploys. Empty means no credential is accepted.
    pub application_id: String,
    /// Passed to the engine as `PROJECT_ID`.
    pub project_id: String,
    /// Port the engine listens on, on loopback.
    pub engine_port: u16,
    /// Working directory that acquisition commits into.
    pub work_dir: PathBuf,
    /// Source mode and its parameters.
    pub source: SourceSettings,
    /// Replaces the default dependency install after a clone.
    pub install_script: Option<String>,
    /// Custom command that starts the engine.
    pub start_script: Option<String>,
    /// Check the application id on proxied traffic too.
    pub proxy_requires_auth: bool,
    /// How long the engine gets to start listening.
    pub startup_timeout: Duration,
    /// Deploy once at startup.
    pub auto_start: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            project_id: String::new(),
            engine_port: 3443,
            work_dir: PathBuf::from("functions"),
            source: SourceSettings::default(),
            install_script: None,
            start_script: None,
            proxy_requires_auth: false,
            startup_timeout: Duration::from_secs(30),
            auto_start: true,
        }
    }
}
