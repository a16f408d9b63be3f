//! Command-line and environment configuration.

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use faas_engine::EngineOptions;
use faas_source::{AcquirerOptions, DeploymentMode, SourceSettings};
use faas_supervisor::SupervisorConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "faas",
    version,
    about = "Serve a directory of function descriptors, or supervise and redeploy it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire, resolve and mount functions, then serve them in this process
    Engine(EngineArgs),
    /// Run the engine as a child process behind an authenticated deploy endpoint
    Supervise(SuperviseArgs),
}

/// Where function source comes from.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Deployment mode: git, npm, url or local
    #[arg(long, env = "MODE", default_value_t = DeploymentMode::Git)]
    pub mode: DeploymentMode,
    /// Repository to clone in git mode
    #[arg(long, env = "GIT_CLONE_URL")]
    pub git_clone_url: Option<String>,
    /// Username for the clone
    #[arg(long, env = "GIT_USERNAME")]
    pub git_username: Option<String>,
    /// Token or password for the clone
    #[arg(long, env = "GIT_TOKEN", hide_env_values = true)]
    pub git_token: Option<String>,
    /// Package to `npm pack` in npm mode
    #[arg(long, env = "NPM_TAR")]
    pub npm_tar: Option<String>,
    /// Tarball to download in url mode
    #[arg(long, env = "URL_TAR")]
    pub url_tar: Option<String>,
    /// Directory of functions; in local mode, served in place
    #[arg(long, env = "FUNCTIONS_DIR")]
    pub functions_dir: Option<PathBuf>,
    /// Working directory remote modes acquire into
    #[arg(long, env = "WORK_DIR", default_value = "functions")]
    pub work_dir: PathBuf,
    /// Replaces `npm install --omit=dev` after a clone
    #[arg(long, env = "INSTALL_SCRIPT")]
    pub install_script: Option<String>,
}

impl SourceArgs {
    pub fn settings(&self) -> SourceSettings {
        SourceSettings {
            mode: self.mode,
            git_clone_url: self.git_clone_url.clone(),
            git_username: self.git_username.clone(),
            git_token: self.git_token.clone(),
            npm_tar: self.npm_tar.clone(),
            url_tar: self.url_tar.clone(),
            functions_dir: self.functions_dir.clone(),
        }
    }

    pub fn acquirer_options(&self) -> AcquirerOptions {
        AcquirerOptions {
            install_script: self.install_script.clone(),
            ..AcquirerOptions::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Manifest path, instead of `bfast.json` in the functions directory
    #[arg(long, env = "BFAST_JSON_PATH")]
    pub manifest: Option<PathBuf>,
    /// Static files served under /assets
    #[arg(long, env = "ASSETS_DIR")]
    pub assets_dir: Option<PathBuf>,
    /// Run this in the functions directory instead of serving in-process
    #[arg(long, env = "START_SCRIPT")]
    pub start_script: Option<String>,
}

impl EngineArgs {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            port: self.port,
            manifest_path: self.manifest.clone(),
            assets_dir: self.assets_dir.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct SuperviseArgs {
    /// Port the supervisor listens on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    /// Loopback port the engine listens on
    #[arg(long, env = "ENGINE_PORT", default_value_t = 3443)]
    pub engine_port: u16,
    /// Shared secret required by /deploy
    #[arg(long, env = "APPLICATION_ID", default_value = "", hide_env_values = true)]
    pub application_id: String,
    /// Passed to the engine
    #[arg(long, env = "PROJECT_ID", default_value = "")]
    pub project_id: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Start the engine with this command instead of `faas engine`
    #[arg(long, env = "START_SCRIPT")]
    pub start_script: Option<String>,
    /// Require the application id on proxied traffic too
    #[arg(long, env = "PROXY_REQUIRES_AUTH", value_parser = FalseyValueParser::new())]
    pub proxy_requires_auth: bool,
    /// Milliseconds the engine gets to start listening
    #[arg(long, env = "ENGINE_STARTUP_TIMEOUT_MS", default_value_t = 30_000)]
    pub startup_timeout_ms: u64,
    /// Wait for the first /deploy instead of deploying at startup
    #[arg(long = "no-auto-start", action = ArgAction::SetFalse)]
    pub auto_start: bool,
}

impl SuperviseArgs {
    pub fn config(&self) -> SupervisorConfig {
        SupervisorConfig {
            application_id: self.application_id.clone(),
            project_id: self.project_id.clone(),
            engine_port: self.engine_port,
            work_dir: self.source.work_dir.clone(),
            source: self.source.settings(),
            install_script: self.source.install_script.clone(),
            start_script: self.start_script.clone(),
            proxy_requires_auth: self.proxy_requires_auth,
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
            auto_start: self.auto_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("faas").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn arguments_are_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn engine_flags_map_to_options() {
        let Command::Engine(args) = parse(&[
            "engine",
            "--port",
            "4000",
            "--mode",
            "local",
            "--functions-dir",
            "/srv/fns",
        ]) else {
            panic!("expected engine");
        };
        assert_eq!(args.options().port, 4000);
        let settings = args.source.settings();
        assert_eq!(settings.mode, DeploymentMode::Local);
        assert_eq!(settings.functions_dir, Some(PathBuf::from("/srv/fns")));
    }

    #[test]
    fn supervise_defaults() {
        let Command::Supervise(args) = parse(&["supervise", "--mode", "url"]) else {
            panic!("expected supervise");
        };
        let config = args.config();
        assert_eq!(config.engine_port, 3443);
        assert!(config.auto_start);
        assert!(!config.proxy_requires_auth);
        assert_eq!(config.startup_timeout, Duration::from_secs(30));
        assert_eq!(config.source.mode, DeploymentMode::Url);
    }

    #[test]
    fn auto_start_can_be_disabled() {
        let Command::Supervise(args) = parse(&["supervise", "--no-auto-start"]) else {
            panic!("expected supervise");
        };
        assert!(!args.config().auto_start);
    }
}
