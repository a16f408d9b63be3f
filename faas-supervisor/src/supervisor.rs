//! The supervisor state machine.

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::launcher::{EngineInstance, EngineLauncher, EngineProcessHandle, LaunchSpec};
use faas_engine::DeploymentController;
use faas_resolver::Resolver;
use faas_source::{AcquirerOptions, DeploymentMode, SourceAcquirer};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No engine.
    Stopped,
    /// Launched, not yet listening.
    Starting,
    /// Serving.
    Running,
    /// Old engine going down, new source going in.
    Restarting,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
        })
    }
}

struct Engine {
    state: SupervisorState,
    instance: Option<Box<dyn EngineInstance>>,
}

impl Engine {
    fn transition(&mut self, to: SupervisorState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "supervisor state");
            self.state = to;
        }
    }

    /// Drop a dead instance and fall back to stopped.
    fn reap(&mut self) {
        let exited = self.instance.as_mut().and_then(|i| i.poll_exit());
        if let Some(status) = exited {
            warn!(%status, "engine exited unexpectedly");
            self.instance = None;
            self.transition(SupervisorState::Stopped);
        }
    }
}

async fn retire(instance: Option<Box<dyn EngineInstance>>) {
    if let Some(mut instance) = instance {
        if let Err(e) = instance.stop().await {
            warn!(error = %e, "engine did not stop cleanly");
        }
    }
}

/// Owns the engine process and runs authenticated deploys.
///
/// Deploy order: authenticate, take the deploy gate, stage the new source,
/// then stop the old engine, commit, and launch. A failure before the stop
/// leaves the running engine serving.
///
/// The deploy gate serializes lifecycle changes. The engine lock is held
/// only to read or swap state, never across a stop or a launch, so readers
/// such as the proxy see `Restarting` or `Starting` at once.
pub struct Supervisor {
    config: SupervisorConfig,
    controller: DeploymentController,
    launcher: Arc<dyn EngineLauncher>,
    engine: Mutex<Engine>,
}

impl Supervisor {
    /// A stopped supervisor.
    pub fn new(config: SupervisorConfig, launcher: Arc<dyn EngineLauncher>) -> Self {
        let acquirer = SourceAcquirer::with_options(
            config.work_dir.clone(),
            AcquirerOptions {
                install_script: config.install_script.clone(),
                ..AcquirerOptions::default()
            },
        );
        Self {
            controller: DeploymentController::new(acquirer, Resolver::default()),
            config,
            launcher,
            engine: Mutex::new(Engine {
                state: SupervisorState::Stopped,
                instance: None,
            }),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Check a presented application id. An unset id matches nothing.
    pub fn authorize(&self, credential: Option<&str>) -> Result<(), SupervisorError> {
        let expected = self.config.application_id.as_str();
        match credential {
            Some(given) if !expected.is_empty() && given == expected => Ok(()),
            _ => Err(SupervisorError::Unauthorized),
        }
    }

    /// Current state, noticing a crashed engine on the way.
    pub async fn state(&self) -> SupervisorState {
        let mut engine = self.engine.lock().await;
        engine.reap();
        engine.state
    }

    /// Identity of the running engine.
    pub async fn engine_handle(&self) -> Option<EngineProcessHandle> {
        let mut engine = self.engine.lock().await;
        engine.reap();
        engine.instance.as_ref().map(|i| i.handle().clone())
    }

    /// Loopback address of the engine while it is running.
    pub async fn engine_address(&self) -> Option<SocketAddr> {
        (self.state().await == SupervisorState::Running)
            .then(|| SocketAddr::from(([127, 0, 0, 1], self.config.engine_port)))
    }

    /// Authenticate, acquire fresh source and restart the engine on it.
    pub async fn deploy(&self, credential: Option<&str>) -> Result<(), SupervisorError> {
        self.authorize(credential)?;
        self.redeploy().await
    }

    /// Acquire fresh source and restart the engine on it, for callers that
    /// are already trusted (startup).
    pub async fn redeploy(&self) -> Result<(), SupervisorError> {
        let _cycle = self.controller.lock().await;

        let plan = self.config.source.plan(&self.config.work_dir)?;
        info!(mode = %plan.mode(), "deploying");
        let staged = match self.controller.acquirer().stage(&plan).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(error = %e, "acquisition failed, keeping current engine");
                return Err(e.into());
            }
        };

        retire(self.take_instance(SupervisorState::Restarting).await).await;
        let dir = match staged.commit().await {
            Ok(dir) => dir,
            Err(e) => {
                self.engine.lock().await.transition(SupervisorState::Stopped);
                return Err(e.into());
            }
        };
        self.launch(dir).await?;
        info!("functions deployed");
        Ok(())
    }

    /// Start an engine on the committed source if none is running.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _cycle = self.controller.lock().await;
        {
            let mut engine = self.engine.lock().await;
            engine.reap();
            if engine.instance.is_some() {
                return Ok(());
            }
        }
        self.launch(self.committed_dir()).await
    }

    /// Stop and start again on the committed source, without acquiring.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let _cycle = self.controller.lock().await;
        retire(self.take_instance(SupervisorState::Restarting).await).await;
        self.launch(self.committed_dir()).await
    }

    /// Terminate the engine, if any. Waits for a cycle in progress so that
    /// nothing it launches outlives the call.
    pub async fn stop(&self) {
        let _cycle = self.controller.lock().await;
        retire(self.take_instance(SupervisorState::Stopped).await).await;
    }

    async fn take_instance(&self, to: SupervisorState) -> Option<Box<dyn EngineInstance>> {
        let mut engine = self.engine.lock().await;
        engine.transition(to);
        engine.instance.take()
    }

    fn committed_dir(&self) -> PathBuf {
        match (&self.config.source.mode, &self.config.source.functions_dir) {
            (DeploymentMode::Local, Some(dir)) => dir.clone(),
            _ => self.config.work_dir.clone(),
        }
    }

    async fn launch(&self, dir: PathBuf) -> Result<(), SupervisorError> {
        self.engine.lock().await.transition(SupervisorState::Starting);
        let spec = LaunchSpec {
            functions_dir: dir,
            port: self.config.engine_port,
            application_id: self.config.application_id.clone(),
            project_id: self.config.project_id.clone(),
            start_script: self.config.start_script.clone(),
            startup_timeout: self.config.startup_timeout,
        };
        let launched = self.launcher.launch(&spec).await;
        let mut engine = self.engine.lock().await;
        match launched {
            Ok(instance) => {
                engine.instance = Some(instance);
                engine.transition(SupervisorState::Running);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "engine failed to start");
                engine.transition(SupervisorState::Stopped);
                Err(e.into())
            }
        }
    }
}
