//! Listening, start scripts and shutdown.

use crate::controller::Deployment;
use crate::error::EngineError;
use faas_shell::ShellCommand;
use std::future::Future;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::info;

impl Deployment {
    /// Serve until `shutdown` resolves, then stop the jobs.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), EngineError> {
        let addr = listener.local_addr()?;
        info!(%addr, "functions engine listening on {addr}");
        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await;
        self.scheduler.shutdown();
        info!(%addr, "functions engine stopped");
        result.map_err(EngineError::from)
    }
}

/// Run a custom start script in `dir` instead of serving in-process.
/// Returns when the script exits.
pub async fn run_start_script(script: &str, dir: &Path) -> Result<(), EngineError> {
    info!(dir = %dir.display(), script, "running start script");
    ShellCommand::new(script).current_dir(dir).run().await?;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}
