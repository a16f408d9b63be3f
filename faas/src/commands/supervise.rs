use super::CommandError;
use crate::cli::SuperviseArgs;
use faas_engine::shutdown_signal;
use faas_supervisor::{ChildProcessLauncher, Supervisor, router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn execute(args: SuperviseArgs) -> Result<(), CommandError> {
    let launcher = Arc::new(ChildProcessLauncher::new()?);
    let supervisor = Arc::new(Supervisor::new(args.config(), launcher));

    if supervisor.config().auto_start {
        if let Err(e) = supervisor.redeploy().await {
            warn!(error = %e, "initial deploy failed, waiting for /deploy");
        }
    }

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "supervisor listening on {addr}");
    axum::serve(listener, router(supervisor.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.stop().await;
    Ok(())
}
