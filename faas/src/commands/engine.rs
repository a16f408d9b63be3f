use super::CommandError;
use crate::cli::EngineArgs;
use faas_engine::{DeploymentController, run_start_script, shutdown_signal};
use faas_resolver::Resolver;
use faas_source::{SourceAcquirer, SourcePlan};
use tokio::net::TcpListener;

pub async fn execute(args: EngineArgs) -> Result<(), CommandError> {
    let acquirer =
        SourceAcquirer::with_options(&args.source.work_dir, args.source.acquirer_options());
    let controller = DeploymentController::new(acquirer, Resolver::default());

    // An explicit functions directory skips acquisition whatever the mode.
    let plan = match &args.source.functions_dir {
        Some(dir) => SourcePlan::Local { dir: dir.clone() },
        None => args.source.settings().plan(&args.source.work_dir)?,
    };

    if let Some(script) = &args.start_script {
        let dir = controller.acquirer().acquire(&plan).await?;
        run_start_script(script, &dir).await?;
        return Ok(());
    }

    let options = args.options();
    let deployment = controller.deploy(&plan, &options).await?;
    let listener = TcpListener::bind(("0.0.0.0", options.port)).await?;
    deployment.serve(listener, shutdown_signal()).await?;
    Ok(())
}
