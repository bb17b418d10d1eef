use std::time::Duration;

use tracing::info;

use self::sequencer::Sequencer;
use crate::cli::Args;
use crate::config::Config;
use crate::environment::Environment;
use crate::error::DeployError;
use crate::forge_utils::ForgeRunner;
use crate::report::Summary;
use crate::{interactive, serde_utils};

pub mod deployment_context;
pub mod runner;
pub mod sequencer;

pub use self::deployment_context::{
    DeploymentContext, VerificationFailurePolicy,
};

pub async fn run_deployment(args: &Args) -> eyre::Result<Summary> {
    let config = match args.plan.as_ref() {
        Some(plan) => {
            info!("Using plan at {}", plan.display());
            serde_utils::read_deserialize(plan).await?
        }
        None => Config::telepay(),
    };

    let env = Environment::from_process();
    let context = DeploymentContext::from_args(env, config, args);

    let mut runner = ForgeRunner::new();
    if let Some(timeout) = args.timeout {
        runner = runner.with_timeout(Duration::from_secs(timeout));
    }

    let mut sequencer = Sequencer::new(&context, &runner);

    if args.interactive {
        let registry = sequencer.preflight()?;

        if context.verify
            && !registry.has_any_explorer_api_key()
            && !interactive::confirm_without_verification()?
        {
            let step = context
                .config
                .steps
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();

            return Err(DeployError::Cancelled { step }.into());
        }

        sequencer = sequencer.with_confirmation(interactive::confirm_step);
    }

    let summary = sequencer.run().await?;

    serde_utils::write_serialize(&args.report, &summary).await?;
    info!("Report written to {}", args.report.display());

    Ok(summary)
}
