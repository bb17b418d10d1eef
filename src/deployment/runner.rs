use tracing::{info, instrument, warn};

use super::DeploymentContext;
use crate::address_store::AddressStore;
use crate::config::DeploymentStep;
use crate::forge_utils::{RunResult, ToolRunner};
use crate::network::NetworkConfig;

/// Results of the subprocess calls made for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRun {
    pub deployment: RunResult,
    pub verification: Option<RunResult>,
}

impl StepRun {
    /// The result that decides the step, a failed verification overrides a
    /// successful deployment.
    pub fn result(&self) -> &RunResult {
        match &self.verification {
            Some(verification) if self.deployment.success() => verification,
            _ => &self.deployment,
        }
    }

    pub fn verification_failed(&self) -> bool {
        self.verification
            .as_ref()
            .is_some_and(|verification| !verification.success())
    }
}

/// Deploys `step` and, when the network has an explorer API key, verifies the
/// broadcast in a second forge call.
#[instrument(skip_all, fields(step = %step))]
pub async fn run_step(
    context: &DeploymentContext,
    step: &DeploymentStep,
    network: &NetworkConfig,
    store: &AddressStore,
    runner: &impl ToolRunner,
) -> eyre::Result<StepRun> {
    info!("Deploying to {}", network.name);

    let deployment = context
        .forge_script(step, network, store)
        .run(runner)
        .await?;

    if !deployment.success() {
        return Ok(StepRun {
            deployment,
            verification: None,
        });
    }

    let Some(api_key) = context.verification_api_key(network) else {
        warn!("Skipping verification: no API key for {}", network.name);

        return Ok(StepRun {
            deployment,
            verification: None,
        });
    };

    info!("Verifying {} on {}", step.kind, network.name);

    let verification = context
        .forge_script(step, network, store)
        .resume()
        .with_etherscan_api_key(api_key)
        .with_verifier_url(&network.verifier_url)
        .run(runner)
        .await?;

    if verification.success() {
        info!("{} verified successfully", step.kind);
    } else {
        warn!("Verification failed: {}", verification.stderr.trim());
    }

    Ok(StepRun {
        deployment,
        verification: Some(verification),
    })
}
