use indicatif::ProgressStyle;
use tracing::{error, info, instrument, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::deployment_context::VerificationFailurePolicy;
use super::runner::run_step;
use super::DeploymentContext;
use crate::address_store::{AddressStore, DeployedAddress};
use crate::config::DeploymentStep;
use crate::error::DeployError;
use crate::extract::{extract_address, marker};
use crate::forge_utils::ToolRunner;
use crate::network::NetworkRegistry;
use crate::report::Summary;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SequencerState {
    #[display(fmt = "not started")]
    NotStarted,
    #[display(fmt = "running step {}", step_index)]
    Running { step_index: usize },
    #[display(fmt = "completed")]
    Completed,
    #[display(fmt = "aborted: {}", reason)]
    Aborted { reason: DeployError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success { address: Option<DeployedAddress> },
    Failure(DeployError),
}

type Confirm<'a> = Box<dyn FnMut(&DeploymentStep) -> eyre::Result<bool> + 'a>;

/// Runs the configured steps in order, stopping at the first failure.
pub struct Sequencer<'a, R> {
    context: &'a DeploymentContext,
    runner: &'a R,
    registry: Option<NetworkRegistry>,
    store: AddressStore,
    state: SequencerState,
    confirm: Option<Confirm<'a>>,
}

impl<'a, R: ToolRunner> Sequencer<'a, R> {
    pub fn new(context: &'a DeploymentContext, runner: &'a R) -> Self {
        Self {
            context,
            runner,
            registry: None,
            store: AddressStore::new(),
            state: SequencerState::NotStarted,
            confirm: None,
        }
    }

    /// Asks `confirm` before every step after the first, a `false` cancels
    /// the run.
    pub fn with_confirmation(
        mut self,
        confirm: impl FnMut(&DeploymentStep) -> eyre::Result<bool> + 'a,
    ) -> Self {
        self.confirm = Some(Box::new(confirm));
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    #[cfg(test)]
    pub fn store(&self) -> &AddressStore {
        &self.store
    }

    /// Validates the plan and builds the network registry.
    pub fn preflight(&mut self) -> Result<&NetworkRegistry, DeployError> {
        let registry = match self.registry.take() {
            Some(registry) => registry,
            None => {
                let config = &self.context.config;

                let registry = config.validate().and_then(|()| {
                    NetworkRegistry::from_env(&self.context.env, config)
                });

                match registry {
                    Ok(registry) => registry,
                    Err(reason) => {
                        error!("Pre-flight check failed: {reason}");
                        self.state = SequencerState::Aborted {
                            reason: reason.clone(),
                        };
                        return Err(reason);
                    }
                }
            }
        };

        Ok(self.registry.insert(registry))
    }

    #[instrument(name = "deployment", skip_all)]
    pub async fn run(&mut self) -> eyre::Result<Summary> {
        if self.state != SequencerState::NotStarted {
            eyre::bail!("Deployment has already run ({})", self.state);
        }

        let registry = self.preflight()?.clone();

        let context = self.context;
        let steps = &context.config.steps;

        let span = Span::current();
        span.pb_set_style(&ProgressStyle::with_template(
            "{spinner} {wide_msg} [{pos}/{len}]",
        )?);
        span.pb_set_length(steps.len() as u64);

        for (step_index, step) in steps.iter().enumerate() {
            self.state = SequencerState::Running { step_index };
            span.pb_set_message(&step.to_string());

            info!("Step {}/{}: deploying {step}", step_index + 1, steps.len());

            if step_index > 0 {
                if let Err(reason) = self.confirm_step(step) {
                    return Err(self.abort(reason).into());
                }
            }

            match self.execute(&registry, step).await {
                StepOutcome::Success { address } => {
                    if let Some(address) = address {
                        info!("{} deployed at: {}", step.kind, address.address);
                    }
                }
                StepOutcome::Failure(reason) => {
                    return Err(self.abort(reason).into());
                }
            }

            span.pb_inc(1);
        }

        self.state = SequencerState::Completed;
        info!("Deployment sequence completed successfully");

        Ok(Summary::new(&registry, &self.store))
    }

    fn abort(&mut self, reason: DeployError) -> DeployError {
        error!("Deployment aborted: {reason}");

        self.state = SequencerState::Aborted {
            reason: reason.clone(),
        };

        reason
    }

    fn confirm_step(&mut self, step: &DeploymentStep) -> Result<(), DeployError> {
        let Some(confirm) = self.confirm.as_mut() else {
            return Ok(());
        };

        match confirm(step) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeployError::Cancelled {
                step: step.to_string(),
            }),
            Err(err) => Err(DeployError::ConfirmationFailure {
                step: step.to_string(),
                message: format!("{err:#}"),
            }),
        }
    }

    /// Runs one step and records its address.
    pub async fn execute(
        &mut self,
        registry: &NetworkRegistry,
        step: &DeploymentStep,
    ) -> StepOutcome {
        let context = self.context;

        let network = match registry.get(step.network) {
            Ok(network) => network,
            Err(reason) => return StepOutcome::Failure(reason),
        };

        let step_run =
            match run_step(context, step, network, &self.store, self.runner).await
            {
                Ok(step_run) => step_run,
                Err(err) => {
                    return StepOutcome::Failure(DeployError::ProcessFailure {
                        step: step.to_string(),
                        exit_code: -1,
                        stderr: format!("{err:#}"),
                    })
                }
            };

        if !step_run.deployment.success() {
            error!("Deployment failed: {}", step_run.deployment.stderr.trim());

            return StepOutcome::Failure(DeployError::ProcessFailure {
                step: step.to_string(),
                exit_code: step_run.deployment.exit_code,
                stderr: step_run.deployment.stderr,
            });
        }

        let verification_failure = step_run.verification_failed().then(|| {
            let result = step_run.result();

            DeployError::VerificationFailure {
                step: step.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr.clone(),
            }
        });

        let keep_address = verification_failure.is_none()
            || context.on_verification_failure == VerificationFailurePolicy::Keep;

        let key = step.address_key();

        let address = match extract_address(&step_run.deployment.stdout, &step.kind)
        {
            Some(address) if keep_address => {
                let deployed =
                    self.store.record(&key, step.network, address).clone();

                if let Err(err) = self.store.persist(&context.env_file) {
                    return StepOutcome::Failure(DeployError::PersistFailure {
                        key,
                        path: context.env_file.display().to_string(),
                        message: format!("{err:#}"),
                    });
                }

                Some(deployed)
            }
            Some(address) => {
                warn!("Discarding {key}={address} after failed verification");
                None
            }
            None => {
                let marker = marker(&step.kind);
                warn!("No line containing {marker:?} in the output of {step}");

                if context.strict_extraction && verification_failure.is_none() {
                    return StepOutcome::Failure(DeployError::ExtractionMiss {
                        step: step.to_string(),
                        marker: marker.into_owned(),
                    });
                }

                None
            }
        };

        match verification_failure {
            Some(reason) => StepOutcome::Failure(reason),
            None => StepOutcome::Success { address },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use maplit::btreemap;
    use tempfile::TempDir;

    use super::*;
    use crate::config::{Config, DeploymentStep};
    use crate::environment::Environment;
    use crate::forge_utils::{Invocation, RunResult};
    use crate::network::tests::full_env;
    use crate::types::{ContractKind, NetworkId};

    type Handler = Box<dyn Fn(&Invocation) -> eyre::Result<RunResult>>;

    /// Answers forge calls from a closure and remembers every call.
    struct FakeForge {
        handler: Handler,
        calls: RefCell<Vec<Invocation>>,
    }

    impl FakeForge {
        fn new(
            handler: impl Fn(&Invocation) -> eyre::Result<RunResult> + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                calls: RefCell::new(vec![]),
            }
        }

        fn calls_to(&self, network: NetworkId) -> Vec<Invocation> {
            self.calls
                .borrow()
                .iter()
                .filter(|call| network_of(call) == network)
                .cloned()
                .collect()
        }
    }

    impl ToolRunner for FakeForge {
        async fn run(&self, invocation: &Invocation) -> eyre::Result<RunResult> {
            self.calls.borrow_mut().push(invocation.clone());
            (self.handler)(invocation)
        }
    }

    fn network_of(invocation: &Invocation) -> NetworkId {
        let rpc_url = invocation.arg_value("--rpc-url").unwrap_or_default();

        [
            NetworkId::BaseSepolia,
            NetworkId::EthSepolia,
            NetworkId::ArbitrumSepolia,
        ]
        .into_iter()
        .find(|id| rpc_url.contains(&id.to_string()))
        .unwrap()
    }

    fn ok(stdout: &str) -> eyre::Result<RunResult> {
        Ok(RunResult {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn fail(exit_code: i32, stderr: &str) -> eyre::Result<RunResult> {
        Ok(RunResult {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    fn is_verification(invocation: &Invocation) -> bool {
        invocation.has_arg("--verify")
    }

    /// Deploys the euler vault first so later steps can consume its address.
    fn euler_config() -> Config {
        Config {
            steps: vec![
                DeploymentStep::new(
                    "script/EulerVault.s.sol",
                    NetworkId::EthSepolia,
                    ContractKind::EulerVault,
                ),
                DeploymentStep::new(
                    "script/Telepay.s.sol",
                    NetworkId::BaseSepolia,
                    ContractKind::Telepay,
                ),
                DeploymentStep::new(
                    "script/Router.s.sol",
                    NetworkId::ArbitrumSepolia,
                    ContractKind::Router,
                ),
            ],
            required_env: vec![],
        }
    }

    fn context(dir: &TempDir, env: Environment, config: Config) -> DeploymentContext {
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "PRIVATE_KEY=0xabc\n").unwrap();

        DeploymentContext::new(env, config, env_file)
    }

    fn env_file(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    fn all_succeed(invocation: &Invocation) -> eyre::Result<RunResult> {
        if is_verification(invocation) {
            return ok("Contract successfully verified");
        }

        match network_of(invocation) {
            NetworkId::EthSepolia => ok("  EulerVault deployed at: 0xE1\n"),
            NetworkId::BaseSepolia => ok("  Base Telepay deployed at: 0xB1\n"),
            NetworkId::ArbitrumSepolia => {
                ok("  Arbitrum Router deployed at: 0xA1\n")
            }
        }
    }

    #[tokio::test]
    async fn failure_aborts_before_later_steps() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), euler_config());

        let forge = FakeForge::new(|invocation| match network_of(invocation) {
            NetworkId::BaseSepolia => fail(1, "Error: script failed: revert"),
            _ => all_succeed(invocation),
        });

        let mut sequencer = Sequencer::new(&context, &forge);
        let err = sequencer.run().await.unwrap_err();

        let reason = err.downcast_ref::<DeployError>().unwrap();
        assert!(matches!(
            reason,
            DeployError::ProcessFailure { exit_code: 1, stderr, .. }
                if stderr.contains("revert")
        ));
        assert_eq!(
            sequencer.state(),
            &SequencerState::Aborted {
                reason: reason.clone()
            }
        );

        // The second step saw the first step's address
        let base_calls = forge.calls_to(NetworkId::BaseSepolia);
        assert_eq!(base_calls.len(), 1);
        assert_eq!(
            base_calls[0]
                .env
                .get("ETH_EULER_VAULT_ADDRESS")
                .map(String::as_str),
            Some("0xE1")
        );

        assert!(forge.calls_to(NetworkId::ArbitrumSepolia).is_empty());

        assert_eq!(sequencer.store().get("ETH_EULER_VAULT_ADDRESS"), Some("0xE1"));
        assert_eq!(sequencer.store().get("BASE_TELEPAY_ADDRESS"), None);
        assert_eq!(sequencer.store().get("ARBITRUM_ROUTER_ADDRESS"), None);

        assert_eq!(
            env_file(&context.env_file),
            "PRIVATE_KEY=0xabc\nETH_EULER_VAULT_ADDRESS=0xE1\n"
        );

        Ok(())
    }

    #[tokio::test]
    async fn network_without_api_key_skips_verification() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut env = full_env();
        env.0.remove("ARBISCAN_API_KEY");
        let context = context(&dir, env, euler_config());

        let forge = FakeForge::new(all_succeed);

        let mut sequencer = Sequencer::new(&context, &forge);
        let summary = sequencer.run().await?;

        assert_eq!(sequencer.state(), &SequencerState::Completed);

        let arbitrum_calls = forge.calls_to(NetworkId::ArbitrumSepolia);
        assert_eq!(arbitrum_calls.len(), 1);
        assert!(!is_verification(&arbitrum_calls[0]));

        let eth_calls = forge.calls_to(NetworkId::EthSepolia);
        assert_eq!(eth_calls.len(), 2);
        assert!(eth_calls[1].has_arg("--resume"));
        assert_eq!(
            eth_calls[1].arg_value("--etherscan-api-key"),
            Some("eth_sepolia-key")
        );
        assert_eq!(
            eth_calls[1].arg_value("--verifier-url"),
            Some("https://api-sepolia.etherscan.io/api")
        );

        assert_eq!(
            summary.address(NetworkId::ArbitrumSepolia, "ARBITRUM_ROUTER_ADDRESS"),
            Some("0xA1")
        );
        assert_eq!(
            summary.address(NetworkId::BaseSepolia, "BASE_TELEPAY_ADDRESS"),
            Some("0xB1")
        );

        // Each step sees every address recorded before it
        assert_eq!(
            arbitrum_calls[0].env,
            btreemap! {
                "ETH_EULER_VAULT_ADDRESS".to_string() => "0xE1".to_string(),
                "BASE_TELEPAY_ADDRESS".to_string() => "0xB1".to_string(),
            }
        );

        assert_eq!(
            env_file(&context.env_file),
            "PRIVATE_KEY=0xabc\n\
             ETH_EULER_VAULT_ADDRESS=0xE1\n\
             BASE_TELEPAY_ADDRESS=0xB1\n\
             ARBITRUM_ROUTER_ADDRESS=0xA1\n"
        );

        Ok(())
    }

    #[tokio::test]
    async fn deploy_invocation_arguments() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut context = context(&dir, full_env(), Config::telepay());
        context.verify = false;

        let forge = FakeForge::new(all_succeed);

        Sequencer::new(&context, &forge).run().await?;

        let calls = forge.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0].args,
            vec![
                "script",
                "script/Telepay.s.sol",
                "--rpc-url",
                "https://rpc.example/base_sepolia",
                "--broadcast",
                "-vvv"
            ]
        );
        assert!(calls.iter().all(|call| !is_verification(call)));

        Ok(())
    }

    fn telepay_verification_fails(invocation: &Invocation) -> eyre::Result<RunResult> {
        if is_verification(invocation)
            && network_of(invocation) == NetworkId::BaseSepolia
        {
            return fail(1, "Etherscan API rate limit");
        }

        all_succeed(invocation)
    }

    #[tokio::test]
    async fn verification_failure_keeps_address() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), euler_config());

        let forge = FakeForge::new(telepay_verification_fails);

        let mut sequencer = Sequencer::new(&context, &forge);
        let err = sequencer.run().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::VerificationFailure { exit_code: 1, .. })
        ));
        assert!(matches!(
            sequencer.state(),
            SequencerState::Aborted {
                reason: DeployError::VerificationFailure { .. }
            }
        ));

        assert_eq!(sequencer.store().get("BASE_TELEPAY_ADDRESS"), Some("0xB1"));
        assert!(env_file(&context.env_file).contains("BASE_TELEPAY_ADDRESS=0xB1\n"));
        assert!(forge.calls_to(NetworkId::ArbitrumSepolia).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn verification_failure_discards_address() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut context = context(&dir, full_env(), euler_config());
        context.on_verification_failure = VerificationFailurePolicy::Discard;

        let forge = FakeForge::new(telepay_verification_fails);

        let mut sequencer = Sequencer::new(&context, &forge);
        let err = sequencer.run().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::VerificationFailure { .. })
        ));

        assert_eq!(sequencer.store().get("BASE_TELEPAY_ADDRESS"), None);
        assert_eq!(sequencer.store().get("ETH_EULER_VAULT_ADDRESS"), Some("0xE1"));
        assert!(!env_file(&context.env_file).contains("BASE_TELEPAY_ADDRESS"));

        Ok(())
    }

    #[tokio::test]
    async fn missing_configuration_runs_nothing() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut env = full_env();
        env.0.remove("PRIVATE_KEY");
        env.0.remove("BASE_SEPOLIA_RPC_URL");
        let context = context(&dir, env, euler_config());

        let forge = FakeForge::new(all_succeed);

        let mut sequencer = Sequencer::new(&context, &forge);
        let err = sequencer.run().await.unwrap_err();

        let expected = DeployError::MissingConfiguration {
            missing: vec![
                "BASE_SEPOLIA_RPC_URL".to_string(),
                "PRIVATE_KEY".to_string(),
            ],
        };

        assert_eq!(err.downcast_ref::<DeployError>(), Some(&expected));
        assert_eq!(
            sequencer.state(),
            &SequencerState::Aborted { reason: expected }
        );
        assert!(forge.calls.borrow().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn full_configuration_passes_preflight() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), euler_config());
        let forge = FakeForge::new(all_succeed);

        let mut sequencer = Sequencer::new(&context, &forge);

        assert_eq!(sequencer.state(), &SequencerState::NotStarted);
        assert_eq!(sequencer.preflight()?.iter().count(), 3);

        sequencer.run().await?;
        assert_eq!(sequencer.state(), &SequencerState::Completed);

        // A finished sequencer does not run again
        assert!(sequencer.run().await.is_err());
        assert_eq!(forge.calls.borrow().len(), 6);

        Ok(())
    }

    fn router_prints_nothing(invocation: &Invocation) -> eyre::Result<RunResult> {
        if network_of(invocation) == NetworkId::ArbitrumSepolia {
            return ok("Script ran successfully.");
        }

        all_succeed(invocation)
    }

    #[tokio::test]
    async fn extraction_miss_is_tolerated() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), Config::telepay());
        let forge = FakeForge::new(router_prints_nothing);

        let mut sequencer = Sequencer::new(&context, &forge);
        let summary = sequencer.run().await?;

        assert_eq!(sequencer.state(), &SequencerState::Completed);
        assert_eq!(
            summary.address(NetworkId::ArbitrumSepolia, "ARBITRUM_ROUTER_ADDRESS"),
            None
        );
        assert_eq!(
            summary.address(NetworkId::EthSepolia, "ETH_VAULT_ADDRESS"),
            None
        );

        Ok(())
    }

    #[tokio::test]
    async fn strict_extraction_aborts_on_miss() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut context = context(&dir, full_env(), Config::telepay());
        context.strict_extraction = true;

        // The vault step prints the euler marker, not the vault one
        let forge = FakeForge::new(router_prints_nothing);

        let mut sequencer = Sequencer::new(&context, &forge);
        let err = sequencer.run().await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<DeployError>(),
            Some(&DeployError::ExtractionMiss {
                step: "Vault on eth_sepolia".to_string(),
                marker: "Ethereum Vault deployed at:".to_string(),
            })
        );
        assert!(forge.calls_to(NetworkId::ArbitrumSepolia).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn declined_confirmation_cancels() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), euler_config());
        let forge = FakeForge::new(all_succeed);

        let mut asked = vec![];
        let mut sequencer = Sequencer::new(&context, &forge).with_confirmation(
            |step: &DeploymentStep| {
                asked.push(step.to_string());
                Ok(step.network != NetworkId::ArbitrumSepolia)
            },
        );

        let err = sequencer.run().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::Cancelled { .. })
        ));
        assert!(matches!(
            sequencer.state(),
            SequencerState::Aborted { .. }
        ));
        drop(sequencer);

        assert_eq!(
            asked,
            vec!["Telepay on base_sepolia", "Router on arbitrum_sepolia"]
        );
        assert!(forge.calls_to(NetworkId::ArbitrumSepolia).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn broken_prompt_is_not_a_cancellation() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), euler_config());
        let forge = FakeForge::new(all_succeed);

        let mut sequencer = Sequencer::new(&context, &forge)
            .with_confirmation(|_: &DeploymentStep| {
                Err(eyre::eyre!("IO error: not a terminal"))
            });

        let err = sequencer.run().await.unwrap_err();

        let expected = DeployError::ConfirmationFailure {
            step: "Telepay on base_sepolia".to_string(),
            message: "IO error: not a terminal".to_string(),
        };
        assert_eq!(err.downcast_ref::<DeployError>(), Some(&expected));
        assert_eq!(
            sequencer.state(),
            &SequencerState::Aborted { reason: expected }
        );
        drop(sequencer);

        assert_eq!(forge.calls_to(NetworkId::BaseSepolia).len(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn spawn_errors_are_process_failures() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let context = context(&dir, full_env(), Config::telepay());
        let forge = FakeForge::new(|_| Err(eyre::eyre!("No such file or directory")));

        let mut sequencer = Sequencer::new(&context, &forge);
        let err = sequencer.run().await.unwrap_err();

        let reason = err.downcast_ref::<DeployError>().unwrap();
        assert!(reason.is_process_failure());
        assert_eq!(forge.calls.borrow().len(), 1);

        Ok(())
    }
}
