use std::path::PathBuf;

use clap::ValueEnum;

use crate::address_store::AddressStore;
use crate::cli::Args;
use crate::config::{Config, DeploymentStep};
use crate::environment::Environment;
use crate::forge_utils::script::DEFAULT_FORGE_BIN;
use crate::forge_utils::ForgeScript;
use crate::network::NetworkConfig;

pub const FORGE_VERBOSITY: u8 = 3;

/// What happens to an address whose explorer verification failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum VerificationFailurePolicy {
    /// Record and persist it, the contract is on chain either way
    #[default]
    Keep,
    /// Drop it
    Discard,
}

/// Everything a deployment run needs, built once at startup.
#[derive(Debug)]
pub struct DeploymentContext {
    pub env: Environment,
    pub config: Config,
    pub env_file: PathBuf,
    pub forge_bin: String,
    pub root: Option<PathBuf>,
    pub verify: bool,
    pub strict_extraction: bool,
    pub on_verification_failure: VerificationFailurePolicy,
}

impl DeploymentContext {
    pub fn new(env: Environment, config: Config, env_file: PathBuf) -> Self {
        Self {
            env,
            config,
            env_file,
            forge_bin: DEFAULT_FORGE_BIN.to_string(),
            root: None,
            verify: true,
            strict_extraction: false,
            on_verification_failure: VerificationFailurePolicy::default(),
        }
    }

    pub fn from_args(env: Environment, config: Config, args: &Args) -> Self {
        Self {
            forge_bin: args.forge_bin.clone(),
            root: args.root.clone(),
            verify: !args.no_verify,
            strict_extraction: args.strict_extraction,
            on_verification_failure: args.on_verification_failure,
            ..Self::new(env, config, args.env_file.clone())
        }
    }

    /// The deploying `forge script` call for `step`, with every address
    /// recorded so far exported into its environment.
    pub fn forge_script(
        &self,
        step: &DeploymentStep,
        network: &NetworkConfig,
        store: &AddressStore,
    ) -> ForgeScript {
        let mut forge_script = ForgeScript::new(&step.script)
            .with_forge_bin(&self.forge_bin)
            .with_rpc_url(&network.rpc_url)
            .broadcast()
            .with_verbosity(FORGE_VERBOSITY);

        if let Some(root) = self.root.as_ref() {
            forge_script = forge_script.with_cwd(root);
        }

        for (name, address) in store.overlay() {
            forge_script = forge_script.with_env(name, address);
        }

        forge_script
    }

    /// The explorer API key to verify with, `None` when verification is off
    /// or the network has no key.
    pub fn verification_api_key<'a>(
        &self,
        network: &'a NetworkConfig,
    ) -> Option<&'a str> {
        if !self.verify {
            return None;
        }

        network.explorer_api_key.as_deref()
    }
}
