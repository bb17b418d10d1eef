use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use super::common::{Invocation, RunResult, ToolRunner};

pub const DEFAULT_FORGE_BIN: &str = "forge";

#[derive(Debug, Default)]
pub struct ForgeScriptVerificationArgs {
    pub etherscan_api_key: Option<String>,
    pub verifier_url: Option<String>,
}

/// Builder for `forge script` invocations.
#[derive(Debug)]
pub struct ForgeScript {
    forge_bin: String,
    cwd: Option<PathBuf>,
    script: PathBuf,
    rpc_url: Option<String>,
    broadcast: bool,
    resume: bool,
    verbosity: u8,
    env: BTreeMap<String, String>,
    verification_args: ForgeScriptVerificationArgs,
}

impl ForgeScript {
    pub fn new(script: impl AsRef<Path>) -> Self {
        Self {
            forge_bin: DEFAULT_FORGE_BIN.to_string(),
            cwd: None,
            script: script.as_ref().to_owned(),
            rpc_url: None,
            broadcast: false,
            resume: false,
            verbosity: 0,
            env: BTreeMap::new(),
            verification_args: ForgeScriptVerificationArgs::default(),
        }
    }

    pub fn with_forge_bin(mut self, forge_bin: impl ToString) -> Self {
        self.forge_bin = forge_bin.to_string();
        self
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    pub fn with_rpc_url(mut self, rpc_url: impl ToString) -> Self {
        self.rpc_url = Some(rpc_url.to_string());
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }

    /// Reuses the previous broadcast instead of sending new transactions
    pub fn resume(mut self) -> Self {
        self.resume = true;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_env(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_etherscan_api_key(
        mut self,
        etherscan_api_key: impl ToString,
    ) -> Self {
        self.verification_args.etherscan_api_key =
            Some(etherscan_api_key.to_string());
        self
    }

    pub fn with_verifier_url(mut self, verifier_url: impl ToString) -> Self {
        self.verification_args.verifier_url = Some(verifier_url.to_string());
        self
    }

    pub fn is_verifying(&self) -> bool {
        self.verification_args.etherscan_api_key.is_some()
            || self.verification_args.verifier_url.is_some()
    }

    pub fn invocation(&self) -> Invocation {
        let mut args = vec!["script".to_string()];

        args.push(self.script.display().to_string());

        if let Some(rpc_url) = &self.rpc_url {
            args.push("--rpc-url".to_string());
            args.push(rpc_url.clone());
        }

        if self.broadcast {
            args.push("--broadcast".to_string());
        }

        if self.resume {
            args.push("--resume".to_string());
        }

        if self.verbosity > 0 {
            args.push(format!("-{}", "v".repeat(self.verbosity as usize)));
        }

        if self.is_verifying() {
            args.push("--verify".to_string());

            if let Some(etherscan_api_key) =
                &self.verification_args.etherscan_api_key
            {
                args.push("--etherscan-api-key".to_string());
                args.push(etherscan_api_key.clone());
            }

            if let Some(verifier_url) = &self.verification_args.verifier_url {
                args.push("--verifier-url".to_string());
                args.push(verifier_url.clone());
            }
        }

        Invocation {
            program: self.forge_bin.clone(),
            args,
            env: self.env.clone(),
            cwd: self.cwd.clone(),
        }
    }

    #[instrument(name = "forge_script", skip_all)]
    pub async fn run(&self, runner: &impl ToolRunner) -> eyre::Result<RunResult> {
        let invocation = self.invocation();

        info!("Running {invocation}");

        let result = runner.run(&invocation).await?;

        info!("Exited with {}", result.exit_code);

        Ok(result)
    }
}
