use std::path::PathBuf;

use clap::Parser;

use crate::deployment::VerificationFailurePolicy;
use crate::forge_utils::script::DEFAULT_FORGE_BIN;
use crate::report::REPORT_PATH;

#[derive(Debug, Clone, Parser)]
#[clap(rename_all = "kebab-case")]
pub struct Args {
    /// Env file to load configuration from and write deployed addresses to
    #[clap(long, env = "DEPLOY_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Path to a deployment plan
    ///
    /// Deploys Telepay on Base Sepolia, the vault on Ethereum Sepolia and the
    /// router on Arbitrum Sepolia when omitted
    #[clap(short, long, env = "DEPLOY_PLAN")]
    pub plan: Option<PathBuf>,

    /// The forge binary to invoke
    #[clap(long, env = "FORGE_BIN", default_value = DEFAULT_FORGE_BIN)]
    pub forge_bin: String,

    /// Root of the foundry project, defaults to the current directory
    #[clap(long, env = "FORGE_ROOT")]
    pub root: Option<PathBuf>,

    /// Skip explorer verification on every network
    #[clap(long)]
    pub no_verify: bool,

    /// Abort when a step's output has no deployed address
    #[clap(long)]
    pub strict_extraction: bool,

    /// What to do with an address whose verification failed
    #[clap(long, value_enum, default_value = "keep")]
    pub on_verification_failure: VerificationFailurePolicy,

    /// Ask for confirmation before each network
    #[clap(short, long)]
    pub interactive: bool,

    /// Kill a forge invocation after this many seconds
    #[clap(long, env = "FORGE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Where the deployment report is written
    #[clap(long, default_value = REPORT_PATH)]
    pub report: PathBuf,

    /// Print the summary as JSON
    #[clap(long)]
    pub json: bool,
}
