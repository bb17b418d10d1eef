use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DeployError;
use crate::types::{ContractKind, NetworkId};

pub const DEFAULT_SCRIPT: &str = "script/Telepay.s.sol";

/// The ordered list of deployments to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub steps: Vec<DeploymentStep>,

    /// Extra variables that must be present before anything is deployed
    #[serde(default)]
    pub required_env: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    pub script: PathBuf,
    pub network: NetworkId,
    pub kind: ContractKind,

    /// Name under which the deployed address is recorded and exported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_key: Option<String>,
}

impl DeploymentStep {
    pub fn new(
        script: impl Into<PathBuf>,
        network: NetworkId,
        kind: ContractKind,
    ) -> Self {
        Self {
            script: script.into(),
            network,
            kind,
            address_key: None,
        }
    }

    #[cfg(test)]
    pub fn with_address_key(mut self, address_key: impl ToString) -> Self {
        self.address_key = Some(address_key.to_string());
        self
    }

    /// `ETH` + `EulerVault` -> `ETH_EULER_VAULT_ADDRESS`, unless overridden.
    pub fn address_key(&self) -> String {
        self.address_key.clone().unwrap_or_else(|| {
            format!(
                "{}_{}_ADDRESS",
                self.network.env_prefix(),
                self.kind.screaming_snake_name()
            )
        })
    }
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.kind, self.network)
    }
}

impl Config {
    /// Telepay on Base, the vault on Ethereum, the router on Arbitrum.
    pub fn telepay() -> Self {
        Self {
            steps: vec![
                DeploymentStep::new(
                    DEFAULT_SCRIPT,
                    NetworkId::BaseSepolia,
                    ContractKind::Telepay,
                ),
                DeploymentStep::new(
                    DEFAULT_SCRIPT,
                    NetworkId::EthSepolia,
                    ContractKind::Vault,
                ),
                DeploymentStep::new(
                    DEFAULT_SCRIPT,
                    NetworkId::ArbitrumSepolia,
                    ContractKind::Router,
                ),
            ],
            required_env: vec![],
        }
    }

    /// Rejects plans that would record the same address key twice.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut seen = HashSet::new();

        for step in &self.steps {
            let key = step.address_key();

            if !seen.insert(key.clone()) {
                return Err(DeployError::InvalidConfiguration(format!(
                    "Address key {key} is produced by more than one step"
                )));
            }
        }

        Ok(())
    }

    /// Networks in the order the plan first touches them.
    pub fn networks(&self) -> Vec<NetworkId> {
        let mut networks = Vec::new();

        for step in &self.steps {
            if !networks.contains(&step.network) {
                networks.push(step.network);
            }
        }

        networks
    }
}
