use std::collections::BTreeMap;

use reqwest::Url;
use tracing::warn;

use crate::config::Config;
use crate::environment::Environment;
use crate::error::DeployError;
use crate::types::NetworkId;

pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

struct NetworkRow {
    id: NetworkId,
    name: &'static str,
    chain_id: u64,
    rpc_url_var: &'static str,
    explorer_api_key_var: &'static str,
    verifier_url: &'static str,
}

fn row(id: NetworkId) -> NetworkRow {
    match id {
        NetworkId::BaseSepolia => NetworkRow {
            id,
            name: "Base Sepolia",
            chain_id: 84532,
            rpc_url_var: "BASE_SEPOLIA_RPC_URL",
            explorer_api_key_var: "BASE_EXPLORER_API_KEY",
            verifier_url: "https://api-sepolia.basescan.org/api",
        },
        NetworkId::EthSepolia => NetworkRow {
            id,
            name: "Ethereum Sepolia",
            chain_id: 11155111,
            rpc_url_var: "ETH_SEPOLIA_RPC_URL",
            explorer_api_key_var: "ETHERSCAN_API_KEY",
            verifier_url: "https://api-sepolia.etherscan.io/api",
        },
        NetworkId::ArbitrumSepolia => NetworkRow {
            id,
            name: "Arbitrum Sepolia",
            chain_id: 421614,
            rpc_url_var: "ARBITRUM_SEPOLIA_RPC_URL",
            explorer_api_key_var: "ARBISCAN_API_KEY",
            verifier_url: "https://api-sepolia.arbiscan.io/api",
        },
    }
}

#[derive(Clone)]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: Url,
    pub explorer_api_key: Option<String>,
    pub verifier_url: Url,
}

// Keeps the explorer API key out of logs
impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url.as_str())
            .field("has_explorer_api_key", &self.explorer_api_key.is_some())
            .field("verifier_url", &self.verifier_url.as_str())
            .finish()
    }
}

/// Variables the deployment scripts read for a network, besides its RPC url.
pub fn network_required_vars(id: NetworkId) -> [String; 2] {
    let prefix = id.env_prefix();

    [
        format!("{prefix}_USDC_ADDRESS"),
        format!("{prefix}_TOKEN_MESSENGER_ADDRESS"),
    ]
}

/// Every variable that must be present for `config` to run, in report order.
pub fn required_vars(config: &Config) -> Vec<String> {
    let mut vars = Vec::new();

    for id in config.networks() {
        vars.push(row(id).rpc_url_var.to_string());
        vars.extend(network_required_vars(id));
    }

    vars.push(PRIVATE_KEY_VAR.to_string());

    for var in &config.required_env {
        if !vars.contains(var) {
            vars.push(var.clone());
        }
    }

    vars
}

#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: BTreeMap<NetworkId, NetworkConfig>,
}

impl NetworkRegistry {
    /// Builds the registry for the networks `config` deploys to.
    ///
    /// Fails with every missing variable listed in a single error.
    pub fn from_env(
        env: &Environment,
        config: &Config,
    ) -> Result<Self, DeployError> {
        let missing: Vec<String> = required_vars(config)
            .into_iter()
            .filter(|var| env.value(var).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(DeployError::MissingConfiguration { missing });
        }

        let mut networks = BTreeMap::new();

        for id in config.networks() {
            let row = row(id);

            let rpc_url = env.value(row.rpc_url_var).unwrap_or_default();
            let rpc_url = rpc_url.parse::<Url>().map_err(|err| {
                DeployError::InvalidConfiguration(format!(
                    "{} is not a valid url: {err}",
                    row.rpc_url_var
                ))
            })?;

            let verifier_url = row.verifier_url.parse::<Url>().map_err(|err| {
                DeployError::InvalidConfiguration(format!(
                    "Verifier url for {id} is not valid: {err}"
                ))
            })?;

            let explorer_api_key =
                env.value(row.explorer_api_key_var).map(str::to_string);

            if explorer_api_key.is_none() {
                warn!(
                    "{} is not set, contracts on {} will not be verified",
                    row.explorer_api_key_var, row.name
                );
            }

            networks.insert(
                id,
                NetworkConfig {
                    id,
                    name: row.name.to_string(),
                    chain_id: row.chain_id,
                    rpc_url,
                    explorer_api_key,
                    verifier_url,
                },
            );
        }

        Ok(Self { networks })
    }

    pub fn get(&self, id: NetworkId) -> Result<&NetworkConfig, DeployError> {
        self.networks
            .get(&id)
            .ok_or(DeployError::UnknownNetwork(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }

    /// Whether any network can be verified at all.
    pub fn has_any_explorer_api_key(&self) -> bool {
        self.iter().any(|network| network.explorer_api_key.is_some())
    }
}
