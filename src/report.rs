use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address_store::AddressStore;
use crate::network::NetworkRegistry;
use crate::types::NetworkId;

pub const REPORT_PATH: &str = "deployments/report.yml";

/// Deployed addresses grouped by network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub networks: BTreeMap<NetworkId, NetworkSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub name: String,
    pub chain_id: u64,
    #[serde(default)]
    pub contracts: BTreeMap<String, String>,
}

impl Summary {
    pub fn new(registry: &NetworkRegistry, store: &AddressStore) -> Self {
        let mut networks: BTreeMap<_, _> = registry
            .iter()
            .map(|network| {
                (
                    network.id,
                    NetworkSummary {
                        name: network.name.clone(),
                        chain_id: network.chain_id,
                        contracts: BTreeMap::new(),
                    },
                )
            })
            .collect();

        for deployed in store.iter() {
            if let Some(network) = networks.get_mut(&deployed.network) {
                network
                    .contracts
                    .insert(deployed.name.clone(), deployed.address.clone());
            }
        }

        Self { networks }
    }

    pub fn address(&self, network: NetworkId, name: &str) -> Option<&str> {
        self.networks
            .get(&network)?
            .contracts
            .get(name)
            .map(String::as_str)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deployment summary")?;

        for network in self.networks.values() {
            writeln!(f, "  {} ({})", network.name, network.chain_id)?;

            if network.contracts.is_empty() {
                writeln!(f, "    no addresses recorded")?;
            }

            for (name, address) in &network.contracts {
                writeln!(f, "    {name}: {address}")?;
            }
        }

        Ok(())
    }
}
