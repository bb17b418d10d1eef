use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::env_file;
use crate::types::NetworkId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedAddress {
    pub name: String,
    pub network: NetworkId,
    pub address: String,
}

/// Addresses deployed during this run, keyed by their logical name.
#[derive(Debug, Clone, Default)]
pub struct AddressStore {
    entries: BTreeMap<String, DeployedAddress>,
}

impl AddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `address` under `name`, replacing any previous value.
    pub fn record(
        &mut self,
        name: impl ToString,
        network: NetworkId,
        address: impl ToString,
    ) -> &DeployedAddress {
        let name = name.to_string();

        let entry = DeployedAddress {
            name: name.clone(),
            network,
            address: address.to_string(),
        };

        self.entries.insert(name.clone(), entry);
        &self.entries[&name]
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.address.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeployedAddress> {
        self.entries.values()
    }

    /// Name/address pairs to export into the next forge invocation.
    pub fn overlay(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), entry.address.as_str()))
    }

    /// Mirrors every recorded address into the env file at `path`.
    pub fn persist(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let updates: Vec<(&str, &str)> = self.overlay().collect();

        env_file::update(path, &updates)
    }
}
