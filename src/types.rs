use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Deployment target network.
///
/// Every variant needs a matching row in the network registry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NetworkId {
    BaseSepolia,
    EthSepolia,
    ArbitrumSepolia,
}

impl NetworkId {
    /// Prefix used for this network's environment variables and address keys.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::BaseSepolia => "BASE",
            Self::EthSepolia => "ETH",
            Self::ArbitrumSepolia => "ARBITRUM",
        }
    }
}

/// The kind of contract a deployment step produces.
///
/// Known kinds carry a fixed marker in the forge script logs, anything else
/// falls back to a marker generated from its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Telepay,
    Vault,
    EulerVault,
    Router,
    Other(String),
}

impl ContractKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Telepay => "Telepay",
            Self::Vault => "Vault",
            Self::EulerVault => "EulerVault",
            Self::Router => "Router",
            Self::Other(name) => name,
        }
    }

    /// `EulerVault` -> `EULER_VAULT`
    pub fn screaming_snake_name(&self) -> String {
        let mut out = String::new();
        let mut prev_lower = false;

        for c in self.name().chars() {
            if !c.is_ascii_alphanumeric() {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
                prev_lower = false;
                continue;
            }

            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }

            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c.to_ascii_uppercase());
        }

        out.trim_end_matches('_').to_string()
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ContractKind {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            eyre::bail!("Contract kind must not be empty");
        }

        Ok(match s {
            "Telepay" => Self::Telepay,
            "Vault" => Self::Vault,
            "EulerVault" => Self::EulerVault,
            "Router" => Self::Router,
            other => Self::Other(other.to_string()),
        })
    }
}

impl Serialize for ContractKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ContractKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        s.parse().map_err(serde::de::Error::custom)
    }
}
