use thiserror::Error;

use crate::types::NetworkId;

/// Failures that end a deployment sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(NetworkId),

    /// Pre-flight failure, names every missing variable at once.
    #[error("Missing required configuration: {}", missing.join(", "))]
    MissingConfiguration { missing: Vec<String> },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Step {step} failed with exit code {exit_code}: {stderr}")]
    ProcessFailure {
        step: String,
        exit_code: i32,
        stderr: String,
    },

    /// The primary deployment succeeded but explorer verification did not.
    #[error(
        "Verification for step {step} failed with exit code {exit_code}: {stderr}"
    )]
    VerificationFailure {
        step: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Step {step} produced no line containing {marker:?}")]
    ExtractionMiss { step: String, marker: String },

    #[error("Failed to persist {key} to {path}: {message}")]
    PersistFailure {
        key: String,
        path: String,
        message: String,
    },

    #[error("Deployment cancelled before step {step}")]
    Cancelled { step: String },

    #[error("Confirmation before step {step} could not be asked: {message}")]
    ConfirmationFailure { step: String, message: String },
}

impl DeployError {
    /// Verification failures are a flavour of process failure.
    #[cfg(test)]
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self,
            Self::ProcessFailure { .. } | Self::VerificationFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configuration_lists_every_name() {
        let err = DeployError::MissingConfiguration {
            missing: vec!["PRIVATE_KEY".to_string(), "ETH_SEPOLIA_RPC_URL".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Missing required configuration: PRIVATE_KEY, ETH_SEPOLIA_RPC_URL"
        );
    }

    #[test]
    fn verification_failure_counts_as_process_failure() {
        let err = DeployError::VerificationFailure {
            step: "Vault on eth_sepolia".to_string(),
            exit_code: 1,
            stderr: "rate limited".to_string(),
        };

        assert!(err.is_process_failure());
        assert!(!DeployError::Cancelled {
            step: "x".to_string()
        }
        .is_process_failure());
    }
}
