use std::borrow::Cow;

use crate::types::ContractKind;

/// The log line prefix the deployment scripts print before an address.
pub fn marker(kind: &ContractKind) -> Cow<'static, str> {
    match kind {
        ContractKind::Telepay => Cow::Borrowed("Base Telepay deployed at:"),
        ContractKind::Vault => Cow::Borrowed("Ethereum Vault deployed at:"),
        ContractKind::EulerVault => Cow::Borrowed("EulerVault deployed at:"),
        ContractKind::Router => Cow::Borrowed("Router deployed at:"),
        ContractKind::Other(name) => Cow::Owned(format!("{name} deployed at:")),
    }
}

/// Finds the first line carrying the marker for `kind` and returns the trimmed
/// text after it. Never fails, output without the marker yields `None`.
pub fn extract_address(output: &str, kind: &ContractKind) -> Option<String> {
    let marker = marker(kind);

    let rest = output
        .lines()
        .find_map(|line| line.split_once(&*marker).map(|(_, rest)| rest))?;

    let address = rest.trim();

    (!address.is_empty()).then(|| address.to_string())
}
