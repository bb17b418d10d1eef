use std::collections::BTreeMap;

use shrinkwraprs::Shrinkwrap;

/// Snapshot of the process environment taken once at startup.
///
/// Everything downstream reads variables from here instead of the ambient
/// process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Shrinkwrap)]
pub struct Environment(pub BTreeMap<String, String>);

impl Environment {
    pub fn from_process() -> Self {
        Self(std::env::vars().collect())
    }

    /// Returns the value for `key` if it is set to something non-blank.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    #[cfg(test)]
    pub fn set(&mut self, key: impl ToString, value: impl ToString) {
        self.0.insert(key.to_string(), value.to_string());
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: ToString,
    V: ToString,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_unset() {
        let env: Environment =
            [("PRIVATE_KEY", "  "), ("ETHERSCAN_API_KEY", "abc ")]
                .into_iter()
                .collect();

        assert_eq!(env.value("PRIVATE_KEY"), None);
        assert_eq!(env.value("ETHERSCAN_API_KEY"), Some("abc"));
        assert_eq!(env.value("ARBISCAN_API_KEY"), None);
    }
}
