//! Wire model for toggle definition sets and the runtime evaluation context.

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// A full set of feature definitions as delivered by a definition source.
///
/// A refresh always produces an entirely new set; consumers detect change by
/// comparing `Arc` identity, never by deep equality.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionSet {
    #[serde(default)]
    pub features: Vec<FeatureDefinition>,
}

/// One named feature toggle with its activation strategies, in server order.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureDefinition {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub strategies: Vec<StrategyRef>,
}

/// A reference to a strategy by name, with its configuration parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyRef {
    pub name: String,
    #[serde(default)]
    pub parameters: FxHashMap<String, String>,
}

/// Runtime attributes a feature is evaluated against.
///
/// The key set is open; predicates read only the keys they care about and a
/// missing key reads as the empty string.
#[derive(Debug, Clone, Default)]
pub struct Context {
    attributes: FxHashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        self.with_attribute("user_id", user_id)
    }

    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        self.with_attribute("session_id", session_id)
    }

    pub fn with_remote_addr(self, remote_addr: impl Into<String>) -> Self {
        self.with_attribute("remote_addr", remote_addr)
    }

    pub fn with_host(self, host: impl Into<String>) -> Self {
        self.with_attribute("host", host)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute; absent keys read as `""`.
    pub fn get(&self, key: &str) -> &str {
        self.attributes.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
