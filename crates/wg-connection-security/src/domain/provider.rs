//! # Provider Descriptor
//!
//! Structural snapshot of an injected provider object: its own properties,
//! how each is defined (plain value, getter, configurability) and, for
//! functions, the source text the runtime reports for them.
//!
//! The snapshot is what the verifier and hijack detector inspect. Hosts build
//! it from the live object (e.g. via `Object.getOwnPropertyDescriptors` and
//! `Function.prototype.toString` in a wasm binding) or load it from JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Methods every usable provider must expose.
pub const REQUIRED_METHODS: [&str; 4] = ["connect", "disconnect", "signTransaction", "signMessage"];

/// Methods whose definition is inspected for tampering.
pub const CRITICAL_METHODS: [&str; 5] = [
    "connect",
    "disconnect",
    "signTransaction",
    "signAllTransactions",
    "signMessage",
];

/// Mutually-exclusive wallet identity flags. A genuine provider sets one.
pub const IDENTITY_FLAGS: [&str; 14] = [
    "isPhantom",
    "isSolflare",
    "isBackpack",
    "isGlow",
    "isCoinbaseWallet",
    "isExodus",
    "isBraveWallet",
    "isTrust",
    "isMathWallet",
    "isTokenPocket",
    "isOkxWallet",
    "isBitKeep",
    "isSlope",
    "isClover",
];

/// Value held by a provider property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropertyValue {
    /// A callable; `source` is its reported source text
    Function {
        source: String,
        /// Implementation is a `Proxy` around the real function
        #[serde(default, rename = "isProxy")]
        is_proxy: bool,
    },
    Bool {
        value: bool,
    },
    Text {
        value: String,
    },
    Object,
    Undefined,
}

/// How a property is defined on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub value: PropertyValue,
    #[serde(default = "default_configurable")]
    pub configurable: bool,
    /// Defined through an accessor rather than a data slot
    #[serde(default)]
    pub has_getter: bool,
}

fn default_configurable() -> bool {
    true
}

impl PropertyDescriptor {
    pub fn data(value: PropertyValue) -> Self {
        Self {
            value,
            configurable: true,
            has_getter: false,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.value, PropertyValue::Function { .. })
    }
}

/// Snapshot of an injected provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDescriptor>,
    /// Currently connected account (base58), if any
    #[serde(default)]
    pub public_key: Option<String>,
}

impl ProviderDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain function property.
    pub fn with_method(mut self, name: &str, source: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertyDescriptor::data(PropertyValue::Function {
                source: source.to_string(),
                is_proxy: false,
            }),
        );
        self
    }

    /// Add a function property implemented through a `Proxy`.
    pub fn with_proxy_method(mut self, name: &str, source: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertyDescriptor::data(PropertyValue::Function {
                source: source.to_string(),
                is_proxy: true,
            }),
        );
        self
    }

    /// Add a function exposed through a getter.
    pub fn with_getter_method(mut self, name: &str, source: &str, configurable: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertyDescriptor {
                value: PropertyValue::Function {
                    source: source.to_string(),
                    is_proxy: false,
                },
                configurable,
                has_getter: true,
            },
        );
        self
    }

    /// Add a boolean flag such as `isPhantom`.
    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertyDescriptor::data(PropertyValue::Bool { value }),
        );
        self
    }

    pub fn with_public_key(mut self, public_key: &str) -> Self {
        self.public_key = Some(public_key.to_string());
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .map(|p| p.value != PropertyValue::Undefined)
            .unwrap_or(false)
    }

    /// Source text of a function property.
    pub fn method_source(&self, name: &str) -> Option<&str> {
        match self.properties.get(name).map(|p| &p.value) {
            Some(PropertyValue::Function { source, .. }) => Some(source.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.properties.get(name).map(|p| &p.value),
            Some(PropertyValue::Bool { value: true })
        )
    }

    /// Identity flags set to `true`, in `IDENTITY_FLAGS` order.
    pub fn identity_flags(&self) -> Vec<String> {
        IDENTITY_FLAGS
            .iter()
            .filter(|flag| self.flag(flag))
            .map(|flag| flag.to_string())
            .collect()
    }

    /// Function properties among `CRITICAL_METHODS`, with their source.
    pub fn critical_sources(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        CRITICAL_METHODS
            .iter()
            .filter_map(move |name| self.method_source(name).map(|src| (*name, src)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_flags_only_true_values() {
        let provider = ProviderDescriptor::new()
            .with_flag("isPhantom", true)
            .with_flag("isSolflare", false)
            .with_flag("isConnected", true);
        assert_eq!(provider.identity_flags(), vec!["isPhantom".to_string()]);
    }

    #[test]
    fn test_method_source_ignores_non_functions() {
        let provider = ProviderDescriptor::new()
            .with_method("connect", "async connect() {}")
            .with_flag("signMessage", true);
        assert_eq!(provider.method_source("connect"), Some("async connect() {}"));
        assert_eq!(provider.method_source("signMessage"), None);
        assert_eq!(provider.method_source("disconnect"), None);
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{
            "properties": {
                "isPhantom": { "value": { "kind": "bool", "value": true } },
                "connect": {
                    "value": { "kind": "function", "source": "function connect() { [native code] }", "isProxy": true },
                    "configurable": false,
                    "hasGetter": true
                }
            },
            "publicKey": "11111111111111111111111111111111"
        }"#;
        let provider: ProviderDescriptor = serde_json::from_str(json).unwrap();
        assert!(provider.flag("isPhantom"));
        let connect = provider.property("connect").unwrap();
        assert!(connect.has_getter);
        assert!(!connect.configurable);
        assert!(matches!(
            connect.value,
            PropertyValue::Function { is_proxy: true, .. }
        ));
        assert_eq!(
            provider.public_key.as_deref(),
            Some("11111111111111111111111111111111")
        );
    }

    #[test]
    fn test_critical_sources_skips_missing() {
        let provider = ProviderDescriptor::new()
            .with_method("connect", "a")
            .with_method("signMessage", "b")
            .with_method("unrelated", "c");
        let names: Vec<_> = provider.critical_sources().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["connect", "signMessage"]);
    }
}
