//! Configuration for the graph adapter.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Adapter-level configuration.
///
/// Loaded from a config file `[adapter]` section or `VERGE__ADAPTER__`
/// environment variables; every field has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Default identifier field name for entities.
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Default idempotence (version) field name for conditional writes.
    #[serde(default = "default_idempotence_key")]
    pub idempotence_key: String,

    /// Event destination (topic/ARN). Publishing is skipped when unset.
    #[serde(default)]
    pub destination: Option<String>,

    /// Message attributes attached to every published event. Null values
    /// are omitted at publish time; per-call attributes of the same name
    /// win.
    #[serde(default)]
    pub default_attributes: BTreeMap<String, Value>,

    /// Schema document path for payload projection.
    #[serde(default)]
    pub schema_file: Option<String>,

    /// Schema name inside the document.
    #[serde(default)]
    pub schema_name: Option<String>,
}

fn default_identifier() -> String {
    "id".to_string()
}

fn default_idempotence_key() -> String {
    "version".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
            idempotence_key: default_idempotence_key(),
            destination: None,
            default_attributes: BTreeMap::new(),
            schema_file: None,
            schema_name: None,
        }
    }
}

impl AdapterConfig {
    /// Load adapter settings from `<file_prefix>.toml` and
    /// `VERGE__`-prefixed environment variables, falling back to defaults.
    pub fn load(file_prefix: &str) -> Self {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("VERGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build();

        match cfg {
            Ok(c) => c.get::<AdapterConfig>("adapter").unwrap_or_default(),
            Err(_) => AdapterConfig::default(),
        }
    }
}
