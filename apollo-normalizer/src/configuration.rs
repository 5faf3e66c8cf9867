//! Normalizer configuration.

use std::collections::HashMap;
use std::path::Path;

use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

pub use crate::error::ConfigurationError;

/// The configuration of a normalizer.
///
/// Can be created through `serde::Deserialize` from various formats,
/// or inline in Rust code with the builder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Response field holding the natural identifier of an object.
    /// Defaults to `id`.
    pub id_field: String,

    /// Response field holding the typename of an object.
    /// Defaults to `__typename`.
    pub typename_field: String,

    /// Stable identity of the root object.
    /// Defaults to `client:root`.
    pub root_id: String,

    /// Typename recorded for the root object.
    /// Defaults to `__Root`.
    pub root_typename: String,

    /// Prefix of synthesized identities, for objects without a natural identifier.
    /// Defaults to `client:`.
    pub client_prefix: String,

    /// Concrete types of abstract types, used to evaluate abstract type conditions
    /// when the response carries no `__isX` marker for them.
    pub possible_types: HashMap<String, Vec<String>>,

    /// Number of chunks buffered ahead of a slow stream consumer.
    /// Defaults to 16.
    pub stream_buffer: usize,
}

fn default_id_field() -> String {
    String::from("id")
}

fn default_typename_field() -> String {
    String::from("__typename")
}

fn default_client_prefix() -> String {
    String::from("client:")
}

fn default_root_id() -> String {
    String::from("client:root")
}

fn default_root_typename() -> String {
    String::from("__Root")
}

fn default_stream_buffer() -> usize {
    16
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub fn new(
        id_field: Option<String>,
        typename_field: Option<String>,
        root_id: Option<String>,
        root_typename: Option<String>,
        client_prefix: Option<String>,
        possible_types: HashMap<String, Vec<String>>,
        stream_buffer: Option<usize>,
    ) -> Self {
        Self {
            id_field: id_field.unwrap_or_else(default_id_field),
            typename_field: typename_field.unwrap_or_else(default_typename_field),
            root_id: root_id.unwrap_or_else(default_root_id),
            root_typename: root_typename.unwrap_or_else(default_root_typename),
            client_prefix: client_prefix.unwrap_or_else(default_client_prefix),
            possible_types,
            stream_buffer: stream_buffer.unwrap_or_else(default_stream_buffer),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::builder().build()
    }
}

impl Configuration {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let configuration: Configuration =
            serde_yaml::from_str(yaml).map_err(ConfigurationError::DeserializeConfigError)?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let yaml =
            std::fs::read_to_string(path.as_ref()).map_err(ConfigurationError::CannotReadFile)?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("id_field", &self.id_field),
            ("typename_field", &self.typename_field),
            ("root_typename", &self.root_typename),
            ("client_prefix", &self.client_prefix),
        ] {
            if value.is_empty() {
                return Err(ConfigurationError::InvalidConfiguration {
                    message: "field names and prefixes must not be empty",
                    error: format!("'{name}' is empty"),
                });
            }
        }
        // the root sentinel lives in the client namespace so that it cannot be
        // mistaken for an identifier sent by the server
        if !self.root_id.starts_with(&self.client_prefix) || self.root_id == self.client_prefix {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "the root identity must carry the client prefix",
                error: format!(
                    "'{}' does not extend '{}'",
                    self.root_id, self.client_prefix
                ),
            });
        }
        if self.stream_buffer == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "the stream buffer cannot be empty",
                error: "'stream_buffer' is 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = true;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    let gen = settings.into_generator();
    gen.into_root_schema_for::<Configuration>()
}
