//! Normalization of responses into chunks.

mod walk;

use std::sync::Arc;

use crate::chunk::Chunk;
use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::emitter::ChunkSink;
use crate::error::NormalizeError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::shape::SelectionShape;
use walk::Walk;

/// Normalizes responses against one selection shape.
///
/// A normalizer is immutable and cheap to clone. Every call to one of the
/// `normalize` methods is an independent run: handles and the record of
/// emitted fields never outlive the run that created them.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub(crate) shape: Arc<SelectionShape>,
    pub(crate) variables: Arc<Object>,
    pub(crate) configuration: Arc<Configuration>,
}

#[buildstructor::buildstructor]
impl Normalizer {
    /// Build a normalizer. The configuration defaults to [`Configuration::default`]
    /// and is validated before use.
    #[builder(visibility = "pub")]
    fn new(
        shape: SelectionShape,
        variables: Option<Object>,
        configuration: Option<Configuration>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = configuration.unwrap_or_default();
        configuration.validate()?;
        Ok(Self {
            shape: Arc::new(shape),
            variables: Arc::new(variables.unwrap_or_default()),
            configuration: Arc::new(configuration),
        })
    }
}

impl Normalizer {
    pub fn shape(&self) -> &SelectionShape {
        &self.shape
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Normalize a response and collect its chunks.
    pub fn normalize(&self, response: &Value) -> Result<Vec<Chunk>, NormalizeError> {
        self.normalize_into(response, Vec::new())
    }

    /// Normalize a response, handing every chunk to `sink` as soon as it is produced.
    ///
    /// On failure the sink may already have received chunks, but never the
    /// terminal [`Chunk::Complete`].
    #[tracing::instrument(skip_all, level = "debug", fields(operation = ?self.shape.name))]
    pub fn normalize_into<S: ChunkSink>(
        &self,
        response: &Value,
        sink: S,
    ) -> Result<S, NormalizeError> {
        let result = Walk::new(&self.configuration, &self.variables, sink).run(&self.shape, response);
        if let Err(error) = &result {
            tracing::debug!(%error, "normalization failed");
        }
        result
    }
}

/// Normalize a response with the default configuration and no variables.
pub fn normalize(response: &Value, shape: &SelectionShape) -> Result<Vec<Chunk>, NormalizeError> {
    Walk::new(&Configuration::default(), &Object::new(), Vec::new()).run(shape, response)
}
