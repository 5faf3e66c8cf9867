//! The tree walk that turns a response into chunks.
//!
//! Objects are visited depth first and each object's chunk is queued when its
//! frame returns, so every entity reaches the output after the entities it
//! references.

use serde_json_bytes::ByteString;

use crate::chunk::Chunk;
use crate::chunk::FieldValue;
use crate::chunk::Fields;
use crate::chunk::Handle;
use crate::configuration::Configuration;
use crate::emitter::ChunkSink;
use crate::emitter::Emitter;
use crate::error::NormalizeError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::registry::EntityId;
use crate::registry::Registry;
use crate::shape::FieldSelection;
use crate::shape::LinkedField;
use crate::shape::ScalarField;
use crate::shape::Selection;
use crate::shape::SelectionShape;
use crate::type_condition;
use crate::type_condition::RuntimeType;

/// State of one normalization run.
pub(crate) struct Walk<'a, S> {
    configuration: &'a Configuration,
    variables: &'a Object,
    registry: Registry,
    emitter: Emitter<S>,
    path: Path,
}

/// The object currently being normalized.
struct Frame<'f> {
    entity: EntityId,
    stable_id: &'f str,
    typename: Option<&'f str>,
    object: &'f Object,
}

impl<'a, S: ChunkSink> Walk<'a, S> {
    pub(crate) fn new(configuration: &'a Configuration, variables: &'a Object, sink: S) -> Self {
        Self {
            configuration,
            variables,
            registry: Registry::new(),
            emitter: Emitter::new(sink),
            path: Path::empty(),
        }
    }

    /// Normalize the whole response and terminate the output.
    pub(crate) fn run(mut self, shape: &SelectionShape, response: &Value) -> Result<S, NormalizeError> {
        let root = response
            .as_object()
            .ok_or_else(|| NormalizeError::InvalidRoot {
                found: response.json_type_name(),
            })?;
        let configuration = self.configuration;
        self.normalize_object(
            &configuration.root_id,
            Some(&configuration.root_typename),
            root,
            &shape.selections,
        )?;

        tracing::debug!(
            records = self.emitter.records(),
            extends = self.emitter.extends(),
            entities = self.registry.entity_count(),
            "normalized response"
        );
        debug_assert_eq!(self.registry.handle_count(), self.emitter.records());
        self.emitter.complete()
    }

    fn normalize_object(
        &mut self,
        stable_id: &str,
        typename: Option<&str>,
        object: &Object,
        selections: &[Selection],
    ) -> Result<Handle, NormalizeError> {
        let sighting = self.registry.resolve(stable_id);
        if !sighting.first {
            tracing::trace!(stable_id, path = %self.path, "entity seen again");
        }
        let frame = Frame {
            entity: sighting.entity,
            stable_id,
            typename,
            object,
        };

        let mut staged = Fields::new();
        self.visit_selections(&frame, selections, &mut staged)?;
        self.flush(&frame, staged)
    }

    fn visit_selections(
        &mut self,
        frame: &Frame<'_>,
        selections: &[Selection],
        staged: &mut Fields,
    ) -> Result<(), NormalizeError> {
        for selection in selections {
            match selection {
                Selection::Structural(_) => {}
                Selection::InlineFragment(fragment) => {
                    let runtime = RuntimeType {
                        typename: frame.typename,
                        object: frame.object,
                    };
                    let satisfied = type_condition::evaluate(
                        fragment.condition(),
                        runtime,
                        &self.configuration.possible_types,
                    )
                    .map_err(|_| NormalizeError::UndecidableTypeCondition {
                        condition: fragment.type_condition.clone(),
                        path: self.path.clone(),
                    })?;
                    if satisfied {
                        self.visit_selections(frame, &fragment.selections, staged)?;
                    }
                }
                Selection::Scalar(field) => self.visit_scalar(frame, field, staged),
                Selection::LinkedField(field) if field.plural => {
                    self.visit_plural(frame, field, staged)?
                }
                Selection::LinkedField(field) => self.visit_singular(frame, field, staged)?,
            }
        }
        Ok(())
    }

    fn visit_scalar(&mut self, frame: &Frame<'_>, field: &ScalarField, staged: &mut Fields) {
        let storage_key = field.storage_key(self.variables);
        if self.registry.was_emitted(frame.entity, &storage_key) {
            return;
        }
        match frame.object.get(field.response_key()) {
            Some(value) => self.stage(frame, staged, &storage_key, FieldValue::Scalar(value.clone())),
            None => self.missing_field(field.response_key()),
        }
    }

    fn visit_singular(
        &mut self,
        frame: &Frame<'_>,
        field: &LinkedField,
        staged: &mut Fields,
    ) -> Result<(), NormalizeError> {
        let storage_key = field.storage_key(self.variables);
        let response_key = field.response_key();
        let child = match frame.object.get(response_key) {
            None => {
                self.missing_field(response_key);
                return Ok(());
            }
            Some(Value::Null) => {
                if !self.registry.was_emitted(frame.entity, &storage_key) {
                    self.stage(frame, staged, &storage_key, FieldValue::Null);
                }
                return Ok(());
            }
            Some(Value::Object(child)) => child,
            Some(other) => {
                let mut path = self.path.clone();
                path.push_key(response_key);
                return Err(NormalizeError::ExpectedObject {
                    path,
                    found: other.json_type_name(),
                });
            }
        };

        self.path.push_key(response_key);
        let handle = self.normalize_linked(frame.stable_id, &storage_key, None, child, field);
        self.path.pop();
        let handle = handle?;

        // a nested sighting of the same entity may already have written this field
        if !self.registry.was_emitted(frame.entity, &storage_key) {
            self.stage(frame, staged, &storage_key, FieldValue::Reference { handle });
        }
        Ok(())
    }

    fn visit_plural(
        &mut self,
        frame: &Frame<'_>,
        field: &LinkedField,
        staged: &mut Fields,
    ) -> Result<(), NormalizeError> {
        let storage_key = field.storage_key(self.variables);
        if self.registry.was_emitted(frame.entity, &storage_key) {
            return Ok(());
        }
        let response_key = field.response_key();

        self.path.push_key(response_key);
        let value = self.plural_value(frame, field, &storage_key, frame.object.get(response_key));
        self.path.pop();
        let value = value?;

        if !self.registry.was_emitted(frame.entity, &storage_key) {
            self.stage(frame, staged, &storage_key, value);
        }
        Ok(())
    }

    fn plural_value(
        &mut self,
        frame: &Frame<'_>,
        field: &LinkedField,
        storage_key: &str,
        value: Option<&Value>,
    ) -> Result<FieldValue, NormalizeError> {
        let items = match value {
            None => return Ok(FieldValue::References { handles: Vec::new() }),
            Some(Value::Null) => return Ok(FieldValue::Null),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(NormalizeError::ExpectedList {
                    path: self.path.clone(),
                    found: other.json_type_name(),
                })
            }
        };

        let mut handles = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            self.path.push_index(index);
            let handle = match item {
                Value::Null => Ok(None),
                Value::Object(child) => self
                    .normalize_linked(frame.stable_id, storage_key, Some(index), child, field)
                    .map(Some),
                other => Err(NormalizeError::ExpectedObject {
                    path: self.path.clone(),
                    found: other.json_type_name(),
                }),
            };
            self.path.pop();
            handles.push(handle?);
        }
        Ok(FieldValue::References { handles })
    }

    fn normalize_linked(
        &mut self,
        parent_id: &str,
        storage_key: &str,
        index: Option<usize>,
        child: &Object,
        field: &LinkedField,
    ) -> Result<Handle, NormalizeError> {
        let stable_id = self.identify(parent_id, storage_key, index, child)?;
        let typename = field.concrete_type.as_deref().or_else(|| {
            child
                .get(self.configuration.typename_field.as_str())
                .and_then(|typename| typename.as_str())
        });
        self.normalize_object(&stable_id, typename, child, &field.selections)
    }

    /// The stable identity of a linked object: its natural identifier when it has
    /// one, otherwise derived from the path that reached it.
    fn identify(
        &self,
        parent_id: &str,
        storage_key: &str,
        index: Option<usize>,
        child: &Object,
    ) -> Result<String, NormalizeError> {
        let id_field = self.configuration.id_field.as_str();
        match child.get(id_field) {
            None | Some(Value::Null) => Ok(self.client_id(parent_id, storage_key, index)),
            Some(value @ (Value::String(_) | Value::Number(_))) => {
                let id = value.to_key_text();
                if id == self.configuration.root_id {
                    return Err(NormalizeError::InvalidIdentifier {
                        path: self.path.clone(),
                        reason: format!("'{id}' is reserved for the root object"),
                    });
                }
                Ok(id)
            }
            Some(other) => Err(NormalizeError::InvalidIdentifier {
                path: self.path.clone(),
                reason: format!(
                    "'{id_field}' must be a string or a number, found {}",
                    other.json_type_name()
                ),
            }),
        }
    }

    fn client_id(&self, parent_id: &str, storage_key: &str, index: Option<usize>) -> String {
        let prefix = self.configuration.client_prefix.as_str();
        let mut id = String::with_capacity(prefix.len() + parent_id.len() + storage_key.len() + 8);
        if !parent_id.starts_with(prefix) {
            id.push_str(prefix);
        }
        id.push_str(parent_id);
        id.push(':');
        id.push_str(storage_key);
        if let Some(index) = index {
            id.push(':');
            id.push_str(&index.to_string());
        }
        id
    }

    fn stage(&mut self, frame: &Frame<'_>, staged: &mut Fields, storage_key: &str, value: FieldValue) {
        self.registry.mark_emitted(frame.entity, storage_key);
        let previous = staged.insert(ByteString::from(storage_key), value);
        debug_assert!(
            previous.is_none(),
            "'{storage_key}' staged twice for '{}'",
            frame.stable_id
        );
    }

    fn missing_field(&self, response_key: &str) {
        failfast_debug!(
            "response has no '{}' at '{}', skipping it",
            response_key,
            self.path
        );
    }

    /// Queue the chunk of a finished sighting.
    fn flush(&mut self, frame: &Frame<'_>, fields: Fields) -> Result<Handle, NormalizeError> {
        if let Some(handle) = self.registry.handle(frame.entity) {
            if fields.is_empty() {
                tracing::trace!(stable_id = frame.stable_id, "nothing new for entity");
            } else {
                self.emitter.queue(Chunk::Extend { handle, fields })?;
            }
            return Ok(handle);
        }

        let typename = frame
            .typename
            .ok_or_else(|| NormalizeError::MissingTypename {
                path: self.path.clone(),
                field: self.configuration.typename_field.clone(),
            })?;
        let handle = self.registry.allocate_handle(frame.entity);
        self.emitter.queue(Chunk::Record {
            handle,
            stable_id: frame.stable_id.to_string(),
            typename: typename.to_string(),
            fields,
        })?;
        Ok(handle)
    }
}
