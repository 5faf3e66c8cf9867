//! The units of normalized output.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json_bytes::ByteString;

use crate::json_ext::Value;

/// A run-scoped integer alias for a stable identity.
///
/// Handles are dense, start at 0 and are only minted by the identity registry
/// of the run they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Handle(usize);

impl Handle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The value of a field in a chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A linked field that was null in the response.
    Null,

    /// A scalar value, written verbatim.
    Scalar(Value),

    /// A singular linked field.
    Reference { handle: Handle },

    /// A plural linked field. Null elements of the list are `None`.
    References { handles: Vec<Option<Handle>> },
}

impl FieldValue {
    /// Handles this value refers to.
    pub fn referenced_handles(&self) -> impl Iterator<Item = Handle> + '_ {
        let (single, many) = match self {
            FieldValue::Reference { handle } => (Some(*handle), None),
            FieldValue::References { handles } => (None, Some(handles.iter().flatten().copied())),
            FieldValue::Null | FieldValue::Scalar(_) => (None, None),
        };
        single.into_iter().chain(many.into_iter().flatten())
    }
}

/// Fields of a chunk, by storage key.
pub type Fields = IndexMap<ByteString, FieldValue>;

/// One unit of normalized output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Chunk {
    /// The first sighting of an entity.
    #[serde(rename_all = "camelCase")]
    Record {
        handle: Handle,
        stable_id: String,
        typename: String,
        fields: Fields,
    },

    /// A later sighting of an entity that disclosed new fields.
    Extend { handle: Handle, fields: Fields },

    /// The end of the run.
    Complete,
}

impl Chunk {
    /// The handle of the entity this chunk describes.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Chunk::Record { handle, .. } | Chunk::Extend { handle, .. } => Some(*handle),
            Chunk::Complete => None,
        }
    }

    pub fn fields(&self) -> Option<&Fields> {
        match self {
            Chunk::Record { fields, .. } | Chunk::Extend { fields, .. } => Some(fields),
            Chunk::Complete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Chunk::Complete)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn serialization() {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::Scalar(json!("Alice")));
        fields.insert("tags".into(), FieldValue::Scalar(json!(["a", "b"])));
        fields.insert("avatar".into(), FieldValue::Null);
        fields.insert(
            "bestFriend".into(),
            FieldValue::Reference {
                handle: Handle::new(0),
            },
        );
        fields.insert(
            "friends".into(),
            FieldValue::References {
                handles: vec![Some(Handle::new(0)), None],
            },
        );
        let chunks = vec![
            Chunk::Record {
                handle: Handle::new(1),
                stable_id: "100".to_string(),
                typename: "User".to_string(),
                fields,
            },
            Chunk::Extend {
                handle: Handle::new(1),
                fields: Fields::new(),
            },
            Chunk::Complete,
        ];

        assert_eq!(
            serde_json_bytes::to_value(&chunks).unwrap(),
            json!([
                {
                    "kind": "Record",
                    "handle": 1,
                    "stableId": "100",
                    "typename": "User",
                    "fields": {
                        "name": "Alice",
                        "tags": ["a", "b"],
                        "avatar": null,
                        "bestFriend": { "handle": 0 },
                        "friends": { "handles": [0, null] },
                    },
                },
                { "kind": "Extend", "handle": 1, "fields": {} },
                { "kind": "Complete" },
            ])
        );
    }

    #[test]
    fn referenced_handles() {
        let value = FieldValue::References {
            handles: vec![Some(Handle::new(2)), None, Some(Handle::new(0))],
        };
        assert_eq!(
            value.referenced_handles().collect::<Vec<_>>(),
            vec![Handle::new(2), Handle::new(0)]
        );
        assert_eq!(
            FieldValue::Reference {
                handle: Handle::new(4)
            }
            .referenced_handles()
            .collect::<Vec<_>>(),
            vec![Handle::new(4)]
        );
        assert_eq!(FieldValue::Null.referenced_handles().count(), 0);
    }
}
