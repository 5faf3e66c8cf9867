//! Type condition evaluation against response objects.

use std::collections::HashMap;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// The type condition of an inline fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCondition<'a> {
    /// An object type: satisfied only by objects of exactly that type.
    Concrete(&'a str),
    /// An interface or a union.
    Abstract(&'a str),
}

impl TypeCondition<'_> {
    pub fn type_name(&self) -> &str {
        match self {
            TypeCondition::Concrete(name) | TypeCondition::Abstract(name) => name,
        }
    }
}

/// What a response object discloses about its own type.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeType<'a> {
    /// The typename of the object, if the response or the selection declares one.
    pub typename: Option<&'a str>,
    /// The object itself, which may carry `__isX` markers for abstract types.
    pub object: &'a Object,
}

/// The condition could not be decided from the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Undecidable;

/// Name of the marker a response carries for an abstract type, `__isNode` for `Node`.
pub fn abstract_marker(type_name: &str) -> String {
    format!("__is{type_name}")
}

/// Decide whether an object satisfies a type condition.
///
/// Concrete conditions compare typenames and need one to be known. Abstract
/// conditions are decided by the `__isX` marker the server adds for them: a non
/// null marker means the object implements the type. Without a marker, the known
/// `possible_types` of the abstract type are checked against the typename.
pub fn evaluate(
    condition: TypeCondition<'_>,
    runtime: RuntimeType<'_>,
    possible_types: &HashMap<String, Vec<String>>,
) -> Result<bool, Undecidable> {
    match condition {
        TypeCondition::Concrete(name) => match runtime.typename {
            Some(typename) => Ok(typename == name),
            None => Err(Undecidable),
        },
        TypeCondition::Abstract(name) => {
            if let Some(marker) = runtime.object.get(abstract_marker(name).as_str()) {
                return Ok(!matches!(marker, Value::Null));
            }
            match runtime.typename {
                Some(typename) if typename == name => Ok(true),
                Some(typename) => Ok(possible_types
                    .get(name)
                    .map(|types| types.iter().any(|t| t == typename))
                    .unwrap_or(false)),
                None => Err(Undecidable),
            }
        }
    }
}
