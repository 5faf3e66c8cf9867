//! The selection shape a response is normalized against.
//!
//! Shapes are produced by the query compiler and arrive here fully built: fragment
//! spreads are already inlined into type-conditioned [`InlineFragment`]s, so a shape
//! is a finite tree. A shape never changes during normalization and can be shared
//! between any number of runs.

mod storage_key;

use std::borrow::Cow;

use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Object;
pub(crate) use crate::shape::storage_key::storage_key;
pub use crate::shape::storage_key::stable_json;
use crate::type_condition::TypeCondition;

/// The root of a selection shape, applied to the root object of a response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionShape {
    /// Name of the operation this shape was compiled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The selections applied to the root object.
    pub selections: Vec<Selection>,
}

impl SelectionShape {
    pub fn new(selections: Vec<Selection>) -> Self {
        Self {
            name: None,
            selections,
        }
    }

    /// Parse a shape from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A node of a selection shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", tag = "kind")]
pub enum Selection {
    /// A field holding a scalar, an enum or a list of those.
    Scalar(ScalarField),

    /// A field holding an object or a list of objects.
    LinkedField(LinkedField),

    /// Selections that only apply when the object satisfies a type condition.
    InlineFragment(InlineFragment),

    /// A bookkeeping field that is read during traversal but never written out.
    Structural(StructuralField),
}

/// A scalar field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarField {
    /// An optional alias for the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The name of the field.
    pub name: String,

    /// The arguments of the field, part of its storage key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Argument>,
}

/// A field pointing to other objects.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedField {
    /// An optional alias for the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The name of the field.
    pub name: String,

    /// The arguments of the field, part of its storage key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Argument>,

    /// Whether the field holds a list of objects.
    #[serde(default)]
    pub plural: bool,

    /// The object type of the field, when it is statically known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete_type: Option<String>,

    /// The selections applied to the linked objects.
    pub selections: Vec<Selection>,
}

/// A type-conditioned group of selections.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragment {
    /// The type the object must satisfy.
    pub type_condition: String,

    /// Whether the type condition names an interface or a union.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// The selections from the fragment.
    pub selections: Vec<Selection>,
}

impl InlineFragment {
    pub fn condition(&self) -> TypeCondition<'_> {
        if self.is_abstract {
            TypeCondition::Abstract(&self.type_condition)
        } else {
            TypeCondition::Concrete(&self.type_condition)
        }
    }
}

/// A bookkeeping field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralField {
    #[serde(default)]
    pub name: String,
}

/// A field argument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: String,

    #[serde(flatten)]
    pub value: ArgumentValue,
}

/// The value of a field argument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", tag = "kind")]
pub enum ArgumentValue {
    /// A value written in the operation.
    Literal { value: serde_json::Value },

    /// A reference to an operation variable.
    #[serde(rename_all = "camelCase")]
    Variable { variable_name: String },
}

impl Argument {
    pub fn literal(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: ArgumentValue::Literal {
                value: value.into(),
            },
        }
    }

    pub fn variable(name: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ArgumentValue::Variable {
                variable_name: variable_name.into(),
            },
        }
    }
}

/// Shared accessors of the fields that carry data.
pub(crate) trait FieldSelection {
    fn name(&self) -> &str;
    fn alias(&self) -> Option<&str>;
    fn args(&self) -> &[Argument];

    /// The key the field's value is read from in the response.
    fn response_key(&self) -> &str {
        self.alias().unwrap_or_else(|| self.name())
    }

    /// The key the field's value is written to in the store.
    fn storage_key(&self, variables: &Object) -> Cow<'_, str> {
        storage_key(self.name(), self.args(), variables)
    }
}

impl FieldSelection for ScalarField {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    fn args(&self) -> &[Argument] {
        &self.args
    }
}

impl FieldSelection for LinkedField {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    fn args(&self) -> &[Argument] {
        &self.args
    }
}
