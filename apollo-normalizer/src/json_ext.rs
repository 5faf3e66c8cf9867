//! Performance oriented JSON manipulation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extension trait for [`serde_json_bytes::Value`].
pub(crate) trait ValueExt {
    /// Name of the JSON type of this value, for error messages.
    fn json_type_name(&self) -> &'static str;

    /// Render a scalar the way it should appear inside an identity or a storage key.
    ///
    /// Strings are used verbatim, every other value is rendered as JSON text.
    fn to_key_text(&self) -> String;
}

impl ValueExt for Value {
    fn json_type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "object",
        }
    }

    fn to_key_text(&self) -> String {
        match self {
            Value::String(s) => s.as_str().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            // serializing a `Value` cannot fail
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

/// A path element inside a [`Path`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index path element.
    Index(usize),

    /// A key path element.
    Key(String),
}

/// A path into the response, used to locate the object a failure or a log line refers to.
///
/// Displayed as its elements joined with `/`, for example `me/friends/0`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn push_key(&mut self, key: impl Into<String>) {
        self.0.push(PathElement::Key(key.into()))
    }

    pub(crate) fn push_index(&mut self, index: usize) {
        self.0.push(PathElement::Index(index))
    }

    pub(crate) fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, element) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn path_display() {
        let mut path = Path::empty();
        assert_eq!(path.to_string(), "<root>");
        path.push_key("me");
        path.push_key("friends");
        path.push_index(3);
        assert_eq!(path.to_string(), "me/friends/3");
        assert_eq!(path.pop(), Some(PathElement::Index(3)));
        assert_eq!(path.to_string(), "me/friends");
    }

    #[test]
    fn path_serializes_as_a_list() {
        let mut path = Path::empty();
        path.push_key("nodes");
        path.push_index(0);
        assert_eq!(
            serde_json_bytes::to_value(&path).unwrap(),
            json!(["nodes", 0])
        );
    }

    #[test]
    fn key_text() {
        assert_eq!(json!("100").to_key_text(), "100");
        assert_eq!(json!(100).to_key_text(), "100");
        assert_eq!(json!(true).to_key_text(), "true");
        assert_eq!(json!({"a": [1, "b"]}).to_key_text(), r#"{"a":[1,"b"]}"#);
    }
}
