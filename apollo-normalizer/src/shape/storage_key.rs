use std::borrow::Cow;
use std::fmt::Write;

use serde_json_bytes::ByteString;

use super::Argument;
use super::ArgumentValue;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Compute the key a field is stored under.
///
/// Fields without arguments are stored under their name. Otherwise the
/// arguments that resolve to a non null value are appended, sorted by name, as
/// `name(first:10,orderBy:{"field":"NAME"})`.
pub(crate) fn storage_key<'a>(
    name: &'a str,
    args: &[Argument],
    variables: &Object,
) -> Cow<'a, str> {
    let mut resolved: Vec<(&str, Value)> = args
        .iter()
        .filter_map(|arg| {
            let value = match &arg.value {
                ArgumentValue::Literal { value } => Value::from(value.clone()),
                ArgumentValue::Variable { variable_name } => variables
                    .get(variable_name.as_str())
                    .cloned()
                    .unwrap_or(Value::Null),
            };
            (!value.is_null()).then_some((arg.name.as_str(), value))
        })
        .collect();

    if resolved.is_empty() {
        return Cow::Borrowed(name);
    }
    resolved.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut key = String::with_capacity(name.len() + 16 * resolved.len());
    key.push_str(name);
    key.push('(');
    for (i, (arg_name, value)) in resolved.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(arg_name);
        key.push(':');
        write_stable_json(&mut key, value);
    }
    key.push(')');
    Cow::Owned(key)
}

/// Render a value as JSON with object keys sorted, so that equal values always
/// produce the same text regardless of the order their keys were written in.
pub fn stable_json(value: &Value) -> String {
    let mut out = String::new();
    write_stable_json(&mut out, value);
    out
}

fn write_stable_json(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(values) => {
            out.push('[');
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable_json(out, value);
            }
            out.push(']');
        }
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_stable_json(out, value);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &ByteString) {
    // serializing a string cannot fail
    out.push_str(&serde_json::to_string(s.as_str()).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json_bytes::json;

    use super::*;

    fn variables() -> Object {
        json!({
            "count": 5,
            "order": { "field": "NAME", "direction": "ASC" },
            "nothing": null,
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[rstest]
    #[case::no_arguments(vec![], "friends")]
    #[case::literal(vec![Argument::literal("first", 10)], "friends(first:10)")]
    #[case::sorted(
        vec![Argument::literal("first", 10), Argument::literal("after", "cursor:1")],
        r#"friends(after:"cursor:1",first:10)"#
    )]
    #[case::variable(vec![Argument::variable("first", "count")], "friends(first:5)")]
    #[case::object_keys_sorted(
        vec![Argument::variable("orderBy", "order")],
        r#"friends(orderBy:{"direction":"ASC","field":"NAME"})"#
    )]
    #[case::null_literal_omitted(vec![Argument::literal("first", serde_json::Value::Null)], "friends")]
    #[case::null_variable_omitted(
        vec![Argument::variable("first", "nothing"), Argument::literal("last", 2)],
        "friends(last:2)"
    )]
    #[case::missing_variable_omitted(vec![Argument::variable("first", "undeclared")], "friends")]
    fn computes_storage_keys(#[case] args: Vec<Argument>, #[case] expected: &str) {
        assert_eq!(storage_key("friends", &args, &variables()), expected);
    }

    #[test]
    fn borrows_the_name_without_arguments() {
        assert!(matches!(
            storage_key("name", &[], &Object::new()),
            Cow::Borrowed("name")
        ));
    }

    #[test]
    fn escapes_strings() {
        assert_eq!(
            stable_json(&json!({ "b": "say \"hi\"", "a": [true, null] })),
            r#"{"a":[true,null],"b":"say \"hi\""}"#
        );
    }
}
