//! Spec-driven decoding of evaluated attribute bags.
//!
//! A spec is an ordered list of [`AttrSpec`]s. [`decode`] checks an attribute
//! bag against it and fills in defaults; [`decode_into`] additionally
//! deserializes the result into a caller-supplied type.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;

use sluice_types::{Result, SluiceError};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    Any,
    String,
    /// Integer or float.
    Number,
    Integer,
    Bool,
    List(Box<AttrType>),
    Object,
}

impl AttrType {
    pub fn list(inner: AttrType) -> Self {
        AttrType::List(Box::new(inner))
    }

    fn check(&self, value: &Value) -> std::result::Result<(), String> {
        match (self, value) {
            (AttrType::Any, _)
            | (AttrType::String, Value::String(_))
            | (AttrType::Bool, Value::Bool(_))
            | (AttrType::Integer, Value::Integer(_))
            | (AttrType::Number, Value::Integer(_) | Value::Float(_))
            | (AttrType::Object, Value::Object(_)) => Ok(()),
            (AttrType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner
                        .check(item)
                        .map_err(|m| format!("element {i}: {m}"))?;
                }
                Ok(())
            }
            (expected, found) => Err(format!("expected {expected}, found {}", found.type_name())),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Any => write!(f, "any"),
            AttrType::String => write!(f, "string"),
            AttrType::Number => write!(f, "number"),
            AttrType::Integer => write!(f, "integer"),
            AttrType::Bool => write!(f, "bool"),
            AttrType::List(inner) => write!(f, "list({inner})"),
            AttrType::Object => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub name: String,
    pub ty: AttrType,
    pub required: bool,
    pub default: Option<Value>,
}

impl AttrSpec {
    pub fn required(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl fmt::Display for AttrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)?;
        match (&self.default, self.required) {
            (_, true) => write!(f, " (required)"),
            (Some(d), false) => write!(f, " = {d}"),
            (None, false) => Ok(()),
        }
    }
}

fn decode_error(context: &str, attribute: &str, message: impl Into<String>) -> SluiceError {
    SluiceError::ConfigDecodeError {
        context: context.to_string(),
        attribute: attribute.to_string(),
        message: message.into(),
    }
}

/// Validate `attributes` against `spec`, in spec order, applying defaults.
///
/// `null` counts as absent. Attributes the spec does not declare are
/// rejected after the declared ones have been checked.
pub fn decode(
    context: &str,
    spec: &[AttrSpec],
    attributes: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>> {
    let mut decoded = BTreeMap::new();

    for attr in spec {
        match attributes.get(&attr.name).filter(|v| !v.is_null()) {
            Some(value) => {
                attr.ty
                    .check(value)
                    .map_err(|m| decode_error(context, &attr.name, m))?;
                decoded.insert(attr.name.clone(), value.clone());
            }
            None if attr.required => {
                return Err(decode_error(context, &attr.name, "is required"));
            }
            None => {
                if let Some(default) = &attr.default {
                    decoded.insert(attr.name.clone(), default.clone());
                }
            }
        }
    }

    if let Some(unknown) = attributes
        .keys()
        .find(|k| !spec.iter().any(|s| &s.name == *k))
    {
        return Err(decode_error(context, unknown, "is not supported"));
    }

    Ok(decoded)
}

/// [`decode`], then deserialize the validated attributes into `T`.
pub fn decode_into<T: DeserializeOwned>(
    context: &str,
    spec: &[AttrSpec],
    attributes: &BTreeMap<String, Value>,
) -> Result<T> {
    let decoded = decode(context, spec, attributes)?;
    serde_json::from_value(Value::Object(decoded).to_json())
        .map_err(|e| decode_error(context, "*", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn attrs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn spec() -> Vec<AttrSpec> {
        vec![
            AttrSpec::required("value", AttrType::String),
            AttrSpec::optional("stop-after", AttrType::Integer).with_default(1),
            AttrSpec::optional("tags", AttrType::list(AttrType::String)),
        ]
    }

    #[test]
    fn applies_defaults() {
        let decoded = decode("constant", &spec(), &attrs(&[("value", "hi".into())])).unwrap();
        assert_eq!(decoded.get("stop-after"), Some(&Value::Integer(1)));
        assert!(!decoded.contains_key("tags"));
    }

    #[test]
    fn missing_required_is_named() {
        let err = decode("constant", &spec(), &attrs(&[("value", Value::Null)])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config for constant: attribute 'value' is required"
        );
    }

    #[test]
    fn type_mismatch_names_element() {
        let tags = Value::List(vec![Value::from("a"), Value::Integer(2)]);
        let err = decode(
            "constant",
            &spec(),
            &attrs(&[("value", "x".into()), ("tags", tags)]),
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("'tags' element 1: expected string, found number"));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let err = decode(
            "constant",
            &spec(),
            &attrs(&[("value", "x".into()), ("colour", "red".into())]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SluiceError::ConfigDecodeError { ref attribute, .. } if attribute == "colour"
        ));
    }

    #[test]
    fn decode_into_target_type() {
        #[derive(Deserialize)]
        #[serde(rename_all = "kebab-case")]
        struct Constant {
            value: String,
            stop_after: i64,
        }

        let c: Constant = decode_into("constant", &spec(), &attrs(&[("value", "x".into())])).unwrap();
        assert_eq!(c.value, "x");
        assert_eq!(c.stop_after, 1);
    }

    #[test]
    fn spec_display() {
        assert_eq!(spec()[0].to_string(), "value: string (required)");
        assert_eq!(spec()[1].to_string(), "stop-after: integer = 1");
        assert_eq!(spec()[2].to_string(), "tags: list(string)");
    }
}
