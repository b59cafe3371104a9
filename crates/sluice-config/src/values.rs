//! Phase 1: the `value { ... }` blocks.

use std::collections::BTreeMap;

use sluice_lang::{Body, Scope, Value};
use sluice_types::{Result, SluiceError};

use crate::model::Role;

/// Evaluate every `value` block, in order, into a scope holding a single
/// `value` object. Each attribute may reference values declared before it.
///
/// The returned scope has no parent; compose it onto `base` to use it.
pub fn load_values(body: &Body, base: &Scope) -> Result<Scope> {
    let keyword = Role::Value.keyword();
    let mut values: BTreeMap<String, Value> = BTreeMap::new();

    for block in body.blocks_of(keyword) {
        if !block.labels.is_empty() {
            return Err(SluiceError::InvalidBlock {
                block: keyword.into(),
                message: format!("takes no labels, found {}", block.labels.len()),
            });
        }
        if let Some(nested) = block.body.blocks.first() {
            return Err(SluiceError::InvalidBlock {
                block: keyword.into(),
                message: format!("nested '{}' blocks are not supported", nested.ident),
            });
        }

        for attribute in &block.body.attributes {
            let so_far = Scope::builder()
                .variable(keyword, Value::Object(values.clone()))
                .build();
            let value = attribute.expr.evaluate(&Scope::compose(base, &so_far))?;
            if values.insert(attribute.key.clone(), value).is_some() {
                return Err(SluiceError::DuplicateDeclaration {
                    name: format!("{keyword}.{}", attribute.key),
                });
            }
        }
    }

    Ok(Scope::builder()
        .variable(keyword, Value::Object(values))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_lang::parse;

    #[test]
    fn later_values_see_earlier_ones() {
        let body = parse(
            "v.sluice",
            "value {\n host = \"example.org\"\n url = \"https://${value.host}/\"\n}\nvalue { port = 443 }",
        )
        .unwrap();
        let scope = load_values(&body, &Scope::empty()).unwrap();
        let value = scope.variable("value").unwrap().as_object().unwrap();
        assert_eq!(value.get("url"), Some(&Value::from("https://example.org/")));
        assert_eq!(value.get("port"), Some(&Value::Integer(443)));
    }

    #[test]
    fn forward_reference_fails() {
        let body = parse("v.sluice", "value {\n a = value.b\n b = 1\n}").unwrap();
        let err = load_values(&body, &Scope::empty()).unwrap_err();
        assert!(matches!(err, SluiceError::UnknownVariable { ref name } if name == "value.b"));
    }

    #[test]
    fn duplicate_value_is_rejected() {
        let body = parse("v.sluice", "value { a = 1 }\nvalue { a = 2 }").unwrap();
        let err = load_values(&body, &Scope::empty()).unwrap_err();
        assert!(matches!(err, SluiceError::DuplicateDeclaration { ref name } if name == "value.a"));
    }

    #[test]
    fn no_value_blocks_gives_empty_object() {
        let body = parse("v.sluice", "").unwrap();
        let scope = load_values(&body, &Scope::empty()).unwrap();
        assert_eq!(scope.variable("value"), Some(&Value::Object(BTreeMap::new())));
    }
}
