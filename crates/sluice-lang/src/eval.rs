use std::collections::BTreeMap;

use sluice_types::{Result, SluiceError};

use crate::ast::{Attribute, Body, Expression, TemplatePart};
use crate::scope::Scope;
use crate::value::Value;

impl Expression {
    /// Evaluate against `scope`. Variables and functions are looked up
    /// through the scope's parent chain.
    pub fn evaluate(&self, scope: &Scope) -> Result<Value> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Template(parts) => evaluate_template(parts, scope),
            Expression::Traversal(path) => traverse(path, scope),
            Expression::Call { name, args } => {
                let function = scope
                    .function(name)
                    .ok_or_else(|| SluiceError::UnknownFunction { name: name.clone() })?;
                let args = args
                    .iter()
                    .map(|a| a.evaluate(scope))
                    .collect::<Result<Vec<_>>>()?;
                (**function)(&args)
            }
            Expression::Array(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|e| e.evaluate(scope))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Expression::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, expr) in entries {
                    if map.insert(key.clone(), expr.evaluate(scope)?).is_some() {
                        return Err(SluiceError::EvaluationError(format!(
                            "duplicate object key '{key}'"
                        )));
                    }
                }
                Ok(Value::Object(map))
            }
        }
    }
}

fn traverse(path: &[String], scope: &Scope) -> Result<Value> {
    let (root, rest) = path
        .split_first()
        .ok_or_else(|| SluiceError::EvaluationError("empty variable path".into()))?;
    let mut current = scope
        .variable(root)
        .ok_or_else(|| SluiceError::UnknownVariable { name: root.clone() })?;

    for (i, segment) in rest.iter().enumerate() {
        let unknown = || SluiceError::UnknownVariable {
            name: path[..i + 2].join("."),
        };
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(unknown)?,
            Value::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .ok_or_else(unknown)?,
            other => {
                return Err(SluiceError::EvaluationError(format!(
                    "cannot access '{segment}' on {} value '{}'",
                    other.type_name(),
                    path[..i + 1].join(".")
                )))
            }
        };
    }
    Ok(current.clone())
}

fn evaluate_template(parts: &[TemplatePart], scope: &Scope) -> Result<Value> {
    // "${expr}" on its own keeps the type of expr
    if let [TemplatePart::Interpolation(expr)] = parts {
        return expr.evaluate(scope);
    }

    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => out.push_str(s),
            TemplatePart::Interpolation(expr) => match expr.evaluate(scope)? {
                Value::String(s) => out.push_str(&s),
                scalar @ (Value::Integer(_) | Value::Float(_) | Value::Bool(_)) => {
                    out.push_str(&scalar.to_string())
                }
                other => {
                    return Err(SluiceError::EvaluationError(format!(
                        "cannot interpolate a {} value into a string",
                        other.type_name()
                    )))
                }
            },
        }
    }
    Ok(Value::String(out))
}

/// Evaluate an attribute list into an attribute bag. Duplicate keys are
/// rejected.
pub fn evaluate_attributes(
    attributes: &[Attribute],
    scope: &Scope,
) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for attribute in attributes {
        let value = attribute.expr.evaluate(scope)?;
        if out.insert(attribute.key.clone(), value).is_some() {
            return Err(SluiceError::DuplicateDeclaration {
                name: attribute.key.clone(),
            });
        }
    }
    Ok(out)
}

/// Like [`evaluate_attributes`], for a block body that must not contain
/// nested blocks.
pub fn evaluate_flat_body(
    block: &str,
    body: &Body,
    scope: &Scope,
) -> Result<BTreeMap<String, Value>> {
    if let Some(nested) = body.blocks.first() {
        return Err(SluiceError::InvalidBlock {
            block: block.to_string(),
            message: format!("nested '{}' blocks are not supported", nested.ident),
        });
    }
    evaluate_attributes(&body.attributes, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn scope() -> Scope {
        let mut http = BTreeMap::new();
        http.insert("a".to_string(), Value::from("produce.http.a"));
        let mut produce = BTreeMap::new();
        produce.insert("http".to_string(), Value::Object(http));

        Scope::builder()
            .variable("produce", Value::Object(produce))
            .variable("tags", Value::List(vec![Value::from("x"), Value::from("y")]))
            .variable("port", 8080)
            .function("upper", |args: &[Value]| match args {
                [Value::String(s)] => Ok(Value::String(s.to_uppercase())),
                _ => Err(SluiceError::FunctionError {
                    function: "upper".into(),
                    message: "expects one string".into(),
                }),
            })
            .build()
    }

    fn eval(src: &str) -> Result<Value> {
        let body = parse("test.sluice", &format!("x = {src}"))?;
        body.attributes[0].expr.evaluate(&scope())
    }

    #[test]
    fn traversal_resolves_qualified_name() {
        assert_eq!(eval("produce.http.a").unwrap(), Value::from("produce.http.a"));
        assert_eq!(eval("tags.1").unwrap(), Value::from("y"));
    }

    #[test]
    fn unknown_traversal_names_full_path() {
        let err = eval("produce.http.zzz").unwrap_err();
        assert!(matches!(err, SluiceError::UnknownVariable { ref name } if name == "produce.http.zzz"));

        let err = eval("nothing.here").unwrap_err();
        assert!(matches!(err, SluiceError::UnknownVariable { ref name } if name == "nothing"));
    }

    #[test]
    fn template_interpolates_scalars() {
        assert_eq!(
            eval(r#""listen on ${port} as ${upper("svc")}""#).unwrap(),
            Value::from("listen on 8080 as SVC")
        );
        assert_eq!(eval(r#""${tags}""#).unwrap().as_list().map(|l| l.len()), Some(2));
        assert!(eval(r#""tags: ${tags}""#).is_err());
    }

    #[test]
    fn unknown_function_is_reported() {
        let err = eval("missing(1)").unwrap_err();
        assert!(matches!(err, SluiceError::UnknownFunction { ref name } if name == "missing"));
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let body = parse("t.sluice", "a = 1\na = 2").unwrap();
        let err = evaluate_attributes(&body.attributes, &Scope::empty()).unwrap_err();
        assert!(matches!(err, SluiceError::DuplicateDeclaration { ref name } if name == "a"));
    }

    #[test]
    fn flat_body_rejects_nested_blocks() {
        let body = parse("t.sluice", "inner { a = 1 }").unwrap();
        let err = evaluate_flat_body("value", &body, &Scope::empty()).unwrap_err();
        assert!(matches!(err, SluiceError::InvalidBlock { .. }));
    }
}
