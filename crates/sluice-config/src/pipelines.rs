//! Phase 3: `pipeline` blocks.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use sluice_lang::{
    decode_into, evaluate_flat_body, AttrSpec, AttrType, Body, Expression, Scope, Value,
};
use sluice_types::{Result, SluiceError};

use crate::model::{Pipeline, Resource, Role};
use crate::resources::Namespace;

/// Attributes accepted inside a `pipeline` block.
pub fn pipeline_spec() -> Vec<AttrSpec> {
    vec![
        AttrSpec::required("produce", AttrType::list(AttrType::String)),
        AttrSpec::required("consume", AttrType::list(AttrType::String)),
        AttrSpec::optional("transform", AttrType::list(AttrType::String))
            .with_default(Value::List(Vec::new())),
    ]
}

#[derive(Debug, Deserialize)]
struct References {
    produce: Vec<String>,
    consume: Vec<String>,
    transform: Vec<String>,
}

fn lookup_all(
    pipeline: &str,
    references: &[String],
    namespace: &Namespace,
) -> Result<Vec<Arc<Resource>>> {
    references
        .iter()
        .map(|reference| {
            namespace
                .lookup(reference)
                .cloned()
                .ok_or_else(|| SluiceError::UnresolvedReference {
                    pipeline: pipeline.to_string(),
                    reference: reference.clone(),
                })
        })
        .collect()
}

/// The reference written in `body` that the failing variable path belongs
/// to, so `produce.nope.x` is reported whole rather than as `produce.nope`.
fn written_reference(body: &Body, path: &str) -> Option<String> {
    body.attributes
        .iter()
        .flat_map(|attr| match &attr.expr {
            Expression::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        })
        .find_map(|expr| match expr {
            Expression::Traversal(segments) => {
                let joined = segments.join(".");
                let matches = joined
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'));
                matches.then_some(joined)
            }
            _ => None,
        })
}

/// Resolve every `pipeline` block in declaration order. The first reference
/// that is not in `namespace` fails the whole phase.
pub fn resolve_pipelines(body: &Body, namespace: &Namespace, scope: &Scope) -> Result<Vec<Pipeline>> {
    let spec = pipeline_spec();
    let mut seen = HashSet::new();
    let mut pipelines = Vec::new();

    for block in body.blocks_of("pipeline") {
        let name = match block.labels.as_slice() {
            [name] => name.clone(),
            labels => {
                return Err(SluiceError::InvalidBlock {
                    block: "pipeline".into(),
                    message: format!("expected exactly one label, found {}", labels.len()),
                })
            }
        };
        if !seen.insert(name.clone()) {
            return Err(SluiceError::DuplicateDeclaration {
                name: format!("pipeline.{name}"),
            });
        }

        // a bare traversal into the resource namespace fails during evaluation
        let attributes = evaluate_flat_body("pipeline", &block.body, scope).map_err(|e| match e {
            SluiceError::UnknownVariable { name: path }
                if path
                    .split('.')
                    .next()
                    .and_then(Role::from_resource_keyword)
                    .is_some() =>
            {
                SluiceError::UnresolvedReference {
                    pipeline: name.clone(),
                    reference: written_reference(&block.body, &path).unwrap_or(path),
                }
            }
            other => other,
        })?;
        let references: References =
            decode_into(&format!("pipeline '{name}'"), &spec, &attributes)?;

        let pipeline = Pipeline {
            producers: lookup_all(&name, &references.produce, namespace)?,
            transformers: lookup_all(&name, &references.transform, namespace)?,
            consumers: lookup_all(&name, &references.consume, namespace)?,
            name,
        };
        debug!(
            pipeline = %pipeline.name,
            producers = pipeline.producers.len(),
            transformers = pipeline.transformers.len(),
            consumers = pipeline.consumers.len(),
            "resolved pipeline"
        );
        pipelines.push(pipeline);
    }

    Ok(pipelines)
}
