//! Unit and group resolution.
//!
//! A unit is resolved in three phases, each composing its scope onto the
//! previous one:
//!
//! 1. `value` blocks            (base -> values)
//! 2. resource declarations     (values -> namespace)
//! 3. pipelines, plugins and top-level options
//!
//! A group is a sequence of units resolved independently against the same
//! base scope and concatenated in order.

use std::collections::BTreeMap;

use tracing::debug;

use sluice_lang::{decode, evaluate_attributes, parse, AttrSpec, AttrType, Body, Scope, Value};
use sluice_types::{Result, SluiceError};

use crate::model::{PipelineDescription, PluginSource, Role};
use crate::pipelines::resolve_pipelines;
use crate::resources::Namespace;
use crate::values::load_values;

const PIPELINE_BLOCK: &str = "pipeline";
const PLUGIN_BLOCK: &str = "plugin";

/// Top-level attributes of a unit.
pub fn options_spec() -> Vec<AttrSpec> {
    vec![
        AttrSpec::optional("stop-after", AttrType::Integer).with_default(0),
        AttrSpec::optional("exit-on-error", AttrType::Bool).with_default(false),
    ]
}

fn plugin_spec() -> Vec<AttrSpec> {
    vec![AttrSpec::required("source", AttrType::String)]
}

fn phase_error(file: &str, phase: &'static str, scope: &Scope, source: SluiceError) -> SluiceError {
    SluiceError::Phase {
        file: file.to_string(),
        phase,
        scope: scope.variable_names(),
        source: Box::new(source),
    }
}

fn check_block_types(body: &Body) -> Result<()> {
    for block in &body.blocks {
        let known = block.ident == Role::Value.keyword()
            || block.ident == PIPELINE_BLOCK
            || block.ident == PLUGIN_BLOCK
            || Role::from_resource_keyword(&block.ident).is_some();
        if !known {
            return Err(SluiceError::InvalidBlock {
                block: block.ident.clone(),
                message: "unknown block type".into(),
            });
        }
    }
    Ok(())
}

fn resolve_options(body: &Body, scope: &Scope) -> Result<(u64, bool)> {
    let attributes = evaluate_attributes(&body.attributes, scope)?;
    let options = decode("top-level options", &options_spec(), &attributes)?;

    let stop_after = match options.get("stop-after") {
        Some(Value::Integer(n)) => u64::try_from(*n).map_err(|_| SluiceError::ConfigDecodeError {
            context: "top-level options".into(),
            attribute: "stop-after".into(),
            message: format!("must not be negative, found {n}"),
        })?,
        _ => 0,
    };
    let exit_on_error = matches!(options.get("exit-on-error"), Some(Value::Bool(true)));
    Ok((stop_after, exit_on_error))
}

fn plugin_sources(body: &Body, scope: &Scope) -> Result<Vec<PluginSource>> {
    let spec = plugin_spec();
    let mut plugins = Vec::new();
    for block in body.blocks_of(PLUGIN_BLOCK) {
        let name = match block.labels.as_slice() {
            [name] => name.clone(),
            labels => {
                return Err(SluiceError::InvalidBlock {
                    block: PLUGIN_BLOCK.into(),
                    message: format!("expected exactly one label, found {}", labels.len()),
                })
            }
        };
        let attributes = sluice_lang::evaluate_flat_body(PLUGIN_BLOCK, &block.body, scope)?;
        let decoded: BTreeMap<String, Value> =
            decode(&format!("plugin '{name}'"), &spec, &attributes)?;
        let source = decoded
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        plugins.push(PluginSource { name, source });
    }
    Ok(plugins)
}

/// Resolve one source text into a [`PipelineDescription`].
///
/// `filename` only labels errors. Failures after parsing are wrapped in
/// [`SluiceError::Phase`] with the names visible in the failing phase's scope.
pub fn resolve_unit(filename: &str, text: &str, base: &Scope) -> Result<PipelineDescription> {
    debug!(file = filename, "resolving unit");
    let body = parse(filename, text)?;
    check_block_types(&body).map_err(|e| phase_error(filename, "blocks", base, e))?;

    let values = load_values(&body, base).map_err(|e| phase_error(filename, "values", base, e))?;
    let values_scope = Scope::compose(base, &values);

    let namespace = Namespace::build(&body, &values_scope)
        .map_err(|e| phase_error(filename, "resources", &values_scope, e))?;
    let scope = Scope::compose(&values_scope, namespace.scope());
    debug!(file = filename, resources = namespace.len(), "namespace built");

    let pipelines = resolve_pipelines(&body, &namespace, &scope)
        .map_err(|e| phase_error(filename, "pipelines", &scope, e))?;
    let plugins =
        plugin_sources(&body, &scope).map_err(|e| phase_error(filename, "plugins", &scope, e))?;
    let (stop_after, exit_on_error) =
        resolve_options(&body, &scope).map_err(|e| phase_error(filename, "options", &scope, e))?;

    debug!(file = filename, pipelines = pipelines.len(), "unit resolved");
    Ok(PipelineDescription {
        remote_producers: namespace.remote_producers,
        producers: namespace.producers,
        consumers: namespace.consumers,
        transformers: namespace.transformers,
        pipelines,
        plugins,
        stop_after,
        exit_on_error,
    })
}

/// Resolve `(name, text)` fragments in order against the same base scope and
/// concatenate the results. The first failing fragment aborts the group.
pub fn resolve_group<I, N, T>(fragments: I, base: &Scope) -> Result<PipelineDescription>
where
    I: IntoIterator<Item = (N, T)>,
    N: AsRef<str>,
    T: AsRef<str>,
{
    let mut description = PipelineDescription::default();
    for (name, text) in fragments {
        let name = name.as_ref();
        let fragment = resolve_unit(name, text.as_ref(), base).map_err(|e| {
            SluiceError::Fragment {
                fragment: name.to_string(),
                source: Box::new(e),
            }
        })?;
        description.merge(fragment);
    }
    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_decoded() {
        let desc = resolve_unit("o.sluice", "stop-after = 10\nexit-on-error = true", &Scope::empty())
            .unwrap();
        assert_eq!(desc.stop_after, 10);
        assert!(desc.exit_on_error);
    }

    #[test]
    fn negative_stop_after_is_rejected() {
        let err = resolve_unit("o.sluice", "stop-after = -1", &Scope::empty()).unwrap_err();
        assert!(matches!(err.root(), SluiceError::ConfigDecodeError { .. }));
    }

    #[test]
    fn unknown_top_level_attribute_is_rejected() {
        let err = resolve_unit("o.sluice", "colour = \"red\"", &Scope::empty()).unwrap_err();
        assert!(matches!(
            err.root(),
            SluiceError::ConfigDecodeError { attribute, .. } if attribute == "colour"
        ));
    }

    #[test]
    fn unknown_block_is_rejected() {
        let err = resolve_unit("o.sluice", "widget \"x\" {}", &Scope::empty()).unwrap_err();
        assert!(matches!(err, SluiceError::Phase { phase: "blocks", .. }));
    }

    #[test]
    fn plugin_blocks_are_recorded() {
        let desc = resolve_unit(
            "o.sluice",
            "plugin \"psyduck\" { source = \"/std.so\" }",
            &Scope::empty(),
        )
        .unwrap();
        assert_eq!(
            desc.plugins,
            vec![PluginSource {
                name: "psyduck".into(),
                source: "/std.so".into()
            }]
        );
    }

    #[test]
    fn phase_error_lists_visible_names() {
        let base = Scope::builder().variable("env", "prod").build();
        let src = "produce \"http\" \"a\" {}\npipeline \"p\" {\n produce = [produce.http.zzz]\n consume = []\n}";
        let err = resolve_unit("o.sluice", src, &base).unwrap_err();
        match &err {
            SluiceError::Phase { phase, scope, .. } => {
                assert_eq!(*phase, "pipelines");
                assert!(scope.contains(&"env".to_string()));
                assert!(scope.contains(&"produce".to_string()));
                assert!(scope.contains(&"value".to_string()));
            }
            other => panic!("expected Phase, got {other:?}"),
        }
        assert!(matches!(
            err.root(),
            SluiceError::UnknownVariable { name } if name == "produce.http.zzz"
        ));
    }
}
