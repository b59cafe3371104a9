//! Resolution of Sluice sources into pipeline descriptions.
//!
//! Source text is resolved in phases (values, resources, pipelines) into a
//! [`PipelineDescription`] whose pipelines hold shared references to the
//! declared resources. Several sources can be resolved as a group and
//! concatenated, and lint rules check a resolved description for pipelines
//! that would not run as intended.

pub mod model;
pub mod pipelines;
pub mod resolve;
pub mod resources;
pub mod source;
pub mod validation;
pub mod values;

pub use model::{qualified_name, Pipeline, PipelineDescription, PluginSource, Resource, Role};
pub use pipelines::pipeline_spec;
pub use resolve::{options_spec, resolve_group, resolve_unit};
pub use resources::Namespace;
pub use source::{read_directory, read_fragments, resolve_path, FILE_EXTENSION};
pub use validation::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
pub use values::load_values;
