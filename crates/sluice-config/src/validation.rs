//! Lint rules over a resolved [`PipelineDescription`].
//!
//! Resolution already guarantees every reference exists. These rules catch
//! descriptions that resolve but cannot run as intended. Call [`validate`] for
//! advisory diagnostics or [`validate_or_raise`] to fail on any
//! `Error`-severity issue.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use sluice_types::{Result, SluiceError};

use crate::model::{Pipeline, PipelineDescription, Resource, Role};

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub pipeline: Option<String>,
    pub resource: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, description: &PipelineDescription) -> Vec<Diagnostic>;
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct PipelineHasProducerRule;
impl LintRule for PipelineHasProducerRule {
    fn name(&self) -> &str {
        "pipeline_has_producer"
    }
    fn apply(&self, description: &PipelineDescription) -> Vec<Diagnostic> {
        description
            .pipelines
            .iter()
            .filter(|p| p.producers.is_empty())
            .map(|p| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!("Pipeline '{}' has no producers", p.name),
                pipeline: Some(p.name.clone()),
                resource: None,
                fix: Some("Add at least one reference to the pipeline's 'produce' list".into()),
            })
            .collect()
    }
}

struct PipelineHasConsumerRule;
impl LintRule for PipelineHasConsumerRule {
    fn name(&self) -> &str {
        "pipeline_has_consumer"
    }
    fn apply(&self, description: &PipelineDescription) -> Vec<Diagnostic> {
        description
            .pipelines
            .iter()
            .filter(|p| p.consumers.is_empty())
            .map(|p| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!("Pipeline '{}' has no consumers", p.name),
                pipeline: Some(p.name.clone()),
                resource: None,
                fix: Some("Add at least one reference to the pipeline's 'consume' list".into()),
            })
            .collect()
    }
}

struct RoleMatchesSlotRule;
impl RoleMatchesSlotRule {
    fn check(
        &self,
        pipeline: &Pipeline,
        slot: &str,
        resources: &[Arc<Resource>],
        accepts: fn(Role) -> bool,
    ) -> Vec<Diagnostic> {
        resources
            .iter()
            .filter(|r| !accepts(r.role))
            .map(|r| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!(
                    "Pipeline '{}' lists {} resource '{}' under '{slot}'",
                    pipeline.name,
                    r.role,
                    r.qualified_name()
                ),
                pipeline: Some(pipeline.name.clone()),
                resource: Some(r.qualified_name()),
                fix: Some(format!("Move '{}' to the '{}' list", r.qualified_name(), r.role)),
            })
            .collect()
    }
}

impl LintRule for RoleMatchesSlotRule {
    fn name(&self) -> &str {
        "role_matches_slot"
    }
    fn apply(&self, description: &PipelineDescription) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for p in &description.pipelines {
            diags.extend(self.check(p, "produce", &p.producers, Role::is_producer));
            diags.extend(self.check(p, "transform", &p.transformers, |r| r == Role::Transform));
            diags.extend(self.check(p, "consume", &p.consumers, |r| r == Role::Consume));
        }
        diags
    }
}

struct UnusedResourceRule;
impl LintRule for UnusedResourceRule {
    fn name(&self) -> &str {
        "unused_resource"
    }
    fn apply(&self, description: &PipelineDescription) -> Vec<Diagnostic> {
        if description.pipelines.is_empty() {
            return vec![]; // HasPipelinesRule reports this case
        }
        let used: HashSet<String> = description
            .pipelines
            .iter()
            .flat_map(Pipeline::resources)
            .map(|r| r.qualified_name())
            .collect();

        description
            .resources()
            .map(|r| r.qualified_name())
            .filter(|name| !used.contains(name))
            .map(|name| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("Resource '{name}' is declared but no pipeline uses it"),
                pipeline: None,
                fix: Some(format!("Reference '{name}' from a pipeline or remove it")),
                resource: Some(name),
            })
            .collect()
    }
}

struct HasPipelinesRule;
impl LintRule for HasPipelinesRule {
    fn name(&self) -> &str {
        "has_pipelines"
    }
    fn apply(&self, description: &PipelineDescription) -> Vec<Diagnostic> {
        let declared = description.resources().count();
        if description.pipelines.is_empty() && declared > 0 {
            vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Info,
                message: format!("{declared} resource(s) declared but no pipeline"),
                pipeline: None,
                resource: None,
                fix: Some("Add a pipeline block that references the resources".into()),
            }]
        } else {
            vec![]
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all built-in lint rules and return every diagnostic.
pub fn validate(description: &PipelineDescription) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(PipelineHasProducerRule),
        Box::new(PipelineHasConsumerRule),
        Box::new(RoleMatchesSlotRule),
        Box::new(UnusedResourceRule),
        Box::new(HasPipelinesRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(description));
    }
    diagnostics
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise(description: &PipelineDescription) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(description);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(SluiceError::ValidationError(errors.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
