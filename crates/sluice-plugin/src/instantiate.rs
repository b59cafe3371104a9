use std::fmt;

use tracing::debug;

use sluice_config::{Pipeline, PipelineDescription, Resource};
use sluice_lang::Scope;
use sluice_types::Result;

use crate::capability::Capability;
use crate::library::Library;
use crate::provider::{Consumer, Producer, Transformer};

/// A resolved pipeline with every resource provisioned.
pub struct PipelineInstance {
    pub name: String,
    pub producers: Vec<Box<dyn Producer>>,
    pub transformers: Vec<Box<dyn Transformer>>,
    pub consumers: Vec<Box<dyn Consumer>>,
}

impl fmt::Debug for PipelineInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineInstance")
            .field("name", &self.name)
            .field("producers", &self.producers.len())
            .field("transformers", &self.transformers.len())
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

/// Whether `resource` was declared under the role that `slot` provisions.
/// A mismatch still provisions when the plugin supports the slot.
fn declared_for(resource: &Resource, slot: Capability) -> bool {
    Capability::for_role(resource.role) == Some(slot)
}

fn provisioning(pipeline: &Pipeline, resource: &Resource, slot: Capability) {
    if !declared_for(resource, slot) {
        tracing::warn!(
            pipeline = %pipeline.name,
            resource = %resource.qualified_name(),
            slot = %slot,
            "resource declared as {} is provisioned as a {}",
            resource.role,
            slot
        );
    }
    debug!(pipeline = %pipeline.name, resource = %resource.qualified_name(), "provisioning {slot}");
}

impl Library {
    /// Provision every resource of `pipeline` by its `kind`. Resources in the
    /// produce list become producers, and likewise for transform and consume.
    pub fn instantiate(&self, pipeline: &Pipeline, scope: &Scope) -> Result<PipelineInstance> {
        let mut instance = PipelineInstance {
            name: pipeline.name.clone(),
            producers: Vec::with_capacity(pipeline.producers.len()),
            transformers: Vec::with_capacity(pipeline.transformers.len()),
            consumers: Vec::with_capacity(pipeline.consumers.len()),
        };

        for resource in &pipeline.producers {
            provisioning(pipeline, resource, Capability::Producer);
            instance
                .producers
                .push(self.producer(&resource.kind, scope, &resource.attributes)?);
        }
        for resource in &pipeline.transformers {
            provisioning(pipeline, resource, Capability::Transformer);
            instance
                .transformers
                .push(self.transformer(&resource.kind, scope, &resource.attributes)?);
        }
        for resource in &pipeline.consumers {
            provisioning(pipeline, resource, Capability::Consumer);
            instance
                .consumers
                .push(self.consumer(&resource.kind, scope, &resource.attributes)?);
        }

        Ok(instance)
    }

    /// [`Library::instantiate`] for every pipeline of a description, in order.
    pub fn instantiate_all(
        &self,
        description: &PipelineDescription,
        scope: &Scope,
    ) -> Result<Vec<PipelineInstance>> {
        description
            .pipelines
            .iter()
            .map(|p| self.instantiate(p, scope))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use sluice_config::Role;

    fn resource(role: Role, kind: &str) -> Arc<Resource> {
        Arc::new(Resource {
            role,
            kind: kind.into(),
            name: kind.into(),
            attributes: BTreeMap::new(),
        })
    }

    #[test]
    fn slot_matches_declared_role() {
        assert!(declared_for(&resource(Role::Produce, "constant"), Capability::Producer));
        assert!(declared_for(&resource(Role::ProduceFrom, "constant"), Capability::Producer));
        assert!(!declared_for(&resource(Role::Transform, "inspect"), Capability::Consumer));
    }

    #[test]
    fn mis_slotted_resource_provisions_when_plugin_supports_slot() {
        let library = Library::default();
        let pipeline = Pipeline {
            name: "p".into(),
            producers: Vec::new(),
            transformers: Vec::new(),
            // declared as a transform, but `inspect` also consumes
            consumers: vec![resource(Role::Transform, "inspect")],
        };
        let instance = library.instantiate(&pipeline, library.scope()).unwrap();
        assert_eq!(instance.consumers.len(), 1);
    }
}
