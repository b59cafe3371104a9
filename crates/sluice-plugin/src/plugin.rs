use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sluice_lang::{AttrSpec, Function, Value};
use sluice_types::Result;

use crate::capability::{Capabilities, Capability};
use crate::parser::ConfigParser;
use crate::provider::{
    Consumer, ConsumerProvider, Producer, ProducerProvider, Transformer, TransformerProvider,
};

/// A named resource a plugin contributes, with up to one provider per
/// capability.
#[derive(Clone)]
pub struct PluginResource {
    pub name: String,
    pub capabilities: Capabilities,
    pub spec: Vec<AttrSpec>,
    producer: Option<ProducerProvider>,
    consumer: Option<ConsumerProvider>,
    transformer: Option<TransformerProvider>,
}

impl PluginResource {
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
            spec: Vec::new(),
            producer: None,
            consumer: None,
            transformer: None,
        }
    }

    pub fn with_spec(mut self, spec: Vec<AttrSpec>) -> Self {
        self.spec = spec;
        self
    }

    pub fn provide_producer<F>(mut self, provider: F) -> Self
    where
        F: Fn(&ConfigParser<'_>) -> Result<Box<dyn Producer>> + Send + Sync + 'static,
    {
        self.producer = Some(Arc::new(provider));
        self
    }

    pub fn provide_consumer<F>(mut self, provider: F) -> Self
    where
        F: Fn(&ConfigParser<'_>) -> Result<Box<dyn Consumer>> + Send + Sync + 'static,
    {
        self.consumer = Some(Arc::new(provider));
        self
    }

    pub fn provide_transformer<F>(mut self, provider: F) -> Self
    where
        F: Fn(&ConfigParser<'_>) -> Result<Box<dyn Transformer>> + Send + Sync + 'static,
    {
        self.transformer = Some(Arc::new(provider));
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.has_capability(capability)
    }

    pub(crate) fn producer(&self) -> Option<&ProducerProvider> {
        self.producer.as_ref()
    }

    pub(crate) fn consumer(&self) -> Option<&ConsumerProvider> {
        self.consumer.as_ref()
    }

    pub(crate) fn transformer(&self) -> Option<&TransformerProvider> {
        self.transformer.as_ref()
    }
}

impl fmt::Debug for PluginResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginResource")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// A named bundle of resources plus the variables and functions it adds to
/// the evaluation scope.
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub resources: Vec<Arc<PluginResource>>,
    pub variables: BTreeMap<String, Value>,
    pub functions: BTreeMap<String, Function>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            variables: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: PluginResource) -> Self {
        self.resources.push(Arc::new(resource));
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("resources", &self.resources)
            .field("variables", &self.variables)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
