//! The plugin library: one immutable name -> resource registry built from a
//! list of plugins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use sluice_lang::{Scope, Value};
use sluice_types::{Result, SluiceError};

use crate::capability::Capability;
use crate::parser::ConfigParser;
use crate::plugin::{Plugin, PluginResource};
use crate::provider::{Consumer, Implementation, Producer, Transformer};
use crate::stdlib;

#[derive(Debug)]
pub struct Library {
    plugins: Vec<Plugin>,
    resources: HashMap<String, Arc<PluginResource>>,
    scope: Scope,
}

impl Library {
    /// The built-in `std` plugin followed by `plugins`.
    pub fn new(plugins: Vec<Plugin>) -> Self {
        let mut all = Vec::with_capacity(plugins.len() + 1);
        all.push(stdlib::plugin());
        all.extend(plugins);
        Self::bare(all)
    }

    /// Exactly `plugins`, without `std`. A resource name registered by more
    /// than one plugin resolves to the last one.
    pub fn bare(plugins: Vec<Plugin>) -> Self {
        let mut resources: HashMap<String, Arc<PluginResource>> = HashMap::new();
        let mut builder = Scope::builder();

        for plugin in &plugins {
            for resource in &plugin.resources {
                if resources
                    .insert(resource.name.clone(), Arc::clone(resource))
                    .is_some()
                {
                    debug!(
                        resource = %resource.name,
                        plugin = %plugin.name,
                        "resource overrides an earlier plugin's"
                    );
                }
            }
            for (name, value) in &plugin.variables {
                builder = builder.variable(name.clone(), value.clone());
            }
            for (name, function) in &plugin.functions {
                builder = builder.shared_function(name.clone(), Arc::clone(function));
            }
        }

        debug!(
            plugins = plugins.len(),
            resources = resources.len(),
            "plugin library built"
        );
        Self {
            plugins,
            resources,
            scope: builder.build(),
        }
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PluginResource>> {
        self.resources.get(name)
    }

    /// Registered resources, sorted by name.
    pub fn resources(&self) -> Vec<&Arc<PluginResource>> {
        let mut out: Vec<_> = self.resources.values().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Base evaluation scope: every plugin's variables and functions, later
    /// plugins overriding earlier ones.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn require(&self, name: &str, capability: Capability) -> Result<&Arc<PluginResource>> {
        let resource = self
            .resources
            .get(name)
            .ok_or_else(|| SluiceError::ResourceNotFound {
                name: name.to_string(),
            })?;
        if !resource.has_capability(capability) {
            return Err(SluiceError::CapabilityMismatch {
                name: name.to_string(),
                capability: capability.to_string(),
            });
        }
        Ok(resource)
    }

    fn missing_provider(name: &str, capability: Capability) -> SluiceError {
        SluiceError::MissingProvider {
            name: name.to_string(),
            capability: capability.to_string(),
        }
    }

    pub fn producer(
        &self,
        name: &str,
        scope: &Scope,
        config: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Producer>> {
        let resource = self.require(name, Capability::Producer)?;
        let provider = resource
            .producer()
            .ok_or_else(|| Self::missing_provider(name, Capability::Producer))?;
        (**provider)(&ConfigParser::new(name, &resource.spec, scope, config))
    }

    pub fn consumer(
        &self,
        name: &str,
        scope: &Scope,
        config: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Consumer>> {
        let resource = self.require(name, Capability::Consumer)?;
        let provider = resource
            .consumer()
            .ok_or_else(|| Self::missing_provider(name, Capability::Consumer))?;
        (**provider)(&ConfigParser::new(name, &resource.spec, scope, config))
    }

    pub fn transformer(
        &self,
        name: &str,
        scope: &Scope,
        config: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Transformer>> {
        let resource = self.require(name, Capability::Transformer)?;
        let provider = resource
            .transformer()
            .ok_or_else(|| Self::missing_provider(name, Capability::Transformer))?;
        (**provider)(&ConfigParser::new(name, &resource.spec, scope, config))
    }

    /// Provision `name` as the given capability.
    pub fn request(
        &self,
        capability: Capability,
        name: &str,
        scope: &Scope,
        config: &BTreeMap<String, Value>,
    ) -> Result<Implementation> {
        match capability {
            Capability::Producer => self.producer(name, scope, config).map(Implementation::Producer),
            Capability::Consumer => self.consumer(name, scope, config).map(Implementation::Consumer),
            Capability::Transformer => self
                .transformer(name, scope, config)
                .map(Implementation::Transformer),
        }
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
