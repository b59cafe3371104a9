use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use sluice_lang::{decode, decode_into, AttrSpec, Scope, Value};
use sluice_types::Result;

/// Handed to every provider call: the resource's attributes, bound to the
/// resource's spec and the scope active at provisioning time.
#[derive(Debug, Clone, Copy)]
pub struct ConfigParser<'a> {
    resource: &'a str,
    spec: &'a [AttrSpec],
    scope: &'a Scope,
    config: &'a BTreeMap<String, Value>,
}

impl<'a> ConfigParser<'a> {
    pub fn new(
        resource: &'a str,
        spec: &'a [AttrSpec],
        scope: &'a Scope,
        config: &'a BTreeMap<String, Value>,
    ) -> Self {
        Self {
            resource,
            spec,
            scope,
            config,
        }
    }

    /// Name of the resource being provisioned.
    pub fn resource(&self) -> &str {
        self.resource
    }

    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// Raw, undecoded attributes.
    pub fn raw(&self) -> &BTreeMap<String, Value> {
        self.config
    }

    /// Attributes validated against the resource's spec, defaults applied.
    pub fn attributes(&self) -> Result<BTreeMap<String, Value>> {
        decode(&self.context(), self.spec, self.config)
    }

    /// Validate against the resource's spec and deserialize into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        decode_into(&self.context(), self.spec, self.config)
    }

    /// Validate against an explicit spec instead of the resource's own.
    pub fn parse_with<T: DeserializeOwned>(&self, spec: &[AttrSpec]) -> Result<T> {
        decode_into(&self.context(), spec, self.config)
    }

    fn context(&self) -> String {
        format!("resource '{}'", self.resource)
    }
}
