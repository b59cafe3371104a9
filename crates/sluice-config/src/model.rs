use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use sluice_lang::Value;

/// The role a declaration plays. `Value` is only used for the `value` block;
/// the other four are resource roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Produce,
    ProduceFrom,
    Consume,
    Transform,
    Value,
}

impl Role {
    pub const RESOURCE_ROLES: [Role; 4] =
        [Role::Produce, Role::ProduceFrom, Role::Consume, Role::Transform];

    /// The block keyword, which is also the root of the role's namespace.
    pub fn keyword(self) -> &'static str {
        match self {
            Role::Produce => "produce",
            Role::ProduceFrom => "produce-from",
            Role::Consume => "consume",
            Role::Transform => "transform",
            Role::Value => "value",
        }
    }

    /// Resource role for a block keyword, if it names one.
    pub fn from_resource_keyword(keyword: &str) -> Option<Role> {
        Role::RESOURCE_ROLES
            .into_iter()
            .find(|r| r.keyword() == keyword)
    }

    /// Producers and remote producers both feed a pipeline's produce slot.
    pub fn is_producer(self) -> bool {
        matches!(self, Role::Produce | Role::ProduceFrom)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A declared producer, consumer or transformer with its evaluated
/// attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub role: Role,
    pub kind: String,
    pub name: String,
    pub attributes: BTreeMap<String, Value>,
}

impl Resource {
    /// `role.kind.name`
    pub fn qualified_name(&self) -> String {
        qualified_name(self.role, &self.kind, &self.name)
    }
}

pub fn qualified_name(role: Role, kind: &str, name: &str) -> String {
    format!("{}.{}.{}", role.keyword(), kind, name)
}

/// A named pipeline with its references resolved, in reference order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub name: String,
    pub producers: Vec<Arc<Resource>>,
    pub consumers: Vec<Arc<Resource>>,
    pub transformers: Vec<Arc<Resource>>,
}

impl Pipeline {
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.producers
            .iter()
            .chain(self.transformers.iter())
            .chain(self.consumers.iter())
    }
}

/// A `plugin "name" { source = "..." }` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSource {
    pub name: String,
    pub source: String,
}

/// Everything a unit or a group of units declares, fully resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineDescription {
    pub remote_producers: Vec<Arc<Resource>>,
    pub producers: Vec<Arc<Resource>>,
    pub consumers: Vec<Arc<Resource>>,
    pub transformers: Vec<Arc<Resource>>,
    pub pipelines: Vec<Pipeline>,
    pub plugins: Vec<PluginSource>,
    /// Records to move before stopping; 0 means unlimited.
    pub stop_after: u64,
    pub exit_on_error: bool,
}

impl PipelineDescription {
    /// All declared resources, grouped by role.
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.remote_producers
            .iter()
            .chain(self.producers.iter())
            .chain(self.consumers.iter())
            .chain(self.transformers.iter())
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Append another description's sequences after this one's. Scalar
    /// options are taken from `other` when it sets a non-default value.
    pub fn merge(&mut self, other: PipelineDescription) {
        self.remote_producers.extend(other.remote_producers);
        self.producers.extend(other.producers);
        self.consumers.extend(other.consumers);
        self.transformers.extend(other.transformers);
        self.pipelines.extend(other.pipelines);
        self.plugins.extend(other.plugins);
        if other.stop_after != 0 {
            self.stop_after = other.stop_after;
        }
        if other.exit_on_error {
            self.exit_on_error = true;
        }
    }
}
