use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use sluice_config::Role;

bitflags! {
    /// What a plugin resource can be provisioned as. Bits combine freely.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const PRODUCER    = 0b0001;
        const CONSUMER    = 0b0010;
        const TRANSFORMER = 0b0100;
    }
}

impl Capabilities {
    pub fn has_capability(self, capability: Capability) -> bool {
        self.contains(capability.flag())
    }

    /// The individual capabilities that are set, in bit order.
    pub fn capabilities(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |c| self.has_capability(*c))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<_> = self.capabilities().map(|c| c.as_str()).collect();
        f.write_str(&names.join("|"))
    }
}

/// A single capability, as requested from the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Producer,
    Consumer,
    Transformer,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Producer,
        Capability::Consumer,
        Capability::Transformer,
    ];

    pub fn flag(self) -> Capabilities {
        match self {
            Capability::Producer => Capabilities::PRODUCER,
            Capability::Consumer => Capabilities::CONSUMER,
            Capability::Transformer => Capabilities::TRANSFORMER,
        }
    }

    /// Capability a resource of the given role is provisioned with.
    pub fn for_role(role: Role) -> Option<Capability> {
        match role {
            Role::Produce | Role::ProduceFrom => Some(Capability::Producer),
            Role::Consume => Some(Capability::Consumer),
            Role::Transform => Some(Capability::Transformer),
            Role::Value => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Producer => "producer",
            Capability::Consumer => "consumer",
            Capability::Transformer => "transformer",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
