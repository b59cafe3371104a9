//! Plugin registry for Sluice.
//!
//! Plugins contribute named resources, each carrying a capability bitmask,
//! an attribute spec and one provider per capability. A [`Library`] merges
//! plugins into one immutable registry and provisions resolved pipelines
//! through it, checking capabilities before any provider runs.

pub mod capability;
pub mod instantiate;
pub mod library;
pub mod parser;
pub mod plugin;
pub mod provider;
pub mod stdlib;

pub use capability::{Capabilities, Capability};
pub use instantiate::PipelineInstance;
pub use library::Library;
pub use parser::ConfigParser;
pub use plugin::{Plugin, PluginResource};
pub use provider::{
    Consumer, ConsumerProvider, Implementation, Producer, ProducerProvider, Record, Transformer,
    TransformerProvider,
};
