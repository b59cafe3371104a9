//! The provider traits plugins implement, and the factories that build them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use sluice_types::Result;

use crate::capability::Capability;
use crate::parser::ConfigParser;

/// One record moving through a pipeline.
pub type Record = Vec<u8>;

/// Emits records into a pipeline.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Send records into `sink` until done. A closed sink ends production
    /// without error.
    async fn produce(&self, sink: mpsc::Sender<Record>) -> Result<()>;
}

/// Drains records out of a pipeline.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(&self, source: mpsc::Receiver<Record>) -> Result<()>;
}

/// Maps one record to another.
pub trait Transformer: Send + Sync {
    fn transform(&self, record: Record) -> Result<Record>;
}

pub type ProducerProvider =
    Arc<dyn Fn(&ConfigParser<'_>) -> Result<Box<dyn Producer>> + Send + Sync>;
pub type ConsumerProvider =
    Arc<dyn Fn(&ConfigParser<'_>) -> Result<Box<dyn Consumer>> + Send + Sync>;
pub type TransformerProvider =
    Arc<dyn Fn(&ConfigParser<'_>) -> Result<Box<dyn Transformer>> + Send + Sync>;

/// A provisioned resource of any capability.
pub enum Implementation {
    Producer(Box<dyn Producer>),
    Consumer(Box<dyn Consumer>),
    Transformer(Box<dyn Transformer>),
}

impl Implementation {
    pub fn capability(&self) -> Capability {
        match self {
            Implementation::Producer(_) => Capability::Producer,
            Implementation::Consumer(_) => Capability::Consumer,
            Implementation::Transformer(_) => Capability::Transformer,
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Implementation::{:?}", self.capability())
    }
}
