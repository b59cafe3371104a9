//! The built-in `std` plugin.
//!
//! Resources:
//! - `constant` (producer): emits `value` `stop-after` times (0 = forever).
//! - `trash` (consumer): discards every record.
//! - `inspect` (transformer, consumer): logs records; passes them through
//!   when used as a transformer.
//!
//! Functions: `upper`, `lower`, `join(sep, list)`, `length(x)`.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::info;

use sluice_lang::{AttrSpec, AttrType, Value};
use sluice_types::{Result, SluiceError};

use crate::capability::Capabilities;
use crate::parser::ConfigParser;
use crate::plugin::{Plugin, PluginResource};
use crate::provider::{Consumer, Producer, Record, Transformer};

pub const PLUGIN_NAME: &str = "std";

pub fn plugin() -> Plugin {
    Plugin::new(PLUGIN_NAME)
        .with_resource(
            PluginResource::new("constant", Capabilities::PRODUCER)
                .with_spec(vec![
                    AttrSpec::required("value", AttrType::String),
                    AttrSpec::optional("stop-after", AttrType::Integer).with_default(1),
                ])
                .provide_producer(provide_constant),
        )
        .with_resource(PluginResource::new("trash", Capabilities::CONSUMER).provide_consumer(provide_trash))
        .with_resource(
            PluginResource::new("inspect", Capabilities::TRANSFORMER | Capabilities::CONSUMER)
                .with_spec(vec![
                    AttrSpec::optional("be-verbose", AttrType::Bool).with_default(false)
                ])
                .provide_transformer(provide_inspect_transformer)
                .provide_consumer(provide_inspect_consumer),
        )
        .with_function("upper", upper)
        .with_function("lower", lower)
        .with_function("join", join)
        .with_function("length", length)
}

// ---------------------------------------------------------------------------
// constant
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConstantConfig {
    value: String,
    stop_after: i64,
}

struct Constant {
    value: Record,
    /// 0 means unlimited.
    stop_after: u64,
}

fn provide_constant(parser: &ConfigParser<'_>) -> Result<Box<dyn Producer>> {
    let config: ConstantConfig = parser.parse()?;
    let stop_after = u64::try_from(config.stop_after).map_err(|_| SluiceError::ConfigDecodeError {
        context: format!("resource '{}'", parser.resource()),
        attribute: "stop-after".into(),
        message: format!("must not be negative, found {}", config.stop_after),
    })?;
    Ok(Box::new(Constant {
        value: config.value.into_bytes(),
        stop_after,
    }))
}

#[async_trait]
impl Producer for Constant {
    async fn produce(&self, sink: mpsc::Sender<Record>) -> Result<()> {
        let mut sent = 0u64;
        while self.stop_after == 0 || sent < self.stop_after {
            if sink.send(self.value.clone()).await.is_err() {
                break; // receiver gone
            }
            sent += 1;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// trash
// ---------------------------------------------------------------------------

struct Trash;

fn provide_trash(parser: &ConfigParser<'_>) -> Result<Box<dyn Consumer>> {
    parser.attributes()?;
    Ok(Box::new(Trash))
}

#[async_trait]
impl Consumer for Trash {
    async fn consume(&self, mut source: mpsc::Receiver<Record>) -> Result<()> {
        while source.recv().await.is_some() {}
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InspectConfig {
    be_verbose: bool,
}

struct Inspect {
    verbose: bool,
}

impl Inspect {
    fn from_parser(parser: &ConfigParser<'_>) -> Result<Self> {
        let config: InspectConfig = parser.parse()?;
        Ok(Inspect {
            verbose: config.be_verbose,
        })
    }

    fn log(&self, record: &[u8]) {
        if self.verbose {
            info!(bytes = record.len(), record = %String::from_utf8_lossy(record), "inspect");
        } else {
            info!(bytes = record.len(), "inspect");
        }
    }
}

fn provide_inspect_transformer(parser: &ConfigParser<'_>) -> Result<Box<dyn Transformer>> {
    Ok(Box::new(Inspect::from_parser(parser)?))
}

fn provide_inspect_consumer(parser: &ConfigParser<'_>) -> Result<Box<dyn Consumer>> {
    Ok(Box::new(Inspect::from_parser(parser)?))
}

impl Transformer for Inspect {
    fn transform(&self, record: Record) -> Result<Record> {
        self.log(&record);
        Ok(record)
    }
}

#[async_trait]
impl Consumer for Inspect {
    async fn consume(&self, mut source: mpsc::Receiver<Record>) -> Result<()> {
        while let Some(record) = source.recv().await {
            self.log(&record);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn function_error(function: &str, message: impl Into<String>) -> SluiceError {
    SluiceError::FunctionError {
        function: function.to_string(),
        message: message.into(),
    }
}

fn single_string<'a>(function: &str, args: &'a [Value]) -> Result<&'a str> {
    match args {
        [Value::String(s)] => Ok(s.as_str()),
        [other] => Err(function_error(
            function,
            format!("expected a string, found {}", other.type_name()),
        )),
        _ => Err(function_error(
            function,
            format!("expected 1 argument, found {}", args.len()),
        )),
    }
}

fn upper(args: &[Value]) -> Result<Value> {
    Ok(Value::String(single_string("upper", args)?.to_uppercase()))
}

fn lower(args: &[Value]) -> Result<Value> {
    Ok(Value::String(single_string("lower", args)?.to_lowercase()))
}

fn join(args: &[Value]) -> Result<Value> {
    let [Value::String(sep), Value::List(items)] = args else {
        return Err(function_error("join", "expected (separator string, list)"));
    };
    let parts = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(_) | Value::Float(_) | Value::Bool(_) => Ok(item.to_string()),
            other => Err(function_error(
                "join",
                format!("element {i}: cannot join a {} value", other.type_name()),
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::String(parts.join(sep.as_str())))
}

fn length(args: &[Value]) -> Result<Value> {
    let len = match args {
        [Value::String(s)] => s.chars().count(),
        [Value::List(items)] => items.len(),
        [Value::Object(map)] => map.len(),
        [other] => {
            return Err(function_error(
                "length",
                format!("cannot take the length of a {} value", other.type_name()),
            ))
        }
        _ => {
            return Err(function_error(
                "length",
                format!("expected 1 argument, found {}", args.len()),
            ))
        }
    };
    i64::try_from(len)
        .map(Value::Integer)
        .map_err(|_| function_error("length", "length does not fit in an integer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use sluice_lang::Scope;

    fn parser_for<'a>(
        resource: &'a PluginResource,
        scope: &'a Scope,
        config: &'a BTreeMap<String, Value>,
    ) -> ConfigParser<'a> {
        ConfigParser::new(&resource.name, &resource.spec, scope, config)
    }

    fn std_resource(name: &str) -> std::sync::Arc<PluginResource> {
        plugin()
            .resources
            .into_iter()
            .find(|r| r.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn constant_emits_value_stop_after_times() {
        let resource = std_resource("constant");
        let scope = Scope::empty();
        let mut config = BTreeMap::new();
        config.insert("value".to_string(), Value::from("hi"));
        config.insert("stop-after".to_string(), Value::Integer(3));

        let producer = provide_constant(&parser_for(&resource, &scope, &config)).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        producer.produce(tx).await.unwrap();

        let mut received = Vec::new();
        while let Some(record) = rx.recv().await {
            received.push(record);
        }
        assert_eq!(received, vec![b"hi".to_vec(); 3]);
    }

    #[tokio::test]
    async fn constant_defaults_to_one_record() {
        let resource = std_resource("constant");
        let scope = Scope::empty();
        let mut config = BTreeMap::new();
        config.insert("value".to_string(), Value::from("x"));

        let producer = provide_constant(&parser_for(&resource, &scope, &config)).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        producer.produce(tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(b"x".to_vec()));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn unlimited_constant_stops_when_receiver_drops() {
        let resource = std_resource("constant");
        let scope = Scope::empty();
        let mut config = BTreeMap::new();
        config.insert("value".to_string(), Value::from("x"));
        config.insert("stop-after".to_string(), Value::Integer(0));

        let producer = provide_constant(&parser_for(&resource, &scope, &config)).unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move { producer.produce(tx).await });
        assert!(rx.recv().await.is_some());
        drop(rx);
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn constant_requires_value() {
        let resource = std_resource("constant");
        let scope = Scope::empty();
        let config = BTreeMap::new();
        let err = provide_constant(&parser_for(&resource, &scope, &config))
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "invalid config for resource 'constant': attribute 'value' is required"
        );
    }

    #[tokio::test]
    async fn trash_drains_everything() {
        let resource = std_resource("trash");
        let scope = Scope::empty();
        let config = BTreeMap::new();
        let consumer = provide_trash(&parser_for(&resource, &scope, &config)).unwrap();

        let (tx, rx) = mpsc::channel(4);
        for i in 0..4u8 {
            tx.send(vec![i]).await.unwrap();
        }
        drop(tx);
        consumer.consume(rx).await.unwrap();
    }

    #[test]
    fn inspect_passes_records_through() {
        let resource = std_resource("inspect");
        let scope = Scope::empty();
        let mut config = BTreeMap::new();
        config.insert("be-verbose".to_string(), Value::Bool(true));
        let transformer =
            provide_inspect_transformer(&parser_for(&resource, &scope, &config)).unwrap();
        assert_eq!(transformer.transform(b"abc".to_vec()).unwrap(), b"abc".to_vec());
    }

    #[test]
    fn string_functions() {
        assert_eq!(upper(&[Value::from("abc")]).unwrap(), Value::from("ABC"));
        assert_eq!(lower(&[Value::from("ABC")]).unwrap(), Value::from("abc"));
        assert!(upper(&[Value::Integer(1)]).is_err());
        assert!(lower(&[]).is_err());
    }

    #[test]
    fn join_and_length() {
        let list = Value::List(vec![Value::from("a"), Value::Integer(2), Value::Bool(true)]);
        assert_eq!(join(&[Value::from("-"), list.clone()]).unwrap(), Value::from("a-2-true"));
        assert!(join(&[list.clone()]).is_err());
        assert!(join(&[Value::from(","), Value::List(vec![Value::Null])]).is_err());

        assert_eq!(length(&[list]).unwrap(), Value::Integer(3));
        assert_eq!(length(&[Value::from("héllo")]).unwrap(), Value::Integer(5));
        assert!(length(&[Value::Integer(1)]).is_err());
    }
}
