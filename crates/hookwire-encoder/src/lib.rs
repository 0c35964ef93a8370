#![doc = r"Incremental encoder from rendered hookwire trees to a JSON wire payload."]

mod error;
pub mod eviction;
pub mod session;

pub use error::EncodeError;
pub use eviction::{EvictUnreferenced, Eviction, EvictionPolicy, KeepAll, References};
pub use session::EncodingSession;

use hookwire_core::{Callback, ExternalObject, Props, RenderedNode, Value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

pub const ELEMENT_NAME_KEY: &str = "__elementName";
pub const PROPS_KEY: &str = "props";
pub const OBJECT_ID_KEY: &str = "__objectId";
pub const CALLABLE_ID_KEY: &str = "__callableId";

pub(crate) const DEFAULT_CALLABLE_PREFIX: &str = "cb";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Prepended to the counter in every callable id.
    pub callable_prefix: String,
    /// Deepest nesting of nodes, lists and maps accepted.
    pub max_depth: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            callable_prefix: DEFAULT_CALLABLE_PREFIX.to_owned(),
            max_depth: 256,
        }
    }
}

/// Result of one [`NodeEncoder::encode`] call.
#[derive(Debug)]
pub struct EncodedDocument {
    pub payload: Json,
    /// Objects first seen by this call, in first-encounter order.
    pub new_objects: Vec<(u64, ExternalObject)>,
    pub new_callables: Vec<(String, Callback)>,
    /// Ids the eviction policy released after this call.
    pub released_objects: Vec<u64>,
    pub released_callables: Vec<String>,
}

impl EncodedDocument {
    pub fn to_json_string(&self) -> String {
        self.payload.to_string()
    }

    pub fn new_object_ids(&self) -> Vec<u64> {
        self.new_objects.iter().map(|(id, _)| *id).collect()
    }

    pub fn new_callable_ids(&self) -> Vec<&str> {
        self.new_callables.iter().map(|(id, _)| id.as_str()).collect()
    }
}

/// Stateful encoder. One instance per receiving connection: ids it hands
/// out stay valid until its eviction policy releases them.
pub struct NodeEncoder {
    config: EncoderConfig,
    session: EncodingSession,
    eviction: Box<dyn EvictionPolicy>,
}

impl Default for NodeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeEncoder {
    pub fn new() -> Self {
        Self::with_config(EncoderConfig::default())
    }

    pub fn with_config(config: EncoderConfig) -> Self {
        Self::with_eviction(config, Box::new(KeepAll))
    }

    pub fn with_eviction(config: EncoderConfig, eviction: Box<dyn EvictionPolicy>) -> Self {
        let session = EncodingSession::new(config.callable_prefix.clone());
        Self {
            config,
            session,
            eviction,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn session(&self) -> &EncodingSession {
        &self.session
    }

    pub fn resolve_object(&self, id: u64) -> Option<&ExternalObject> {
        self.session.resolve_object(id)
    }

    pub fn resolve_callable(&self, id: &str) -> Option<&Callback> {
        self.session.resolve_callable(id)
    }

    /// Encode `node` depth-first in document order.
    ///
    /// On error the session is left as it was before the call: ids assigned
    /// during the failed walk are released again.
    pub fn encode(&mut self, node: &RenderedNode) -> Result<EncodedDocument, EncodeError> {
        let mut walk = Walk {
            session: &mut self.session,
            max_depth: self.config.max_depth,
            new_objects: Vec::new(),
            new_callables: Vec::new(),
            referenced: References::default(),
        };
        let payload = match walk.node(node, 0) {
            Ok(payload) => payload,
            Err(err) => {
                walk.rollback();
                log::debug!("encode of <{}> failed: {err}", node.name());
                return Err(err);
            }
        };
        let Walk {
            new_objects,
            new_callables,
            referenced,
            ..
        } = walk;

        let eviction = self.eviction.select(&self.session, &referenced);
        let released_objects: Vec<u64> = eviction
            .objects
            .into_iter()
            .filter(|id| self.session.release_object(*id).is_some())
            .collect();
        let released_callables: Vec<String> = eviction
            .callables
            .into_iter()
            .filter(|id| self.session.release_callable(id).is_some())
            .collect();

        log::debug!(
            "encoded <{}>: {} new objects, {} new callables, {} released",
            node.name(),
            new_objects.len(),
            new_callables.len(),
            released_objects.len() + released_callables.len()
        );
        Ok(EncodedDocument {
            payload,
            new_objects,
            new_callables,
            released_objects,
            released_callables,
        })
    }
}

impl std::fmt::Debug for NodeEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEncoder")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

struct Walk<'a> {
    session: &'a mut EncodingSession,
    max_depth: usize,
    new_objects: Vec<(u64, ExternalObject)>,
    new_callables: Vec<(String, Callback)>,
    referenced: References,
}

impl Walk<'_> {
    fn enter(&self, depth: usize) -> Result<usize, EncodeError> {
        if depth >= self.max_depth {
            return Err(EncodeError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        Ok(depth + 1)
    }

    fn node(&mut self, node: &RenderedNode, depth: usize) -> Result<Json, EncodeError> {
        let depth = self.enter(depth)?;
        let mut encoded = Map::new();
        encoded.insert(ELEMENT_NAME_KEY.to_owned(), Json::from(node.name()));
        if let Some(props) = node.props() {
            encoded.insert(PROPS_KEY.to_owned(), self.props(props, depth)?);
        }
        Ok(Json::Object(encoded))
    }

    fn props(&mut self, props: &Props, depth: usize) -> Result<Json, EncodeError> {
        let mut encoded = Map::new();
        for (name, value) in props.iter() {
            encoded.insert(name.to_owned(), self.value(value, depth)?);
        }
        Ok(Json::Object(encoded))
    }

    fn value(&mut self, value: &Value, depth: usize) -> Result<Json, EncodeError> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(value) => Ok(Json::Bool(*value)),
            Value::Int(value) => Ok(Json::from(*value)),
            Value::Float(value) => Number::from_f64(*value)
                .map(Json::Number)
                .ok_or(EncodeError::NonFiniteFloat { value: *value }),
            Value::Str(value) => Ok(Json::from(&**value)),
            Value::List(items) => {
                let depth = self.enter(depth)?;
                items
                    .iter()
                    .map(|item| self.value(item, depth))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Json::Array)
            }
            Value::Map(props) => {
                let depth = self.enter(depth)?;
                self.props(props, depth)
            }
            Value::Node(node) => self.node(node, depth),
            Value::Element(element) => Err(EncodeError::UnrenderedElement {
                name: element.name().to_owned(),
            }),
            Value::Object(object) => {
                let (id, fresh) = self.session.object_id(object);
                if fresh {
                    self.new_objects.push((id, object.clone()));
                }
                self.referenced.objects.insert(id);
                Ok(reference(OBJECT_ID_KEY, Json::from(id)))
            }
            Value::Callable(callable) => {
                let (id, fresh) = self.session.callable_id(callable);
                if fresh {
                    self.new_callables.push((id.clone(), callable.clone()));
                }
                self.referenced.callables.insert(id.clone());
                Ok(reference(CALLABLE_ID_KEY, Json::from(id)))
            }
        }
    }

    fn rollback(self) {
        for (id, _) in self.new_objects {
            self.session.release_object(id);
        }
        for (id, _) in self.new_callables {
            self.session.release_callable(&id);
        }
    }
}

fn reference(key: &str, id: Json) -> Json {
    let mut marker = Map::new();
    marker.insert(key.to_owned(), id);
    Json::Object(marker)
}

#[cfg(test)]
#[path = "tests/encoder_tests.rs"]
mod encoder_tests;
