//! The structured value exchanged over the wire.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

/// A string-keyed mapping of numbers, strings, booleans, nulls, sequences
/// and nested mappings.
///
/// `Message` is a newtype around a JSON object. The transport has no idea
/// what the keys mean; the application packs whatever it needs (ball
/// positions, paddle inputs, ...) into it and unpacks it on the other side.
///
/// `#[serde(transparent)]` makes a `Message` serialize as the bare object,
/// so `{"k": 52}` on the wire is exactly `{"k": 52}`.
///
/// The top level must be an object. Converting any other JSON value fails
/// with [`ProtocolError::InvalidMessage`]:
///
/// ```rust
/// use tether_protocol::{json, Message};
///
/// let msg = Message::try_from(json!({"k": 52})).unwrap();
/// assert_eq!(msg.get("k"), Some(&json!(52)));
///
/// assert!(Message::try_from(json!([1, 2, 3])).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert: returns the message with `key` set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Sets `key`, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Consumes the message and returns the underlying map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Consumes the message and returns it as a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Deref for Message {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Message {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Message {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ProtocolError::InvalidMessage(format!(
                "top level must be an object, got {}",
                kind_of(&other)
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Message {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
