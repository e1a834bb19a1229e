//! Tagged message type shared by both directions of a connection.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::RouteError;
use crate::tags::{Tags, is_private_tag};

/// Named fields carried next to the `tag`.
pub type Fields = Map<String, Value>;

/// A single tagged message.
///
/// On the wire this is a flat JSON object: `{"tag": "...", ...fields}`.
/// The `tag` selects the operation for inbound messages and names the kind
/// of update for outbound ones.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Message {
    pub tag: String,
    pub fields: Fields,
}

impl Message {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: Fields::new(),
        }
    }

    /// Add a named field. A `tag` key is ignored; use [`Message::new`].
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key: String = key.into();
        if key != "tag" {
            self.fields.insert(key, value.into());
        }
        self
    }

    /// State update broadcast: `{"tag": "assign", "key": ..., "value": ...}`.
    pub fn assign(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key: String = key.into();
        Self::new(Tags::ASSIGN)
            .with_field("key", key)
            .with_field("value", value)
    }

    /// Parse one text frame.
    ///
    /// Anything that is not a JSON object with a string `tag` is a
    /// [`RouteError::MalformedMessage`].
    pub fn parse(text: &str) -> Result<Self, RouteError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RouteError::malformed(format!("failed to parse JSON: {e}")))?;
        Self::try_from(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_private(&self) -> bool {
        is_private_tag(&self.tag)
    }

    pub fn into_parts(self) -> (String, Fields) {
        (self.tag, self.fields)
    }

    /// Serialize to a JSON text frame with `tag` first.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TryFrom<Value> for Message {
    type Error = RouteError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(RouteError::malformed(format!(
                    "expected a JSON object, found {}",
                    json_type_name(&other)
                )));
            }
        };

        let tag = match fields.remove("tag") {
            Some(Value::String(tag)) => tag,
            Some(other) => {
                return Err(RouteError::malformed(format!(
                    "`tag` must be a string, found {}",
                    json_type_name(&other)
                )));
            }
            None => return Err(RouteError::malformed("missing `tag` field")),
        };

        Ok(Self { tag, fields })
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = self.fields.keys().filter(|k| k.as_str() != "tag").count();
        let mut map = serializer.serialize_map(Some(extra + 1))?;
        map.serialize_entry("tag", &self.tag)?;
        for (key, value) in &self.fields {
            if key != "tag" {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
