/* Attribute values as seen by the marshaller */

use indexmap::IndexMap;
use serde::Serialize;

/* One attribute value. Repeated attributes and array nests hold their
   elements in stream order. */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    S32(i32),
    S64(i64),
    Flag,
    String(String),
    Binary(Vec<u8>),
    Nest(Message),

    /* Entries of an array nest */
    Array(Vec<Value>),

    /* Occurrences of a multi-attr member */
    Multi(Vec<Value>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::S32(_) => "s32",
            Value::S64(_) => "s64",
            Value::Flag => "flag",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Nest(_) => "nest",
            Value::Array(_) => "array-nest",
            Value::Multi(_) => "multi-attr",
        }
    }

    /// Unsigned scalars widened to 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U8(v) => Some(u64::from(v)),
            Value::U16(v) => Some(u64::from(v)),
            Value::U32(v) => Some(u64::from(v)),
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    /// Signed scalars widened to 64 bits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::S32(v) => Some(i64::from(v)),
            Value::S64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nest(&self) -> Option<&Message> {
        match self {
            Value::Nest(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::Multi(items) => Some(items),
            _ => None,
        }
    }
}

/// Members of one attribute set, keyed by attribute name. A member that
/// was never assigned is absent and never put on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Message {
    attrs: IndexMap<String, Value>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.attrs.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.attrs.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attrs.shift_remove(name)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /* Element count of repeated members, zero when absent */
    pub fn count(&self, name: &str) -> usize {
        match self.attrs.get(name) {
            Some(value) => value.elements().map_or(1, <[Value]>::len),
            None => 0,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_and_count() {
        let msg = Message::new()
            .with("id", Value::U32(3))
            .with("queues", Value::Multi(vec![Value::U16(1), Value::U16(2)]));

        assert!(msg.is_present("id"));
        assert!(!msg.is_present("name"));
        assert_eq!(msg.count("id"), 1);
        assert_eq!(msg.count("queues"), 2);
        assert_eq!(msg.count("name"), 0);
    }

    #[test]
    fn test_serializes_in_assignment_order() {
        let msg = Message::new().with("b", Value::Flag).with("a", Value::U8(7));
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"b":{"kind":"flag"},"a":{"kind":"u8","value":7}}"#);
    }
}
