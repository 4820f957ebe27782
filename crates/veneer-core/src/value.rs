//! Dynamic field values
//!
//! Entities carry their state as named fields holding a [`Value`]. The
//! concrete schema belongs to the embedding application; the table only needs
//! to compare, copy and serialize field contents.

use crate::identity::EntityId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A dynamic value stored in an entity field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// No value / null
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Reference to another entity
    EntityRef(EntityId),
    /// List of values (positions, inventories, ...)
    List(Vec<Value>),
    /// Map of string keys to values (nested components)
    Map(ValueMap),
}

/// A map of string keys to dynamic values
///
/// Uses IndexMap to preserve insertion order, so serialized entities and
/// announced patches list fields deterministically.
pub type ValueMap = IndexMap<String, Value>;

impl Value {
    /// An empty map, the usual value of a marker component
    pub fn empty_map() -> Self {
        Value::Map(ValueMap::new())
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Value::EntityRef(id)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Int(42).as_str(), None);
        assert_eq!(Value::from(EntityId::new(3)), Value::EntityRef(EntityId::new(3)));
    }

    #[test]
    fn test_position_list() {
        let pos: Value = vec![1i64, 2, 3].into();
        let list = pos.as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].as_int(), Some(1));
    }

    #[test]
    fn test_marker_map() {
        assert_eq!(Value::empty_map(), Value::Map(ValueMap::new()));
        assert_ne!(Value::empty_map(), Value::Null);
    }
}
