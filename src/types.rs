//! Core types for weft.
//!
//! These types define the foundation that everything builds on.
//! They flow through the element model, the diff, and the host adapter.

use std::fmt;
use std::rc::Rc;

// =============================================================================
// Key
// =============================================================================

/// Identity hint used to match elements across tree generations.
///
/// Keys are compared by value; a keyed element can move within its sibling
/// run and still reuse the same unit (and therefore its hook state).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(Rc<str>);

impl Key {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Rc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Prop values
// =============================================================================

/// A single prop value.
///
/// Kept to a small closed set so prop diffing is plain `PartialEq` and the
/// host adapter can interpret values without downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v.as_str()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

// =============================================================================
// Props
// =============================================================================

/// Named props attached to a host element or component.
pub type Props = rustc_hash::FxHashMap<String, Value>;

/// Build a [`Props`] map from `"name" => value` pairs.
///
/// ```ignore
/// let p = props! { "id" => "save", "disabled" => false };
/// ```
#[macro_export]
macro_rules! props {
    () => { $crate::types::Props::default() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::types::Props::default();
        $(map.insert(String::from($name), $crate::types::Value::from($value));)+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality() {
        assert_eq!(Key::from("a"), Key::new("a"));
        assert_ne!(Key::from("a"), Key::from("b"));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_ne!(Value::from(1), Value::from(true));
    }

    #[test]
    fn test_props_macro() {
        let p = props! { "id" => "root", "count" => 2 };
        assert_eq!(p.get("id"), Some(&Value::from("root")));
        assert_eq!(p.get("count"), Some(&Value::Int(2)));
        assert!(props! {}.is_empty());
    }
}
