#![forbid(unsafe_code)]

//! Plain data values: the input to observation and the currency of watcher
//! callbacks.
//!
//! [`Value`] is a small tagged union over the scalar types the binding layer
//! cares about plus insertion-ordered objects. Observation never mutates a
//! `Value`; the observed tree consumes one at construction and hands back
//! snapshots on reads.

/// A plain data value.
///
/// Object entries preserve insertion order, which makes tree walks and
/// snapshots deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Insertion-ordered properties.
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Build an object value from `(key, value)` entries.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether this value is an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Look up a direct property of an object value. `None` for scalars and
    /// missing keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Whether `self` and `other` hold the same scalar.
    ///
    /// This is the change-detection comparison used by writes and watchers.
    /// Scalars compare by `PartialEq`, so `f64::NAN` never equals itself and
    /// a NaN write always counts as a change. Any comparison involving an
    /// object returns `false`: a freshly built object is a new identity even
    /// when structurally equal to what it replaces.
    #[must_use]
    pub fn same_scalar(&self, other: &Value) -> bool {
        if self.is_object() || other.is_object() {
            return false;
        }
        self == other
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
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
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
