//! Argument values and their hashable projection.
//!
//! Cached methods receive their arguments as [`ArgValue`]s. Only some values
//! can take part in a cache key: mutable containers (`List`, `Map`) have no
//! stable identity and are rejected by [`ArgValue::to_key_atom`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BindError, CacheError, CacheResult};

/// A dynamically typed call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Immutable sequence; hashable when all members are.
    Tuple(Vec<ArgValue>),
    /// Mutable sequence; never hashable.
    List(Vec<ArgValue>),
    /// Mutable mapping; never hashable.
    Map(BTreeMap<String, ArgValue>),
}

impl ArgValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::None => "none",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "str",
            ArgValue::Tuple(_) => "tuple",
            ArgValue::List(_) => "list",
            ArgValue::Map(_) => "map",
        }
    }

    /// Build a tuple value.
    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ArgValue>,
    {
        ArgValue::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Build a list value.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ArgValue>,
    {
        ArgValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a map value.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ArgValue>,
    {
        ArgValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns true if this value can be part of a cache key.
    pub fn is_hashable(&self) -> bool {
        match self {
            ArgValue::List(_) | ArgValue::Map(_) => false,
            ArgValue::Tuple(items) => items.iter().all(ArgValue::is_hashable),
            _ => true,
        }
    }

    /// Project this value into its hashable form.
    pub fn to_key_atom(&self) -> CacheResult<KeyAtom> {
        Ok(match self {
            ArgValue::None => KeyAtom::None,
            ArgValue::Bool(b) => KeyAtom::Bool(*b),
            ArgValue::Int(i) => KeyAtom::Int(*i),
            ArgValue::Float(f) => KeyAtom::from_f64(*f),
            ArgValue::Str(s) => KeyAtom::Str(s.clone()),
            ArgValue::Tuple(items) => KeyAtom::Tuple(
                items
                    .iter()
                    .map(ArgValue::to_key_atom)
                    .collect::<CacheResult<Vec<_>>>()?,
            ),
            ArgValue::List(_) | ArgValue::Map(_) => {
                return Err(CacheError::Unhashable {
                    type_name: self.type_name(),
                })
            }
        })
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Float(f) => Some(*f),
            ArgValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Members of a tuple or list.
    pub fn as_slice(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::Tuple(items) | ArgValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ArgValue::None)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Int(i64::from(value))
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Int(i64::from(value))
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ArgValue::None, Into::into)
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(value: Vec<ArgValue>) -> Self {
        ArgValue::List(value)
    }
}

/// JSON arrays become lists and JSON objects become maps, so neither is
/// hashable. Numbers that fit an `i64` stay integers.
impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ArgValue::None,
            serde_json::Value::Bool(b) => ArgValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ArgValue::Int(i),
                None => ArgValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ArgValue::Str(s),
            serde_json::Value::Array(items) => {
                ArgValue::List(items.into_iter().map(ArgValue::from).collect())
            }
            serde_json::Value::Object(entries) => ArgValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, ArgValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Typed extraction from an [`ArgValue`].
pub trait FromArgValue: Sized {
    /// Name of the expected type, used in [`BindError::WrongType`].
    const EXPECTED: &'static str;

    fn from_arg(value: &ArgValue) -> Option<Self>;

    /// Extract a value bound to `param`, reporting a type mismatch.
    fn extract(param: &str, value: &ArgValue) -> Result<Self, BindError> {
        Self::from_arg(value).ok_or_else(|| BindError::WrongType {
            param: param.to_string(),
            expected: Self::EXPECTED,
            got: value.type_name(),
        })
    }
}

impl FromArgValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromArgValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromArgValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromArgValue for String {
    const EXPECTED: &'static str = "str";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromArgValue for ArgValue {
    const EXPECTED: &'static str = "any";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromArgValue> FromArgValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::None => Some(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

impl<T: FromArgValue> FromArgValue for Vec<T> {
    const EXPECTED: &'static str = "sequence";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        value.as_slice()?.iter().map(T::from_arg).collect()
    }
}

/// Hashable projection of an [`ArgValue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyAtom {
    None,
    Bool(bool),
    Int(i64),
    /// IEEE-754 bit pattern, with `-0.0` folded into `0.0`.
    Float(u64),
    Str(String),
    Tuple(Vec<KeyAtom>),
}

impl KeyAtom {
    pub fn from_f64(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        KeyAtom::Float(value.to_bits())
    }
}

impl From<i64> for KeyAtom {
    fn from(value: i64) -> Self {
        KeyAtom::Int(value)
    }
}

impl From<i32> for KeyAtom {
    fn from(value: i32) -> Self {
        KeyAtom::Int(i64::from(value))
    }
}

impl From<bool> for KeyAtom {
    fn from(value: bool) -> Self {
        KeyAtom::Bool(value)
    }
}

impl From<f64> for KeyAtom {
    fn from(value: f64) -> Self {
        KeyAtom::from_f64(value)
    }
}

impl From<&str> for KeyAtom {
    fn from(value: &str) -> Self {
        KeyAtom::Str(value.to_string())
    }
}

impl fmt::Display for KeyAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAtom::None => write!(f, "None"),
            KeyAtom::Bool(true) => write!(f, "True"),
            KeyAtom::Bool(false) => write!(f, "False"),
            KeyAtom::Int(i) => write!(f, "{}", i),
            KeyAtom::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            KeyAtom::Str(s) => write!(f, "{:?}", s),
            KeyAtom::Tuple(items) => write_tuple(f, items),
        }
    }
}

pub(crate) fn write_tuple(f: &mut fmt::Formatter<'_>, items: &[KeyAtom]) -> fmt::Result {
    write!(f, "(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    if items.len() == 1 {
        write!(f, ",")?;
    }
    write!(f, ")")
}
