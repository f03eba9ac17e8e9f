//! Dynamically typed values produced by parsing and consumed as defaults.
//!
//! A [`Value`] mirrors the shape of a [`TypeDescriptor`](crate::TypeDescriptor):
//! scalars, enum members, sequences, tuples, ordered mappings and structs.
//! [`Value::Missing`] marks a hole inside a default instance; any field whose
//! default slice is missing becomes required.

use std::fmt;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

/// A parsed or default value.
///
/// # Examples
///
/// ```
/// use argschema_core::{StructValue, Value};
///
/// let value = Value::from(StructValue::new("HttpServer").with("port", 8080));
/// assert_eq!(value.to_string(), "HttpServer(port=8080)");
/// assert_eq!(value.attribute("port"), Some(&Value::Int(8080)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value of an optional field.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// A member of a named enumeration.
    Enum { ty: String, member: String },
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Ordered key/value associations.
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
    /// Placeholder for a value that must be supplied on the command line.
    Missing,
}

/// Field values of one struct instance, in declaration order.
///
/// `name` is the struct type name; for union fields it doubles as the tag of
/// the selected variant.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    /// Creates an empty instance of the named struct.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Sets a field, replacing an existing value in place.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }
}

impl Value {
    /// Single-token spelling of a scalar, as it would be typed on the
    /// command line.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::Value;
    ///
    /// assert_eq!(Value::Bool(true).token(), "True");
    /// assert_eq!(Value::Float(3.0).token(), "3.0");
    /// assert_eq!(Value::enumeration("Color", "RED").token(), "RED");
    /// ```
    pub fn token(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Str(s) => s.clone(),
            Self::Path(p) => p.display().to_string(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Enum { member, .. } => member.clone(),
            other => other.to_string(),
        }
    }

    /// Flattens the value into the tokens that would reproduce it.
    ///
    /// Sequences and tuples expand element-wise and mappings expand into
    /// key/value pairs, recursively.
    pub fn token_parts(&self) -> Vec<String> {
        match self {
            Self::List(items) | Self::Tuple(items) => {
                items.iter().flat_map(Value::token_parts).collect()
            }
            Self::Map(entries) => entries
                .iter()
                .flat_map(|(k, v)| k.token_parts().into_iter().chain(v.token_parts()))
                .collect(),
            other => vec![other.token()],
        }
    }

    /// Reads a named part of a composite value.
    ///
    /// Struct fields are looked up by name, mapping entries by the token of
    /// their key and tuple/list items by index.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(s) => s.get(name),
            Self::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.token() == name)
                .map(|(_, v)| v),
            Self::Tuple(items) | Self::List(items) => {
                name.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    }

    /// Returns `true` if this value or any value nested in it is
    /// [`Value::Missing`].
    pub fn contains_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::List(items) | Self::Tuple(items) => items.iter().any(Value::contains_missing),
            Self::Map(entries) => entries
                .iter()
                .any(|(k, v)| k.contains_missing() || v.contains_missing()),
            Self::Struct(s) => s.fields.iter().any(|(_, v)| v.contains_missing()),
            _ => false,
        }
    }

    /// Shorthand for an enum member.
    pub fn enumeration(ty: impl Into<String>, member: impl Into<String>) -> Self {
        Self::Enum {
            ty: ty.into(),
            member: member.into(),
        }
    }

    /// Converts to JSON. Structs become objects, mapping keys are rendered as
    /// tokens and enum members as their names.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::None | Self::Missing => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Str(_) | Self::Path(_) | Self::Bytes(_) | Self::Enum { .. } => {
                Json::String(self.token())
            }
            Self::List(items) | Self::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.token(), v.to_json()))
                    .collect(),
            ),
            Self::Struct(s) => Json::Object(
                s.fields
                    .iter()
                    .map(|(name, v)| (name.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Deserializes the value into a serde type through its JSON form.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::{StructValue, Value};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Point { x: i64, y: i64 }
    ///
    /// let value = Value::from(StructValue::new("Point").with("x", 1).with("y", 2));
    /// let point: Point = value.deserialize_into().unwrap();
    /// assert_eq!((point.x, point.y), (1, 2));
    /// ```
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Path(p) => write!(f, "'{}'", p.display()),
            Self::Bytes(b) => write!(f, "b'{}'", String::from_utf8_lossy(b)),
            other => write!(f, "{other}"),
        }
    }
}

/// Inserts into an ordered mapping; a repeated key keeps its position and
/// takes the new value.
pub(crate) fn insert_entry(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

/// Formats a float the way users expect to type it back: integral values
/// keep a trailing `.0`.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{sign}inf")
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_items(
            f: &mut fmt::Formatter<'_>,
            items: &[Value],
            open: &str,
            close: &str,
        ) -> fmt::Result {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                item.write_repr(f)?;
            }
            f.write_str(close)
        }

        match self {
            Self::Enum { ty, member } => write!(f, "{ty}.{member}"),
            Self::List(items) => write_items(f, items, "[", "]"),
            Self::Tuple(items) if items.len() == 1 => write_items(f, items, "(", ",)"),
            Self::Tuple(items) => write_items(f, items, "(", ")"),
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    k.write_repr(f)?;
                    f.write_str(": ")?;
                    v.write_repr(f)?;
                }
                f.write_str("}")
            }
            Self::Struct(s) => {
                write!(f, "{}(", s.name)?;
                for (i, (name, v)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}=")?;
                    v.write_repr(f)?;
                }
                f.write_str(")")
            }
            Self::Missing => f.write_str("MISSING"),
            scalar => f.write_str(&scalar.token()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Self::Struct(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}
