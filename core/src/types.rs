//! Schema type definitions.
//!
//! A schema is a tree of [`TypeDescriptor`]s built ahead of time, either in
//! code with the builder methods below or by compiling a
//! [`SchemaDocument`](crate::SchemaDocument). Structs carry ordered
//! [`FieldSchema`]s with defaults, help text and [`Marker`]s; generic structs
//! declare type parameters that are bound through an explicit substitution
//! map during resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::value::{StructValue, Value};

/// Binding of type-variable names to concrete types.
pub type Substitutions = BTreeMap<String, TypeDescriptor>;

/// Hook that recomputes derived fields after a struct is assembled.
pub type PostInit = fn(&mut StructValue);

/// Primitive value kinds with a canonical string conversion.
///
/// # Examples
///
/// ```
/// use argschema_core::{ScalarKind, Value};
///
/// assert_eq!(ScalarKind::Int.parse("42").unwrap(), Value::Int(42));
/// assert_eq!(ScalarKind::Bool.parse("True").unwrap(), Value::Bool(true));
/// assert!(ScalarKind::Float.parse("abc").is_err());
/// assert_eq!(ScalarKind::Path.metavar(), "PATH");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
    Path,
    Bytes,
}

impl ScalarKind {
    /// Converts one token into a value of this kind.
    pub fn parse(self, token: &str) -> Result<Value, ParseError> {
        let invalid = || ParseError::InvalidToken {
            token: token.to_string(),
            expected: self.metavar().to_string(),
        };
        match self {
            Self::Bool => match token {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                _ => Err(ParseError::InvalidChoice {
                    token: token.to_string(),
                    choices: vec!["True".to_string(), "False".to_string()],
                }),
            },
            Self::Int => token.parse().map(Value::Int).map_err(|_| invalid()),
            Self::Float => token.parse().map(Value::Float).map_err(|_| invalid()),
            Self::Str => Ok(Value::Str(token.to_string())),
            Self::Path => Ok(Value::Path(PathBuf::from(token))),
            Self::Bytes if token.is_ascii() => Ok(Value::Bytes(token.as_bytes().to_vec())),
            Self::Bytes => Err(invalid()),
        }
    }

    /// Display placeholder used in help output.
    pub fn metavar(self) -> &'static str {
        match self {
            Self::Bool => "{True,False}",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Str => "STR",
            Self::Path => "PATH",
            Self::Bytes => "BYTES",
        }
    }

    /// Lower-case type name, used when naming generic variants.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Path => "path",
            Self::Bytes => "bytes",
        }
    }
}

/// A fixed set of allowed values: an enumeration or a literal set.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceSet {
    /// Enumeration name; `None` for literal sets.
    pub name: Option<String>,
    pub values: Vec<Value>,
}

impl ChoiceSet {
    /// Tokens a user types to pick each value, in declaration order.
    pub fn tokens(&self) -> Vec<String> {
        self.values.iter().map(Value::token).collect()
    }
}

/// Container produced for a variable-length sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceKind {
    #[default]
    List,
    Tuple,
}

/// A generic application of a struct schema.
#[derive(Debug, Clone)]
pub struct StructType {
    pub schema: Arc<StructSchema>,
    /// Type arguments, positionally matching `schema.type_params`.
    pub args: Vec<TypeDescriptor>,
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.schema, &other.schema) || self.schema.name == other.schema.name)
            && self.args == other.args
    }
}

/// Closed description of every type the engine understands.
///
/// # Examples
///
/// ```
/// use argschema_core::{FieldSchema, StructSchema, TypeDescriptor};
///
/// let ty = TypeDescriptor::from(
///     StructSchema::new("Args")
///         .field(FieldSchema::new("count", TypeDescriptor::int()).default(3))
///         .field(FieldSchema::new("tags", TypeDescriptor::list(TypeDescriptor::string()))),
/// );
/// assert!(matches!(ty, TypeDescriptor::Struct(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    /// Enumeration or literal set.
    Choice(ChoiceSet),
    Optional(Box<TypeDescriptor>),
    /// Homogeneous variable-length sequence.
    Sequence {
        element: Box<TypeDescriptor>,
        kind: SequenceKind,
    },
    /// Fixed-length heterogeneous tuple.
    Tuple(Vec<TypeDescriptor>),
    Mapping(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Struct(StructType),
    /// Ordered alternatives.
    Union(Vec<TypeDescriptor>),
    /// Reference to a type parameter of the enclosing struct.
    TypeVar(String),
    /// A named type with no string conversion.
    Opaque(String),
}

impl TypeDescriptor {
    pub fn boolean() -> Self {
        Self::Scalar(ScalarKind::Bool)
    }

    pub fn int() -> Self {
        Self::Scalar(ScalarKind::Int)
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarKind::Float)
    }

    pub fn string() -> Self {
        Self::Scalar(ScalarKind::Str)
    }

    pub fn path() -> Self {
        Self::Scalar(ScalarKind::Path)
    }

    pub fn bytes() -> Self {
        Self::Scalar(ScalarKind::Bytes)
    }

    pub fn optional(inner: impl Into<TypeDescriptor>) -> Self {
        Self::Optional(Box::new(inner.into()))
    }

    pub fn list(element: impl Into<TypeDescriptor>) -> Self {
        Self::Sequence {
            element: Box::new(element.into()),
            kind: SequenceKind::List,
        }
    }

    /// Variable-length tuple, e.g. `Tuple[int, ...]`.
    pub fn var_tuple(element: impl Into<TypeDescriptor>) -> Self {
        Self::Sequence {
            element: Box::new(element.into()),
            kind: SequenceKind::Tuple,
        }
    }

    pub fn tuple(elements: Vec<TypeDescriptor>) -> Self {
        Self::Tuple(elements)
    }

    pub fn mapping(key: impl Into<TypeDescriptor>, value: impl Into<TypeDescriptor>) -> Self {
        Self::Mapping(Box::new(key.into()), Box::new(value.into()))
    }

    pub fn union(variants: Vec<TypeDescriptor>) -> Self {
        Self::Union(variants)
    }

    pub fn type_var(name: impl Into<String>) -> Self {
        Self::TypeVar(name.into())
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        Self::Opaque(name.into())
    }

    /// Literal set of allowed values.
    pub fn literal(values: Vec<Value>) -> Self {
        Self::Choice(ChoiceSet { name: None, values })
    }

    /// Named enumeration; members are matched by name.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::{TypeDescriptor, Value};
    ///
    /// let color = TypeDescriptor::enumeration("Color", ["RED", "GREEN"]);
    /// let TypeDescriptor::Choice(set) = color else { unreachable!() };
    /// assert_eq!(set.values[1], Value::enumeration("Color", "GREEN"));
    /// ```
    pub fn enumeration<I, S>(name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choice(ChoiceSet {
            name: Some(name.to_string()),
            values: members
                .into_iter()
                .map(|member| Value::enumeration(name, member))
                .collect(),
        })
    }

    /// Applies a generic struct schema to type arguments.
    pub fn generic(schema: Arc<StructSchema>, args: Vec<TypeDescriptor>) -> Self {
        Self::Struct(StructType { schema, args })
    }

    /// Replaces every bound type variable, including struct type arguments.
    ///
    /// Returns the name of the first unbound variable on failure.
    pub fn substitute(&self, subs: &Substitutions) -> Result<TypeDescriptor, String> {
        let each = |items: &[TypeDescriptor]| {
            items
                .iter()
                .map(|item| item.substitute(subs))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match self {
            Self::TypeVar(name) => return subs.get(name).cloned().ok_or_else(|| name.clone()),
            Self::Optional(inner) => Self::Optional(Box::new(inner.substitute(subs)?)),
            Self::Sequence { element, kind } => Self::Sequence {
                element: Box::new(element.substitute(subs)?),
                kind: *kind,
            },
            Self::Tuple(items) => Self::Tuple(each(items)?),
            Self::Mapping(k, v) => {
                Self::Mapping(Box::new(k.substitute(subs)?), Box::new(v.substitute(subs)?))
            }
            Self::Struct(st) => Self::Struct(StructType {
                schema: Arc::clone(&st.schema),
                args: each(&st.args)?,
            }),
            Self::Union(items) => Self::Union(each(items)?),
            Self::Scalar(_) | Self::Choice(_) | Self::Opaque(_) => self.clone(),
        })
    }
}

impl From<StructSchema> for TypeDescriptor {
    fn from(schema: StructSchema) -> Self {
        Self::from(Arc::new(schema))
    }
}

impl From<Arc<StructSchema>> for TypeDescriptor {
    fn from(schema: Arc<StructSchema>) -> Self {
        Self::Struct(StructType {
            schema,
            args: Vec::new(),
        })
    }
}

impl From<ScalarKind> for TypeDescriptor {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

/// Per-field annotations that alter lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// The field always takes its default and cannot be set.
    Fixed,
    /// The field is parsed from positional tokens.
    Positional,
    /// The field is hidden from help output.
    Suppress,
    /// Booleans require an explicit `True`/`False` token.
    FlagConversionOff,
    /// A defaulted union is fixed to its default instead of becoming a
    /// subcommand.
    AvoidSubcommands,
}

impl Marker {
    /// Markers inherited by every descendant of a nested field.
    pub fn is_inherited(self) -> bool {
        matches!(self, Self::Fixed | Self::Suppress | Self::FlagConversionOff)
    }
}

/// Default of a field.
///
/// The three sentinel cases drive different required/help behaviour and
/// must not be conflated.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    /// A concrete default value.
    Value(Value),
    /// No default anywhere; the field is required.
    #[default]
    Unset,
    /// An ancestor default exists but lacks this branch; the field is
    /// required.
    PropagatedMissing,
    /// The field is left out of the constructed value when not supplied.
    ExcludeFromCall,
}

impl FieldDefault {
    /// Returns `true` if the field needs no user input.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Value(_) | Self::ExcludeFromCall)
    }
}

/// One declared field of a struct.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub ty: TypeDescriptor,
    pub default: FieldDefault,
    pub help: Option<String>,
    pub markers: BTreeSet<Marker>,
}

impl FieldSchema {
    /// Creates a required field.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            default: FieldDefault::Unset,
            help: None,
            markers: BTreeSet::new(),
        }
    }

    /// Sets a concrete default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Leaves the field out of the constructed value unless supplied.
    pub fn exclude_from_call(mut self) -> Self {
        self.default = FieldDefault::ExcludeFromCall;
        self
    }

    /// Adds documentation text.
    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Adds a marker.
    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.insert(marker);
        self
    }
}

/// Declaration of a (possibly generic) struct.
///
/// # Examples
///
/// ```
/// use argschema_core::{FieldSchema, StructSchema, TypeDescriptor};
///
/// let schema = StructSchema::new("Wrapper")
///     .type_params(["T"])
///     .field(FieldSchema::new("inner", TypeDescriptor::type_var("T")));
/// assert_eq!(schema.type_params, vec!["T".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct StructSchema {
    pub name: String,
    pub description: Option<String>,
    pub type_params: Vec<String>,
    pub fields: Vec<FieldSchema>,
    pub post_init: Option<PostInit>,
}

impl StructSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_params: Vec::new(),
            fields: Vec::new(),
            post_init: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn type_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Registers a hook run after the struct's fields are assembled.
    pub fn post_init(mut self, hook: PostInit) -> Self {
        self.post_init = Some(hook);
        self
    }
}
