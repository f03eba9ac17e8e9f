//! Schema model and lowering pipeline for typed command-line interfaces.
//!
//! This crate turns a tree of typed fields into flag definitions and back:
//!
//! - [`TypeDescriptor`], [`StructSchema`], [`FieldSchema`] describe the
//!   schema; [`Value`] is the typed result and the shape of defaults.
//! - [`resolve`] walks a root type and default into a tree of
//!   [`FieldNode`]s, slicing defaults and binding type parameters.
//! - [`instantiator_from_type`] builds the token parser and arity metadata
//!   for one leaf type.
//! - [`ArgumentDefinition::lower`] runs the ordered lowering rules and yields
//!   a [`LoweredArgumentDefinition`] for a flag parser.
//! - [`NameRegistry`] normalizes `-`/`_` spellings of dotted flag names.
//! - [`to_yaml`]/[`from_yaml`] serialize values; [`SchemaDocument`] describes
//!   a whole parser in YAML.
//!
//! The flag parser itself lives in the `argschema` crate.
//!
//! # Example
//!
//! ```
//! use argschema_core::*;
//!
//! let schema = StructSchema::new("Args")
//!     .field(FieldSchema::new("x", TypeDescriptor::int()).help("Documentation 1"))
//!     .field(FieldSchema::new("flag", TypeDescriptor::boolean()).default(false));
//! assert!(validate_struct(&schema).is_empty());
//!
//! let FieldNode::Nested(root) = resolve(&schema.into(), FieldDefault::Unset).unwrap() else {
//!     unreachable!()
//! };
//! let flags: Vec<String> = root
//!     .tree
//!     .children
//!     .iter()
//!     .filter_map(|child| match child {
//!         FieldNode::Leaf(arg) => arg.lower().ok().map(|lowered| lowered.name_or_flag),
//!         _ => None,
//!     })
//!     .collect();
//! assert_eq!(flags, ["--x", "--flag"]);
//! ```

mod arguments;
mod config;
mod document;
mod error;
mod instantiators;
mod resolver;
mod serialize;
mod strings;
mod types;
mod validate;
mod value;

pub use arguments::{
    AllowedValues, ArgumentDefinition, ArgumentSummary, FlagAction, HelpText, LoweredArgumentDefinition,
    LoweredDefault,
};
pub use config::ParserConfig;
pub use document::{CompiledSchema, FieldDecl, SchemaDocument, TypeDecl};
pub use error::{Error, ParseError, Result};
pub use instantiators::{
    Arity, Instantiator, InstantiatorMetadata, TokenFn, UnsupportedTypeError, instantiator_from_type,
};
pub use resolver::{
    FieldDefinition, FieldNode, NestedNode, StructTree, TreeKind, UnionNode, Variant, resolve,
};
pub use serialize::{from_yaml, from_yaml_value, to_yaml, to_yaml_value};
pub use strings::{
    FlagValues, MISSING_PLACEHOLDER, NameRegistry, escape_percent, join_path, join_union_metavars,
    make_field_name, multi_metavar, normalize_name, selector_token, shell_quote, unescape_percent,
    variant_name,
};
pub use types::*;
pub use validate::{ValidationError, validate_document, validate_struct};
pub use value::{StructValue, Value};
