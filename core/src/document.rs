//! YAML schema documents.
//!
//! A [`SchemaDocument`] declares named struct and enum types, a root type
//! expression and an optional root default, so a parser can be described
//! without writing Rust. [`SchemaDocument::compile`] validates the document
//! and turns it into a [`CompiledSchema`].
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1"
//! program:
//!   prog: serve
//! root: Args
//! types:
//!   Color:
//!     enum: [RED, GREEN, BLUE]
//!   Args:
//!     description: Start a server.
//!     fields:
//!       - name: port
//!         type: int
//!         default: 8080
//!         help: Port to bind.
//!       - name: color
//!         type: optional[Color]
//!         default: null
//!       - name: tags
//!         type: list[str]
//!         markers: [positional]
//! ```
//!
//! Type expressions: `int`, `float`, `str`, `bool`, `path`, `bytes`, a
//! declared type `Name` or `Name[T, ...]`, `list[T]`, `tuple[T, ...]`,
//! `tuple[A, B]`, `dict[K, V]`, `optional[T]`, `union[A, B]` and
//! `literal[a, b, 1]`. Inside a generic struct its parameters are types too.

use std::collections::{BTreeMap, HashMap};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as Yaml;
use tracing::debug;

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::serialize::from_yaml_value;
use crate::types::{FieldDefault, FieldSchema, Marker, ScalarKind, StructSchema, TypeDescriptor};
use crate::validate::validate_document;
use crate::value::Value;

fn default_version() -> String {
    "1".to_string()
}

/// Keeps an explicit `null` as `Some(Null)`; an absent key stays `None`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Yaml>, D::Error>
where
    D: Deserializer<'de>,
{
    Yaml::deserialize(deserializer).map(Some)
}

/// A parser described in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Document format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Parser presentation settings.
    #[serde(default)]
    pub program: ParserConfig,
    /// Root type expression.
    pub root: String,
    /// Named type declarations.
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    /// Default instance of the root type.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default: Option<Yaml>,
}

/// A named type declaration: an enum when `enum` is given, otherwise a
/// struct, optionally generic over `params`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDecl>,
}

impl TypeDecl {
    pub fn is_enum(&self) -> bool {
        self.members.is_some()
    }
}

/// One struct field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default: Option<Yaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
    /// Leave the field out of the constructed value unless supplied.
    #[serde(default)]
    pub optional_key: bool,
}

/// Output of [`SchemaDocument::compile`].
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub root: TypeDescriptor,
    pub default: FieldDefault,
    pub config: ParserConfig,
}

impl SchemaDocument {
    /// Loads a document from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](Error::Io) if the file cannot be read, or
    /// [`Yaml`](Error::Yaml) if it is not a well-formed document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let document = serde_yaml::from_reader(reader)?;
        Ok(document)
    }

    /// Parses a document from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Validates the document and compiles every type it references.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::{FieldDefault, SchemaDocument, TypeDescriptor};
    ///
    /// let document = SchemaDocument::from_yaml_str(r#"
    /// root: Args
    /// types:
    ///   Args:
    ///     fields:
    ///       - { name: count, type: int, default: 3 }
    /// "#).unwrap();
    /// let compiled = document.compile().unwrap();
    /// assert!(matches!(compiled.root, TypeDescriptor::Struct(_)));
    /// assert_eq!(compiled.default, FieldDefault::Unset);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Schema`](Error::Schema) for validation failures and
    /// recursive type references, and [`Decode`](Error::Decode) when a
    /// default does not match its declared type.
    pub fn compile(&self) -> Result<CompiledSchema> {
        if let Some(first) = validate_document(self).into_iter().next() {
            return Err(Error::schema("<document>", first.to_string()));
        }
        let mut compiler = Compiler {
            types: &self.types,
            structs: HashMap::new(),
            stack: Vec::new(),
        };
        let root = compiler.type_expr(&self.root, &[], "root")?;
        let default = match &self.default {
            Some(yaml) => FieldDefault::Value(from_yaml_value(&root, yaml)?),
            None => FieldDefault::Unset,
        };
        debug!(
            root = %self.root,
            structs = compiler.structs.len(),
            "compiled schema document"
        );
        Ok(CompiledSchema {
            root,
            default,
            config: self.program.clone(),
        })
    }
}

/// Parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeExpr {
    Atom(String),
    Apply(String, Vec<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '[' | ']' | ',' => {
                chars.next();
                tokens.push(match c {
                    '[' => Token::Open,
                    ']' => Token::Close,
                    _ => Token::Comma,
                });
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' | '"' => {
                let quote = c;
                let mut word = String::from(quote);
                chars.next();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => word.push(c),
                        None => return Err(format!("unterminated quote in `{text}`")),
                    }
                }
                word.push(quote);
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if matches!(c, '[' | ']' | ',') || c.is_whitespace() {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

/// Parses a type expression such as `dict[str, list[int]]`.
pub(crate) fn parse_type_expr(text: &str) -> std::result::Result<TypeExpr, String> {
    let tokens = tokenize(text)?;
    let mut pos = 0;
    let expr = parse_expr(&tokens, &mut pos, text)?;
    if pos != tokens.len() {
        return Err(format!("unexpected trailing input in `{text}`"));
    }
    Ok(expr)
}

fn parse_expr(tokens: &[Token], pos: &mut usize, text: &str) -> std::result::Result<TypeExpr, String> {
    let Some(Token::Word(name)) = tokens.get(*pos) else {
        return Err(format!("expected a type name in `{text}`"));
    };
    *pos += 1;
    if tokens.get(*pos) != Some(&Token::Open) {
        return Ok(TypeExpr::Atom(name.clone()));
    }
    *pos += 1;
    let mut args = vec![parse_expr(tokens, pos, text)?];
    loop {
        match tokens.get(*pos) {
            Some(Token::Comma) => {
                *pos += 1;
                args.push(parse_expr(tokens, pos, text)?);
            }
            Some(Token::Close) => {
                *pos += 1;
                return Ok(TypeExpr::Apply(name.clone(), args));
            }
            _ => return Err(format!("expected `,` or `]` in `{text}`")),
        }
    }
}

pub(crate) fn scalar(name: &str) -> Option<ScalarKind> {
    Some(match name {
        "int" => ScalarKind::Int,
        "float" => ScalarKind::Float,
        "str" => ScalarKind::Str,
        "bool" => ScalarKind::Bool,
        "path" => ScalarKind::Path,
        "bytes" => ScalarKind::Bytes,
        _ => return None,
    })
}

/// Type constructors that take arguments.
pub(crate) const BUILTIN_GENERICS: [&str; 6] = ["list", "tuple", "dict", "optional", "union", "literal"];

fn literal_value(atom: &str) -> Value {
    let quoted = atom.len() >= 2
        && ((atom.starts_with('\'') && atom.ends_with('\''))
            || (atom.starts_with('"') && atom.ends_with('"')));
    if quoted {
        return Value::Str(atom[1..atom.len() - 1].to_string());
    }
    match atom {
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        "None" => return Value::None,
        _ => {}
    }
    if let Ok(i) = atom.parse::<i64>() {
        return Value::Int(i);
    }
    match atom.parse::<f64>() {
        Ok(f) if atom.chars().any(|c| c.is_ascii_digit()) => Value::Float(f),
        _ => Value::Str(atom.to_string()),
    }
}

struct Compiler<'a> {
    types: &'a BTreeMap<String, TypeDecl>,
    structs: HashMap<String, Arc<StructSchema>>,
    stack: Vec<String>,
}

impl Compiler<'_> {
    fn type_expr(&mut self, text: &str, params: &[String], location: &str) -> Result<TypeDescriptor> {
        let expr = parse_type_expr(text).map_err(|message| Error::schema(location, message))?;
        self.compile(&expr, params, location)
    }

    fn compile(&mut self, expr: &TypeExpr, params: &[String], location: &str) -> Result<TypeDescriptor> {
        let arity = |name: &str, args: &[TypeExpr], n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(Error::schema(
                    location,
                    format!("`{name}` takes {n} type argument(s), got {}", args.len()),
                ))
            }
        };
        match expr {
            TypeExpr::Atom(name) => {
                if let Some(kind) = scalar(name) {
                    return Ok(TypeDescriptor::Scalar(kind));
                }
                if params.contains(name) {
                    return Ok(TypeDescriptor::type_var(name.clone()));
                }
                self.named(name, Vec::new(), location)
            }
            TypeExpr::Apply(name, args) => match name.as_str() {
                "list" => {
                    arity(name, args, 1)?;
                    Ok(TypeDescriptor::list(self.compile(&args[0], params, location)?))
                }
                "optional" => {
                    arity(name, args, 1)?;
                    Ok(TypeDescriptor::optional(self.compile(&args[0], params, location)?))
                }
                "dict" => {
                    arity(name, args, 2)?;
                    Ok(TypeDescriptor::mapping(
                        self.compile(&args[0], params, location)?,
                        self.compile(&args[1], params, location)?,
                    ))
                }
                "tuple" => match args.as_slice() {
                    [element, TypeExpr::Atom(dots)] if dots == "..." => Ok(
                        TypeDescriptor::var_tuple(self.compile(element, params, location)?),
                    ),
                    _ => Ok(TypeDescriptor::tuple(self.compile_all(args, params, location)?)),
                },
                "union" => Ok(TypeDescriptor::union(self.compile_all(args, params, location)?)),
                "literal" => args
                    .iter()
                    .map(|arg| match arg {
                        TypeExpr::Atom(atom) => Ok(literal_value(atom)),
                        TypeExpr::Apply(..) => Err(Error::schema(
                            location,
                            "literal values cannot be type expressions",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(TypeDescriptor::literal),
                _ => {
                    let args = self.compile_all(args, params, location)?;
                    self.named(name, args, location)
                }
            },
        }
    }

    fn compile_all(
        &mut self,
        args: &[TypeExpr],
        params: &[String],
        location: &str,
    ) -> Result<Vec<TypeDescriptor>> {
        args.iter()
            .map(|arg| self.compile(arg, params, location))
            .collect()
    }

    fn named(&mut self, name: &str, args: Vec<TypeDescriptor>, location: &str) -> Result<TypeDescriptor> {
        match self.types.get(name) {
            Some(TypeDecl {
                members: Some(members),
                ..
            }) if args.is_empty() => Ok(TypeDescriptor::enumeration(name, members.iter().cloned())),
            Some(decl) if decl.is_enum() => Err(Error::schema(
                location,
                format!("enum `{name}` takes no type arguments"),
            )),
            Some(decl) => {
                let schema = self.structure(name, decl)?;
                Ok(TypeDescriptor::generic(schema, args))
            }
            None => Err(Error::schema(location, format!("unknown type `{name}`"))),
        }
    }

    fn structure(&mut self, name: &str, decl: &TypeDecl) -> Result<Arc<StructSchema>> {
        if let Some(schema) = self.structs.get(name) {
            return Ok(Arc::clone(schema));
        }
        if self.stack.iter().any(|open| open == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(Error::schema(
                name,
                format!("recursive type reference: {}", chain.join(" -> ")),
            ));
        }
        self.stack.push(name.to_string());

        let mut schema = StructSchema::new(name).type_params(decl.params.iter().cloned());
        schema.description = decl.description.clone();
        for field in &decl.fields {
            let location = format!("{name}.{}", field.name);
            let ty = self.type_expr(&field.ty, &decl.params, &location)?;
            let mut compiled = FieldSchema::new(field.name.clone(), ty);
            compiled.default = match &field.default {
                _ if field.optional_key => FieldDefault::ExcludeFromCall,
                Some(yaml) => FieldDefault::Value(from_yaml_value(&compiled.ty, yaml)?),
                None => FieldDefault::Unset,
            };
            compiled.help = field.help.clone();
            compiled.markers = field.markers.iter().copied().collect();
            schema = schema.field(compiled);
        }

        self.stack.pop();
        let schema = Arc::new(schema);
        self.structs.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }
}
