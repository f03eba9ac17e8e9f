//! Instantiator factory: turns a leaf type into a token parser plus the
//! metadata a flag parser needs (arity, allowed values, placeholder).
//!
//! Every instantiator is a pure function from an ordered list of raw tokens
//! to a [`Value`]. Composite types are handled here by recursion; structs and
//! unions of structs never reach the factory because the resolver expands
//! them into nested fields and subcommands.
//!
//! # Examples
//!
//! ```
//! use argschema_core::{Arity, Substitutions, TypeDescriptor, Value, instantiator_from_type};
//!
//! let ty = TypeDescriptor::tuple(vec![TypeDescriptor::int(), TypeDescriptor::string()]);
//! let (instantiator, meta) = instantiator_from_type(&ty, &Substitutions::new()).unwrap();
//! assert_eq!(meta.nargs, Arity::Exactly(2));
//! assert_eq!(meta.metavar, "INT STR");
//!
//! let tokens = ["3".to_string(), "abc".to_string()];
//! assert_eq!(
//!     instantiator.instantiate(&tokens).unwrap(),
//!     Value::Tuple(vec![Value::Int(3), Value::from("abc")]),
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::error::ParseError;
use crate::strings::{join_union_metavars, multi_metavar};
use crate::types::{ChoiceSet, ScalarKind, SequenceKind, Substitutions, TypeDescriptor};
use crate::value::{Value, insert_entry};

/// Signature shared by every token instantiator.
pub type TokenFn = dyn Fn(&[String]) -> Result<Value, ParseError> + Send + Sync;

/// Converts parsed input into a typed value.
#[derive(Clone)]
pub enum Instantiator {
    /// Store-true/store-false flag; the parser hands over a boolean directly.
    Flag,
    /// Parses raw tokens.
    Tokens(Arc<TokenFn>),
}

impl Instantiator {
    /// Runs a token instantiator.
    ///
    /// A flag instantiator accepts a single `True`/`False` token.
    pub fn instantiate(&self, tokens: &[String]) -> Result<Value, ParseError> {
        match self {
            Self::Tokens(make) => make(tokens),
            Self::Flag => match tokens {
                [token] => ScalarKind::Bool.parse(token),
                _ => Err(ParseError::WrongCount {
                    expected: "0".to_string(),
                    found: tokens.len(),
                }),
            },
        }
    }
}

impl fmt::Debug for Instantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => f.write_str("Instantiator::Flag"),
            Self::Tokens(_) => f.write_str("Instantiator::Tokens(..)"),
        }
    }
}

/// Number of raw tokens an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Exactly(usize),
    OneOrMore,
    ZeroOrOne,
    /// All remaining tokens, possibly none.
    All,
}

impl Arity {
    /// Whether exactly `count` tokens satisfy this arity.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => count == n,
            Self::OneOrMore => count >= 1,
            Self::ZeroOrOne => count <= 1,
            Self::All => true,
        }
    }

    /// The token count, if fixed.
    pub fn fixed(self) -> Option<usize> {
        match self {
            Self::Exactly(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "{n}"),
            Self::OneOrMore => f.write_str("+"),
            Self::ZeroOrOne => f.write_str("?"),
            Self::All => f.write_str("*"),
        }
    }
}

/// Parsing metadata produced alongside an instantiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiatorMetadata {
    pub nargs: Arity,
    pub metavar: String,
    pub choices: Option<Vec<String>>,
}

impl InstantiatorMetadata {
    /// Fails on the first token outside the allowed set.
    pub fn check_choices(&self, tokens: &[String]) -> Result<(), ParseError> {
        let Some(choices) = &self.choices else {
            return Ok(());
        };
        match tokens.iter().find(|token| !choices.contains(token)) {
            Some(token) => Err(ParseError::InvalidChoice {
                token: token.clone(),
                choices: choices.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// The factory could not build an instantiator for a type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UnsupportedTypeError(pub String);

/// Builds the instantiator and metadata for a leaf type.
///
/// Type variables are resolved through `subs`.
pub fn instantiator_from_type(
    ty: &TypeDescriptor,
    subs: &Substitutions,
) -> Result<(Instantiator, InstantiatorMetadata), UnsupportedTypeError> {
    let (make, meta) = build(ty, subs)?;
    Ok((Instantiator::Tokens(make), meta))
}

type Built = (Arc<TokenFn>, InstantiatorMetadata);

fn unsupported(reason: impl Into<String>) -> UnsupportedTypeError {
    UnsupportedTypeError(reason.into())
}

fn build(ty: &TypeDescriptor, subs: &Substitutions) -> Result<Built, UnsupportedTypeError> {
    match ty {
        TypeDescriptor::TypeVar(name) => match subs.get(name) {
            Some(bound) => build(bound, subs),
            None => Err(unsupported(format!("unbound type variable `{name}`"))),
        },
        TypeDescriptor::Opaque(name) => Err(unsupported(format!("`{name}` is not a parsable type"))),
        TypeDescriptor::Scalar(kind) => Ok(from_scalar(*kind)),
        TypeDescriptor::Choice(set) => Ok(from_choices(set)),
        TypeDescriptor::Optional(inner) => from_union(std::slice::from_ref(inner.as_ref()), true, subs),
        TypeDescriptor::Union(options) => from_union(options, false, subs),
        TypeDescriptor::Sequence { element, kind } => from_sequence(element, *kind, subs),
        TypeDescriptor::Tuple(elements) => from_tuple(elements, subs),
        TypeDescriptor::Mapping(key, value) => from_mapping(key, value, subs),
        TypeDescriptor::Struct(st) => Err(unsupported(format!(
            "`{}` is a struct and cannot be parsed from a single argument",
            st.schema.name
        ))),
    }
}

/// Builds an element instantiator that must consume a fixed number of tokens.
fn build_fixed(
    ty: &TypeDescriptor,
    subs: &Substitutions,
) -> Result<(Arc<TokenFn>, InstantiatorMetadata, usize), UnsupportedTypeError> {
    let (make, meta) = build(ty, subs)?;
    match meta.nargs.fixed() {
        Some(n) if n > 0 => Ok((make, meta, n)),
        _ => Err(unsupported(
            "variable-length sequences cannot be nested inside other containers",
        )),
    }
}

fn from_scalar(kind: ScalarKind) -> Built {
    let make: Arc<TokenFn> = Arc::new(move |tokens| match tokens {
        [token] => kind.parse(token),
        _ => Err(ParseError::WrongCount {
            expected: "1".to_string(),
            found: tokens.len(),
        }),
    });
    let choices = (kind == ScalarKind::Bool).then(|| vec!["True".to_string(), "False".to_string()]);
    (
        make,
        InstantiatorMetadata {
            nargs: Arity::Exactly(1),
            metavar: kind.metavar().to_string(),
            choices,
        },
    )
}

fn from_choices(set: &ChoiceSet) -> Built {
    let tokens = set.tokens();
    let values = set.values.clone();
    let allowed = tokens.clone();
    let make: Arc<TokenFn> = Arc::new(move |input| match input {
        [token] => allowed
            .iter()
            .position(|allowed| allowed == token)
            .map(|i| values[i].clone())
            .ok_or_else(|| ParseError::InvalidChoice {
                token: token.clone(),
                choices: allowed.clone(),
            }),
        _ => Err(ParseError::WrongCount {
            expected: "1".to_string(),
            found: input.len(),
        }),
    });
    (
        make,
        InstantiatorMetadata {
            nargs: Arity::Exactly(1),
            metavar: format!("{{{}}}", tokens.join(",")),
            choices: Some(tokens),
        },
    )
}

fn none_alternative() -> Built {
    let make: Arc<TokenFn> = Arc::new(|tokens| match tokens {
        [token] if token == "None" => Ok(Value::None),
        _ => Err(ParseError::InvalidChoice {
            token: tokens.join(" "),
            choices: vec!["None".to_string()],
        }),
    });
    (
        make,
        InstantiatorMetadata {
            nargs: Arity::Exactly(1),
            metavar: "{None}".to_string(),
            choices: Some(vec!["None".to_string()]),
        },
    )
}

/// Scalar-like unions: alternatives are tried left to right, `None` first.
fn from_union(
    options: &[TypeDescriptor],
    optional: bool,
    subs: &Substitutions,
) -> Result<Built, UnsupportedTypeError> {
    let mut alternatives = Vec::with_capacity(options.len() + 1);
    if optional {
        alternatives.push(none_alternative());
    }
    let mut nargs: Option<Arity> = None;
    for option in options {
        let resolved = option
            .substitute(subs)
            .map_err(|name| unsupported(format!("unbound type variable `{name}`")))?;
        if matches!(resolved, TypeDescriptor::Struct(_)) {
            return Err(unsupported(
                "unions containing structs can only be selected with subcommands",
            ));
        }
        let (make, meta) = build(&resolved, subs)?;
        nargs = Some(match nargs {
            None => meta.nargs,
            Some(prev) if prev == meta.nargs => prev,
            Some(_) => Arity::OneOrMore,
        });
        alternatives.push((make, meta));
    }

    let metavars: Vec<String> = alternatives.iter().map(|(_, m)| m.metavar.clone()).collect();
    let metavar = join_union_metavars(&metavars);
    let shown = metavar.clone();
    let make: Arc<TokenFn> = Arc::new(move |tokens| {
        for (make, meta) in &alternatives {
            if meta.check_choices(tokens).is_err() || !meta.nargs.accepts(tokens.len()) {
                continue;
            }
            if let Ok(value) = make(tokens) {
                return Ok(value);
            }
        }
        Err(ParseError::NoMatchingAlternative {
            tokens: tokens.to_vec(),
            metavar: shown.clone(),
        })
    });
    Ok((
        make,
        InstantiatorMetadata {
            nargs: nargs.unwrap_or(Arity::Exactly(1)),
            metavar,
            choices: None,
        },
    ))
}

fn from_sequence(
    element: &TypeDescriptor,
    kind: SequenceKind,
    subs: &Substitutions,
) -> Result<Built, UnsupportedTypeError> {
    let (inner, inner_meta, step) = build_fixed(element, subs)?;
    let make: Arc<TokenFn> = Arc::new(move |tokens| {
        if tokens.len() % step != 0 {
            return Err(ParseError::WrongCount {
                expected: format!("a multiple of {step}"),
                found: tokens.len(),
            });
        }
        let items = tokens
            .chunks(step)
            .map(|chunk| inner(chunk))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match kind {
            SequenceKind::List => Value::List(items),
            SequenceKind::Tuple => Value::Tuple(items),
        })
    });
    Ok((
        make,
        InstantiatorMetadata {
            nargs: Arity::OneOrMore,
            metavar: multi_metavar(&inner_meta.metavar),
            choices: inner_meta.choices,
        },
    ))
}

fn from_tuple(
    elements: &[TypeDescriptor],
    subs: &Substitutions,
) -> Result<Built, UnsupportedTypeError> {
    if elements.is_empty() {
        return Err(unsupported("empty tuples cannot be parsed"));
    }
    let slots = elements
        .iter()
        .map(|element| build_fixed(element, subs))
        .collect::<Result<Vec<_>, _>>()?;
    let total: usize = slots.iter().map(|(_, _, n)| n).sum();
    let metavar = slots
        .iter()
        .map(|(_, meta, _)| meta.metavar.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let make: Arc<TokenFn> = Arc::new(move |tokens| {
        if tokens.len() != total {
            return Err(ParseError::WrongCount {
                expected: total.to_string(),
                found: tokens.len(),
            });
        }
        let mut rest = tokens;
        let mut items = Vec::with_capacity(slots.len());
        for (make, meta, n) in &slots {
            let (slot, tail) = rest.split_at(*n);
            meta.check_choices(slot)?;
            items.push(make(slot)?);
            rest = tail;
        }
        Ok(Value::Tuple(items))
    });
    Ok((
        make,
        InstantiatorMetadata {
            nargs: Arity::Exactly(total),
            metavar,
            choices: None,
        },
    ))
}

fn from_mapping(
    key: &TypeDescriptor,
    value: &TypeDescriptor,
    subs: &Substitutions,
) -> Result<Built, UnsupportedTypeError> {
    let (make_key, key_meta, key_n) = build_fixed(key, subs)?;
    let (make_value, value_meta, value_n) = build_fixed(value, subs)?;
    let pair_metavar = format!("{} {}", key_meta.metavar, value_meta.metavar);
    let pair = key_n + value_n;

    let make: Arc<TokenFn> = Arc::new(move |tokens| {
        if tokens.len() % pair != 0 {
            return Err(ParseError::WrongCount {
                expected: format!("a multiple of {pair} (incomplete set of key value pairs)"),
                found: tokens.len(),
            });
        }
        let mut entries = Vec::with_capacity(tokens.len() / pair);
        for group in tokens.chunks(pair) {
            let (k, v) = group.split_at(key_n);
            key_meta.check_choices(k)?;
            value_meta.check_choices(v)?;
            insert_entry(&mut entries, make_key(k)?, make_value(v)?);
        }
        Ok(Value::Map(entries))
    });
    Ok((
        make,
        InstantiatorMetadata {
            nargs: Arity::OneOrMore,
            metavar: multi_metavar(&pair_metavar),
            choices: None,
        },
    ))
}
