//! YAML codec for [`Value`]s.
//!
//! Structs are written as mappings tagged with their type name
//! (`!HTTPServer`) and [`Value::Missing`] as `!missing`, so union variants
//! and holes in a default instance survive a round trip. Decoding is guided
//! by a [`TypeDescriptor`]: the tag picks the variant of a union of structs,
//! and untagged values fall back to the first alternative that decodes.
//!
//! # Examples
//!
//! ```
//! use argschema_core::*;
//!
//! let ty = TypeDescriptor::from(
//!     StructSchema::new("Server").field(FieldSchema::new("port", TypeDescriptor::int())),
//! );
//! let value = Value::from(StructValue::new("Server").with("port", 8080));
//!
//! let text = to_yaml(&value).unwrap();
//! assert!(text.starts_with("!Server"));
//! assert_eq!(from_yaml(&ty, &text).unwrap(), value);
//! ```

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value as Yaml};

use crate::error::{Error, Result};
use crate::strings::join_path;
use crate::types::{ScalarKind, SequenceKind, StructType, Substitutions, TypeDescriptor};
use crate::value::{StructValue, Value, format_float, insert_entry};

const MISSING_TAG: &str = "missing";

/// Serializes a value to a YAML document.
pub fn to_yaml(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(&to_yaml_value(value))?)
}

/// Converts a value into a YAML tree.
pub fn to_yaml_value(value: &Value) -> Yaml {
    match value {
        Value::None => Yaml::Null,
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Int(i) => Yaml::Number((*i).into()),
        Value::Float(f) => Yaml::Number((*f).into()),
        Value::Str(_) | Value::Path(_) | Value::Bytes(_) | Value::Enum { .. } => {
            Yaml::String(value.token())
        }
        Value::List(items) | Value::Tuple(items) => {
            Yaml::Sequence(items.iter().map(to_yaml_value).collect())
        }
        Value::Map(entries) => Yaml::Mapping(
            entries
                .iter()
                .map(|(k, v)| (to_yaml_value(k), to_yaml_value(v)))
                .collect(),
        ),
        Value::Struct(s) => Yaml::Tagged(Box::new(TaggedValue {
            tag: Tag::new(s.name.clone()),
            value: Yaml::Mapping(
                s.fields
                    .iter()
                    .map(|(name, v)| (Yaml::String(name.clone()), to_yaml_value(v)))
                    .collect(),
            ),
        })),
        Value::Missing => Yaml::Tagged(Box::new(TaggedValue {
            tag: Tag::new(MISSING_TAG),
            value: Yaml::Null,
        })),
    }
}

/// Parses a YAML document as a value of type `ty`.
pub fn from_yaml(ty: &TypeDescriptor, text: &str) -> Result<Value> {
    let yaml: Yaml = serde_yaml::from_str(text)?;
    from_yaml_value(ty, &yaml)
}

/// Decodes a YAML tree as a value of type `ty`.
pub fn from_yaml_value(ty: &TypeDescriptor, yaml: &Yaml) -> Result<Value> {
    decode(ty, yaml, &Substitutions::new(), "")
}

fn mismatch(path: &str, expected: &str, yaml: &Yaml) -> Error {
    let shown = if path.is_empty() { "<root>" } else { path };
    Error::Decode {
        path: shown.to_string(),
        message: format!("expected {expected}, found {}", describe(yaml)),
    }
}

fn describe(yaml: &Yaml) -> String {
    match yaml {
        Yaml::Null => "null".to_string(),
        Yaml::Bool(b) => format!("boolean `{b}`"),
        Yaml::Number(n) => format!("number `{n}`"),
        Yaml::String(s) => format!("string `{s}`"),
        Yaml::Sequence(_) => "a sequence".to_string(),
        Yaml::Mapping(_) => "a mapping".to_string(),
        Yaml::Tagged(tagged) => format!("a value tagged {}", tagged.tag),
    }
}

fn tag_name(tag: &Tag) -> String {
    tag.to_string().trim_start_matches('!').to_string()
}

/// Token spelling of a YAML scalar, for matching against choice sets.
fn scalar_token(yaml: &Yaml) -> Option<String> {
    match yaml {
        Yaml::Bool(b) => Some(Value::Bool(*b).token()),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(format_float),
        },
        Yaml::String(s) => Some(s.clone()),
        Yaml::Null => Some("None".to_string()),
        _ => None,
    }
}

fn decode(ty: &TypeDescriptor, yaml: &Yaml, subs: &Substitutions, path: &str) -> Result<Value> {
    if let Yaml::Tagged(tagged) = yaml {
        if tagged.tag == MISSING_TAG {
            return Ok(Value::Missing);
        }
    }

    match ty {
        TypeDescriptor::TypeVar(name) => match subs.get(name) {
            Some(bound) => decode(bound, yaml, subs, path),
            None => decode_untyped(yaml, path),
        },
        TypeDescriptor::Opaque(_) => decode_untyped(yaml, path),
        TypeDescriptor::Scalar(kind) => {
            match (kind, yaml) {
                (ScalarKind::Bool, Yaml::Bool(b)) => Ok(Value::Bool(*b)),
                (ScalarKind::Int, Yaml::Number(n)) if n.is_i64() => {
                    Ok(Value::Int(n.as_i64().unwrap_or_default()))
                }
                (ScalarKind::Float, Yaml::Number(n)) => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| mismatch(path, "a float", yaml)),
                (ScalarKind::Str | ScalarKind::Path | ScalarKind::Bytes, Yaml::String(s)) => kind
                    .parse(s)
                    .map_err(|err| mismatch(path, &err.to_string(), yaml)),
                _ => Err(mismatch(path, kind.label(), yaml)),
            }
        }
        TypeDescriptor::Choice(set) => {
            let token = scalar_token(yaml).ok_or_else(|| mismatch(path, "a scalar", yaml))?;
            set.values
                .iter()
                .find(|value| value.token() == token)
                .cloned()
                .ok_or_else(|| {
                    mismatch(path, &format!("one of {{{}}}", set.tokens().join(",")), yaml)
                })
        }
        TypeDescriptor::Optional(inner) => match yaml {
            Yaml::Null => Ok(Value::None),
            _ => decode(inner, yaml, subs, path),
        },
        TypeDescriptor::Sequence { element, kind } => {
            let Yaml::Sequence(items) = yaml else {
                return Err(mismatch(path, "a sequence", yaml));
            };
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| decode(element, item, subs, &join_path(path, &i.to_string())))
                .collect::<Result<Vec<_>>>()?;
            Ok(match kind {
                SequenceKind::List => Value::List(values),
                SequenceKind::Tuple => Value::Tuple(values),
            })
        }
        TypeDescriptor::Tuple(elements) => match yaml {
            Yaml::Sequence(items) if items.len() == elements.len() => elements
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (element, item))| {
                    decode(element, item, subs, &join_path(path, &i.to_string()))
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Tuple),
            _ => Err(mismatch(
                path,
                &format!("a sequence of {} items", elements.len()),
                yaml,
            )),
        },
        TypeDescriptor::Mapping(key_ty, value_ty) => {
            let Yaml::Mapping(mapping) = yaml else {
                return Err(mismatch(path, "a mapping", yaml));
            };
            let mut entries = Vec::with_capacity(mapping.len());
            for (k, v) in mapping {
                let key = decode(key_ty, k, subs, path)?;
                let value = decode(value_ty, v, subs, &join_path(path, &key.token()))?;
                insert_entry(&mut entries, key, value);
            }
            Ok(Value::Map(entries))
        }
        TypeDescriptor::Struct(st) => decode_struct(st, yaml, subs, path),
        TypeDescriptor::Union(options) => decode_union(options, yaml, subs, path),
    }
}

fn decode_struct(st: &StructType, yaml: &Yaml, subs: &Substitutions, path: &str) -> Result<Value> {
    let schema = &st.schema;
    let mapping = match yaml {
        Yaml::Tagged(tagged) if tag_name(&tagged.tag) == schema.name => match &tagged.value {
            Yaml::Mapping(mapping) => mapping,
            other => return Err(mismatch(path, &format!("fields of `{}`", schema.name), other)),
        },
        Yaml::Mapping(mapping) => mapping,
        _ => return Err(mismatch(path, &format!("a `{}` struct", schema.name), yaml)),
    };

    let mut child_subs = subs.clone();
    child_subs.extend(schema.type_params.iter().cloned().zip(st.args.iter().cloned()));

    let mut value = StructValue::new(schema.name.clone());
    for (key, item) in mapping {
        let Some(name) = key.as_str() else {
            return Err(mismatch(path, "a field name", key));
        };
        let Some(field) = schema.fields.iter().find(|f| f.name == name) else {
            return Err(Error::Decode {
                path: join_path(path, name),
                message: format!("`{}` has no field named `{name}`", schema.name),
            });
        };
        let field_path = join_path(path, name);
        let decoded = match field.ty.substitute(&child_subs) {
            Ok(ty) => decode(&ty, item, &child_subs, &field_path)?,
            Err(_) => decode_untyped(item, &field_path)?,
        };
        value.set(name, decoded);
    }
    // Keep declaration order regardless of document order.
    value.fields.sort_by_key(|(name, _)| {
        schema
            .fields
            .iter()
            .position(|f| &f.name == name)
            .unwrap_or(usize::MAX)
    });
    Ok(Value::Struct(value))
}

fn decode_union(
    options: &[TypeDescriptor],
    yaml: &Yaml,
    subs: &Substitutions,
    path: &str,
) -> Result<Value> {
    if let Yaml::Tagged(tagged) = yaml {
        let name = tag_name(&tagged.tag);
        let tagged_option = options.iter().find(|option| {
            matches!(option.substitute(subs), Ok(TypeDescriptor::Struct(st)) if st.schema.name == name)
        });
        if let Some(option) = tagged_option {
            return decode(option, yaml, subs, path);
        }
    }
    for option in options {
        if let Ok(value) = decode(option, yaml, subs, path) {
            return Ok(value);
        }
    }
    Err(mismatch(path, "a value matching one of the union alternatives", yaml))
}

/// Decodes without a type: numbers become ints or floats, mappings become
/// ordered maps, and tagged mappings become structs.
fn decode_untyped(yaml: &Yaml, path: &str) -> Result<Value> {
    Ok(match yaml {
        Yaml::Null => Value::None,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Yaml::String(s) => Value::Str(s.clone()),
        Yaml::Sequence(items) => Value::List(
            items
                .iter()
                .map(|item| decode_untyped(item, path))
                .collect::<Result<_>>()?,
        ),
        Yaml::Mapping(mapping) => Value::Map(untyped_entries(mapping, path)?),
        Yaml::Tagged(tagged) if tagged.tag == MISSING_TAG => Value::Missing,
        Yaml::Tagged(tagged) => {
            let Yaml::Mapping(mapping) = &tagged.value else {
                return Err(mismatch(path, "a tagged mapping", &tagged.value));
            };
            let mut value = StructValue::new(tag_name(&tagged.tag));
            for (k, v) in untyped_entries(mapping, path)? {
                value.set(k.token(), v);
            }
            Value::Struct(value)
        }
    })
}

fn untyped_entries(mapping: &Mapping, path: &str) -> Result<Vec<(Value, Value)>> {
    let mut entries = Vec::with_capacity(mapping.len());
    for (k, v) in mapping {
        insert_entry(&mut entries, decode_untyped(k, path)?, decode_untyped(v, path)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldSchema, StructSchema};

    fn servers() -> TypeDescriptor {
        let http = StructSchema::new("HTTPServer").field(FieldSchema::new("y", TypeDescriptor::int()));
        let smtp = StructSchema::new("SMTPServer").field(FieldSchema::new("y", TypeDescriptor::int()));
        TypeDescriptor::from(StructSchema::new("Root").field(FieldSchema::new(
            "bc",
            TypeDescriptor::union(vec![http.into(), smtp.into()]),
        )))
    }

    #[test]
    fn test_union_variant_chosen_by_tag() {
        let value = Value::from(
            StructValue::new("Root").with("bc", StructValue::new("SMTPServer").with("y", 3)),
        );
        let text = to_yaml(&value).unwrap();
        assert!(text.contains("!SMTPServer"));
        assert_eq!(from_yaml(&servers(), &text).unwrap(), value);
    }

    #[test]
    fn test_missing_round_trips() {
        let value = Value::from(StructValue::new("Root").with("bc", Value::Missing));
        let text = to_yaml(&value).unwrap();
        assert!(text.contains("!missing"));
        assert_eq!(from_yaml(&servers(), &text).unwrap(), value);
    }

    #[test]
    fn test_collections_round_trip() {
        let ty = TypeDescriptor::from(
            StructSchema::new("Args")
                .field(FieldSchema::new(
                    "colors",
                    TypeDescriptor::list(TypeDescriptor::enumeration("Color", ["RED", "GREEN"])),
                ))
                .field(FieldSchema::new(
                    "pair",
                    TypeDescriptor::tuple(vec![TypeDescriptor::float(), TypeDescriptor::path()]),
                ))
                .field(FieldSchema::new(
                    "weights",
                    TypeDescriptor::mapping(TypeDescriptor::int(), TypeDescriptor::optional(TypeDescriptor::string())),
                )),
        );
        let value = Value::from(
            StructValue::new("Args")
                .with("colors", Value::List(vec![Value::enumeration("Color", "GREEN")]))
                .with(
                    "pair",
                    Value::Tuple(vec![Value::Float(2.0), Value::Path("/tmp/a".into())]),
                )
                .with(
                    "weights",
                    Value::Map(vec![(Value::Int(5), Value::None), (Value::Int(1), Value::from("x"))]),
                ),
        );
        let text = to_yaml(&value).unwrap();
        assert_eq!(from_yaml(&ty, &text).unwrap(), value);
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let ty = TypeDescriptor::from(
            StructSchema::new("P")
                .field(FieldSchema::new("a", TypeDescriptor::int()))
                .field(FieldSchema::new("b", TypeDescriptor::int())),
        );
        let value = from_yaml(&ty, "b: 2\na: 1\n").unwrap();
        assert_eq!(
            value,
            Value::from(StructValue::new("P").with("a", 1).with("b", 2))
        );
    }

    #[test]
    fn test_type_mismatch_names_path() {
        let ty = TypeDescriptor::from(
            StructSchema::new("P").field(FieldSchema::new("a", TypeDescriptor::int())),
        );
        match from_yaml(&ty, "a: hello\n").unwrap_err() {
            Error::Decode { path, .. } => assert_eq!(path, "a"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let ty = TypeDescriptor::from(StructSchema::new("P"));
        assert!(matches!(
            from_yaml(&ty, "zzz: 1\n"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn test_untagged_union_takes_first_match() {
        let ty = TypeDescriptor::union(vec![TypeDescriptor::int(), TypeDescriptor::string()]);
        assert_eq!(from_yaml(&ty, "5").unwrap(), Value::Int(5));
        assert_eq!(from_yaml(&ty, "five").unwrap(), Value::from("five"));
    }
}
