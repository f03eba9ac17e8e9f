//! Schema resolver: walks a root type and its default instance and produces
//! the tree of fields the rest of the pipeline works on.
//!
//! Structs and tuples of structs become [`NestedNode`]s, mappings with a
//! concrete default become one child per key, unions containing structs
//! become [`UnionNode`]s with every variant pre-resolved, and everything else
//! becomes a leaf [`ArgumentDefinition`]. Defaults are sliced top-down from
//! the root default; generic parameters are bound through an explicit
//! [`Substitutions`] map inherited from ancestors.
//!
//! # Examples
//!
//! ```
//! use argschema_core::*;
//!
//! let inner = StructSchema::new("B").field(FieldSchema::new("y", TypeDescriptor::int()).default(3));
//! let outer = StructSchema::new("Nested")
//!     .field(FieldSchema::new("x", TypeDescriptor::int()))
//!     .field(FieldSchema::new("b", inner));
//!
//! let default = StructValue::new("Nested")
//!     .with("x", 1)
//!     .with("b", StructValue::new("B").with("y", 5));
//! let root = resolve(&outer.into(), FieldDefault::Value(default.into())).unwrap();
//!
//! let FieldNode::Nested(nested) = &root else { unreachable!() };
//! let FieldNode::Nested(b) = &nested.tree.children[1] else { unreachable!() };
//! let FieldNode::Leaf(y) = &b.tree.children[0] else { unreachable!() };
//! assert_eq!(y.dest(), "b.y");
//! assert_eq!(y.field.default, FieldDefault::Value(Value::Int(5)));
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use crate::arguments::ArgumentDefinition;
use crate::error::{Error, Result};
use crate::strings::{join_path, make_field_name, normalize_name, variant_name};
use crate::types::{
    FieldDefault, FieldSchema, Marker, PostInit, StructType, Substitutions, TypeDescriptor,
};
use crate::value::Value;

/// A field after resolution: its default is sliced from the ancestors and
/// its markers include the inherited ones.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeDescriptor,
    pub default: FieldDefault,
    pub help: Option<String>,
    pub markers: BTreeSet<Marker>,
}

impl FieldDefinition {
    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }
}

/// One node of the resolved field tree.
#[derive(Debug, Clone)]
pub enum FieldNode {
    Leaf(ArgumentDefinition),
    Nested(NestedNode),
    Union(UnionNode),
}

impl FieldNode {
    /// Field name within the parent.
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(arg) => &arg.field.name,
            Self::Nested(node) => &node.name,
            Self::Union(node) => &node.name,
        }
    }
}

/// A struct, tuple or keyed mapping expanded into child fields.
#[derive(Debug, Clone)]
pub struct NestedNode {
    pub name: String,
    /// Raw dotted path of the field.
    pub path: String,
    pub tree: StructTree,
}

/// Ordered children plus how to combine them.
#[derive(Debug, Clone)]
pub struct StructTree {
    pub kind: TreeKind,
    pub description: Option<String>,
    pub children: Vec<FieldNode>,
}

/// Shape of the value assembled from a [`StructTree`].
#[derive(Debug, Clone)]
pub enum TreeKind {
    Struct {
        name: String,
        post_init: Option<PostInit>,
    },
    Tuple,
    /// Keys of the default mapping, matching the children in order.
    ///
    /// Only built when no two keys share a flag name; otherwise the mapping
    /// stays a single key/value-pair leaf.
    Mapping { keys: Vec<Value> },
}

/// A union of structs, lowered to subcommands.
#[derive(Debug, Clone)]
pub struct UnionNode {
    pub name: String,
    pub path: String,
    pub help: Option<String>,
    pub variants: Vec<Variant>,
    /// Variant preselected by the field default.
    pub default_variant: Option<usize>,
}

/// One alternative of a [`UnionNode`].
#[derive(Debug, Clone)]
pub struct Variant {
    /// Subcommand name, e.g. `http-server`.
    pub name: String,
    /// `None` for the absent-value variant of an optional struct.
    pub body: Option<StructTree>,
}

/// Resolves a root type with an optional root default.
///
/// The root must expand into nested fields or subcommands.
pub fn resolve(ty: &TypeDescriptor, default: FieldDefault) -> Result<FieldNode> {
    let root = FieldDefinition {
        name: String::new(),
        ty: ty.clone(),
        default: normalize(default),
        help: None,
        markers: BTreeSet::new(),
    };
    match resolve_field("", root, &Substitutions::new())? {
        FieldNode::Leaf(_) => Err(Error::schema(
            "<root>",
            "the root type must be a struct, a tuple containing structs or a union of structs",
        )),
        node => Ok(node),
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        make_field_name([path])
    }
}

fn normalize(default: FieldDefault) -> FieldDefault {
    match default {
        FieldDefault::Value(Value::Missing) => FieldDefault::PropagatedMissing,
        other => other,
    }
}

fn inherited(markers: &BTreeSet<Marker>) -> BTreeSet<Marker> {
    markers.iter().copied().filter(|m| m.is_inherited()).collect()
}

fn leaf(prefix: &str, mut field: FieldDefinition, subs: &Substitutions) -> FieldNode {
    if matches!(&field.default, FieldDefault::Value(v) if v.contains_missing()) {
        field.default = FieldDefault::PropagatedMissing;
    }
    FieldNode::Leaf(ArgumentDefinition {
        prefix: prefix.to_string(),
        field,
        type_from_typevar: subs.clone(),
    })
}

fn resolve_field(prefix: &str, field: FieldDefinition, subs: &Substitutions) -> Result<FieldNode> {
    let path = join_path(prefix, &field.name);
    let resolved = field.ty.substitute(subs).map_err(|name| {
        Error::schema(display_path(&path), format!("unbound type variable `{name}`"))
    })?;
    if field.has_marker(Marker::Fixed) {
        return Ok(leaf(prefix, field, subs));
    }

    match &resolved {
        TypeDescriptor::Struct(st) => {
            if field.default == FieldDefault::ExcludeFromCall {
                return Err(Error::unsupported(
                    display_path(&path),
                    "nested structs cannot be left out of construction",
                ));
            }
            let tree = resolve_struct(&path, st, &field.default, &inherited(&field.markers), subs)?;
            Ok(FieldNode::Nested(NestedNode {
                name: field.name,
                path,
                tree,
            }))
        }
        TypeDescriptor::Optional(_) | TypeDescriptor::Union(_) if has_struct_variant(&resolved) => {
            let (has_none, options) = flatten_variants(&resolved);
            let all_structs = options.iter().all(|o| matches!(o, TypeDescriptor::Struct(_)));
            let avoided = field.has_marker(Marker::AvoidSubcommands)
                && matches!(field.default, FieldDefault::Value(_));
            if avoided || !all_structs {
                // Lowered as a leaf: fixed when defaulted, an error otherwise.
                return Ok(leaf(prefix, field, subs));
            }
            let structs = options
                .into_iter()
                .filter_map(|o| match o {
                    TypeDescriptor::Struct(st) => Some(st),
                    _ => None,
                })
                .collect::<Vec<_>>();
            resolve_union(path, field, has_none, &structs, subs).map(FieldNode::Union)
        }
        TypeDescriptor::Tuple(items) if items.iter().any(is_nested) => {
            if field.default == FieldDefault::ExcludeFromCall {
                return Err(Error::unsupported(
                    display_path(&path),
                    "tuples containing structs cannot be left out of construction",
                ));
            }
            let markers = inherited(&field.markers);
            let mut children = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let name = i.to_string();
                let default = match &field.default {
                    FieldDefault::Value(v) => slice_value(v, &name),
                    FieldDefault::Unset => FieldDefault::Unset,
                    _ => FieldDefault::PropagatedMissing,
                };
                let child = FieldDefinition {
                    name,
                    ty: item.clone(),
                    default,
                    help: None,
                    markers: markers.clone(),
                };
                children.push(resolve_field(&path, child, subs)?);
            }
            Ok(FieldNode::Nested(NestedNode {
                name: field.name,
                path,
                tree: StructTree {
                    kind: TreeKind::Tuple,
                    description: None,
                    children,
                },
            }))
        }
        TypeDescriptor::Mapping(_, value_ty) => {
            let FieldDefault::Value(Value::Map(entries)) = &field.default else {
                return Ok(leaf(prefix, field, subs));
            };
            // Keys that share a flag name keep the key/value-pair form.
            let mut names = BTreeSet::new();
            if !entries.iter().all(|(key, _)| names.insert(normalize_name(&key.token()))) {
                return Ok(leaf(prefix, field, subs));
            }
            let markers = inherited(&field.markers);
            let mut children = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let child = FieldDefinition {
                    name: key.token(),
                    ty: (**value_ty).clone(),
                    default: normalize(FieldDefault::Value(value.clone())),
                    help: None,
                    markers: markers.clone(),
                };
                children.push(resolve_field(&path, child, subs)?);
            }
            let keys = entries.iter().map(|(k, _)| k.clone()).collect();
            Ok(FieldNode::Nested(NestedNode {
                name: field.name,
                path,
                tree: StructTree {
                    kind: TreeKind::Mapping { keys },
                    description: None,
                    children,
                },
            }))
        }
        _ => Ok(leaf(prefix, field, subs)),
    }
}

fn resolve_struct(
    path: &str,
    st: &StructType,
    default: &FieldDefault,
    markers: &BTreeSet<Marker>,
    subs: &Substitutions,
) -> Result<StructTree> {
    let schema = &st.schema;
    if !st.args.is_empty() && st.args.len() != schema.type_params.len() {
        return Err(Error::schema(
            display_path(path),
            format!(
                "`{}` expects {} type argument(s), got {}",
                schema.name,
                schema.type_params.len(),
                st.args.len()
            ),
        ));
    }
    let mut child_subs = subs.clone();
    child_subs.extend(schema.type_params.iter().cloned().zip(st.args.iter().cloned()));

    let mut children = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let mut field_markers = field.markers.clone();
        field_markers.extend(markers.iter().copied());
        let child = FieldDefinition {
            name: field.name.clone(),
            ty: field.ty.clone(),
            default: slice_default(default, field),
            help: field.help.clone(),
            markers: field_markers,
        };
        children.push(resolve_field(path, child, &child_subs)?);
    }
    Ok(StructTree {
        kind: TreeKind::Struct {
            name: schema.name.clone(),
            post_init: schema.post_init,
        },
        description: schema.description.clone(),
        children,
    })
}

fn resolve_union(
    path: String,
    field: FieldDefinition,
    has_none: bool,
    structs: &[StructType],
    subs: &Substitutions,
) -> Result<UnionNode> {
    let shown = display_path(&path);
    let offset = usize::from(has_none);

    let default_variant = match &field.default {
        FieldDefault::Value(Value::None) if has_none => Some(0),
        FieldDefault::Value(Value::Struct(value)) => {
            let matching: Vec<usize> = structs
                .iter()
                .enumerate()
                .filter(|(_, st)| st.schema.name == value.name)
                .map(|(i, _)| i + offset)
                .collect();
            match matching.as_slice() {
                [] => {
                    return Err(Error::schema(
                        shown,
                        format!("default `{}` does not match any variant", value.name),
                    ));
                }
                [index] => Some(*index),
                _ => {
                    return Err(Error::unsupported(
                        shown,
                        format!("default `{}` matches more than one variant", value.name),
                    ));
                }
            }
        }
        FieldDefault::Value(other) => {
            return Err(Error::schema(
                shown,
                format!("`{other}` is not a valid default for a union of structs"),
            ));
        }
        FieldDefault::ExcludeFromCall => {
            return Err(Error::unsupported(
                shown,
                "unions of structs cannot be left out of construction",
            ));
        }
        FieldDefault::Unset | FieldDefault::PropagatedMissing => None,
    };

    let markers = inherited(&field.markers);
    let mut variants = Vec::with_capacity(structs.len() + offset);
    if has_none {
        variants.push(Variant {
            name: "None".to_string(),
            body: None,
        });
    }
    for (i, st) in structs.iter().enumerate() {
        // A variant other than the default's starts from its own defaults.
        let default = if default_variant == Some(i + offset) {
            field.default.clone()
        } else if field.default == FieldDefault::PropagatedMissing {
            FieldDefault::PropagatedMissing
        } else {
            FieldDefault::Unset
        };
        let body = resolve_struct(&path, st, &default, &markers, subs)?;
        let name = variant_name(&TypeDescriptor::Struct(st.clone()));
        if variants.iter().any(|v: &Variant| v.name == name) {
            return Err(Error::unsupported(
                shown,
                format!("more than one variant is named `{name}`"),
            ));
        }
        variants.push(Variant {
            name,
            body: Some(body),
        });
    }

    debug!(
        path = %shown,
        variants = variants.len(),
        default_variant = ?default_variant,
        "resolved union field"
    );
    Ok(UnionNode {
        name: field.name,
        path,
        help: field.help,
        variants,
        default_variant,
    })
}

/// Child default read from a concrete parent default.
fn slice_value(parent: &Value, name: &str) -> FieldDefault {
    match parent.attribute(name) {
        None | Some(Value::Missing) => FieldDefault::PropagatedMissing,
        Some(value) => FieldDefault::Value(value.clone()),
    }
}

fn slice_default(parent: &FieldDefault, field: &FieldSchema) -> FieldDefault {
    match parent {
        FieldDefault::Value(value) => match slice_value(value, &field.name) {
            FieldDefault::PropagatedMissing if field.default == FieldDefault::ExcludeFromCall => {
                FieldDefault::ExcludeFromCall
            }
            sliced => sliced,
        },
        FieldDefault::Unset => normalize(field.default.clone()),
        FieldDefault::PropagatedMissing | FieldDefault::ExcludeFromCall => {
            match normalize(field.default.clone()) {
                present if present.is_present() => present,
                _ => FieldDefault::PropagatedMissing,
            }
        }
    }
}

/// Splits optional/union layers into a `None` flag and the other options.
fn flatten_variants(ty: &TypeDescriptor) -> (bool, Vec<TypeDescriptor>) {
    match ty {
        TypeDescriptor::Optional(inner) => {
            let (_, options) = flatten_variants(inner);
            (true, options)
        }
        TypeDescriptor::Union(items) => {
            let mut has_none = false;
            let mut options = Vec::new();
            for item in items {
                let (none, inner) = flatten_variants(item);
                has_none |= none;
                for option in inner {
                    if !options.contains(&option) {
                        options.push(option);
                    }
                }
            }
            (has_none, options)
        }
        other => (false, vec![other.clone()]),
    }
}

fn has_struct_variant(ty: &TypeDescriptor) -> bool {
    flatten_variants(ty)
        .1
        .iter()
        .any(|o| matches!(o, TypeDescriptor::Struct(_)))
}

fn is_nested(ty: &TypeDescriptor) -> bool {
    match ty {
        TypeDescriptor::Struct(_) => true,
        TypeDescriptor::Tuple(items) => items.iter().any(is_nested),
        TypeDescriptor::Optional(_) | TypeDescriptor::Union(_) => has_struct_variant(ty),
        _ => false,
    }
}
