//! Builds the typed value from a parsed namespace.
//!
//! The assembler walks the resolved tree once. Leaves are re-lowered to get
//! their instantiator, parsed tokens are instantiated, and fields the user did
//! not supply fall back to their stored default. Structs run their
//! post-construction hook after every field is set.

use argschema_core::{
    ArgumentDefinition, Error, FieldDefault, FieldNode, Result, StructTree, StructValue, TreeKind,
    UnionNode, Value,
};
use tracing::trace;

use crate::dispatch::Namespace;
use crate::parser::RawValue;

/// Assembles the value of `node`.
///
/// Returns `None` when the field is left out of construction.
pub(crate) fn assemble(node: &FieldNode, namespace: &mut Namespace) -> Result<Option<Value>> {
    match node {
        FieldNode::Leaf(arg) => assemble_leaf(arg, namespace),
        FieldNode::Nested(nested) => assemble_tree(&nested.tree, namespace).map(Some),
        FieldNode::Union(union) => assemble_union(union, namespace).map(Some),
    }
}

fn assemble_leaf(arg: &ArgumentDefinition, namespace: &mut Namespace) -> Result<Option<Value>> {
    let id = arg.dest();
    let lowered = arg.lower()?;
    match namespace.values.remove(&id) {
        Some(RawValue::Flag(value)) => Ok(Some(Value::Bool(value))),
        Some(RawValue::Tokens(tokens)) => {
            let instantiator = lowered.instantiator.ok_or_else(|| {
                Error::Invariant(format!("fixed argument `{id}` received a value"))
            })?;
            trace!(dest = %id, tokens = ?tokens, "instantiating argument");
            instantiator
                .instantiate(&tokens)
                .map(Some)
                .map_err(|source| Error::Parse {
                    flag: lowered.name_or_flag,
                    source,
                })
        }
        None => match &arg.field.default {
            FieldDefault::Value(value) => Ok(Some(value.clone())),
            FieldDefault::ExcludeFromCall => Ok(None),
            FieldDefault::Unset | FieldDefault::PropagatedMissing
                if namespace.registered.contains(&id) =>
            {
                Err(Error::Invariant(format!(
                    "required argument `{}` was accepted by the parser without a value",
                    lowered.name_or_flag
                )))
            }
            FieldDefault::Unset | FieldDefault::PropagatedMissing => Err(Error::MissingArgument {
                flag: lowered.name_or_flag,
            }),
        },
    }
}

fn assemble_tree(tree: &StructTree, namespace: &mut Namespace) -> Result<Value> {
    let mut fields = Vec::with_capacity(tree.children.len());
    for child in &tree.children {
        if let Some(value) = assemble(child, namespace)? {
            fields.push((child.name().to_string(), value));
        }
    }
    match &tree.kind {
        TreeKind::Struct { name, post_init } => {
            let mut value = StructValue {
                name: name.clone(),
                fields,
            };
            if let Some(hook) = post_init {
                hook(&mut value);
            }
            Ok(Value::Struct(value))
        }
        TreeKind::Tuple => Ok(Value::Tuple(fields.into_iter().map(|(_, v)| v).collect())),
        TreeKind::Mapping { keys } => {
            if keys.len() != fields.len() {
                return Err(Error::Invariant(format!(
                    "mapping has {} keys but {} values",
                    keys.len(),
                    fields.len()
                )));
            }
            Ok(Value::Map(
                keys.iter().cloned().zip(fields.into_iter().map(|(_, v)| v)).collect(),
            ))
        }
    }
}

fn assemble_union(union: &UnionNode, namespace: &mut Namespace) -> Result<Value> {
    let index = namespace.variant_for(union)?;
    let variant = union
        .variants
        .get(index)
        .ok_or_else(|| Error::Invariant(format!("union `{}` has no variant {index}", union.path)))?;
    match &variant.body {
        Some(tree) => assemble_tree(tree, namespace),
        None => Ok(Value::None),
    }
}
