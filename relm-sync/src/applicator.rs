//! Path-addressed application of diff operations to an entity node.
//!
//! Each [`DiffOp`] is dispatched on the shape of its path to the document
//! primitive that realizes it. Entity nodes have a fixed layout:
//!
//! ```text
//! { id, name, parent, children: [id...], components: [{ name, values: {...} }...] }
//! ```
//!
//! `children` and `components` are array nodes, each component is a map node
//! and its `values` a nested map node. Everything else is a JSON leaf.

use crate::diff::{CHILDREN, COMPONENTS, DiffOp, VALUES};
use crate::error::{SyncError, SyncResult};
use relm_doc::{Item, Prelim, TransactionMut};
use relm_types::{NodeId, Path, PathSegment};
use serde_json::Value;
use tracing::debug;

/// Where an operation lands inside an entity node.
#[derive(Debug, Clone, PartialEq)]
pub enum OpTarget<'p> {
    /// A leaf attribute of the entity (`name`, `parent`).
    Attribute(&'p str),
    /// The child-id list.
    Children,
    /// The component list.
    Components,
    /// One property of the component at `component`.
    Property { component: usize, key: &'p str },
}

/// Entity attributes stored as plain leaves.
pub const ATTRIBUTES: [&str; 2] = ["name", "parent"];

/// Classifies an operation path.
pub fn classify(path: &Path) -> SyncResult<OpTarget<'_>> {
    use PathSegment::{Index, Key};
    match path.segments() {
        [Key(key)] if key == CHILDREN => Ok(OpTarget::Children),
        [Key(key)] if key == COMPONENTS => Ok(OpTarget::Components),
        [Key(key)] if ATTRIBUTES.contains(&key.as_str()) => Ok(OpTarget::Attribute(key)),
        [Key(key)] => Err(SyncError::UnknownAttribute(key.clone())),
        [Key(list), Index(component), Key(values), Key(key)]
            if list == COMPONENTS && values == VALUES =>
        {
            Ok(OpTarget::Property {
                component: *component,
                key,
            })
        }
        _ => Err(SyncError::UnrecognizedPath(path.clone())),
    }
}

/// Applies one operation to the entity node `entity`.
pub fn apply_op(txn: &mut TransactionMut<'_>, entity: NodeId, op: &DiffOp) -> SyncResult<()> {
    debug!(%entity, %op, "applying");
    let path = op.path();
    match (classify(path)?, op) {
        (OpTarget::Attribute(key), DiffOp::Add { value, .. } | DiffOp::Update { new: value, .. }) => {
            txn.map_set(entity, key, value.clone())?;
        }
        (OpTarget::Attribute(key), DiffOp::Delete { .. }) => {
            txn.map_remove(entity, key)?;
        }
        (OpTarget::Children, DiffOp::ArrayInsert { index, value, .. }) => {
            let children = nested(txn, entity, CHILDREN, path)?;
            txn.array_insert(children, *index, vec![Prelim::Any(value.clone())])?;
        }
        (OpTarget::Children, DiffOp::ArrayDelete { index, .. }) => {
            let children = nested(txn, entity, CHILDREN, path)?;
            txn.array_delete(children, *index, 1)?;
        }
        (OpTarget::Components, DiffOp::ArrayInsert { index, value, .. }) => {
            let components = nested(txn, entity, COMPONENTS, path)?;
            txn.array_insert(components, *index, vec![component_prelim(value)])?;
        }
        (OpTarget::Components, DiffOp::ArrayDelete { old, .. }) => {
            let components = nested(txn, entity, COMPONENTS, path)?;
            let name = &old["name"];
            let index = find_component(txn, components, name).ok_or_else(|| SyncError::Apply {
                path: path.clone(),
                reason: format!("no component named {name}"),
            })?;
            txn.array_delete(components, index, 1)?;
        }
        (
            OpTarget::Children | OpTarget::Components,
            DiffOp::Add { value, .. } | DiffOp::Update { new: value, .. },
        ) => {
            let key = path.get(0).and_then(PathSegment::as_key).unwrap_or(CHILDREN);
            txn.map_set(entity, key, list_prelim(key, value))?;
        }
        (OpTarget::Property { component, key }, _) => {
            let values = property_map(txn, entity, component, path)?;
            match op.new_value() {
                Some(value) => {
                    txn.map_set(values, key, value.clone())?;
                }
                None => {
                    txn.map_remove(values, key)?;
                }
            }
        }
        (_, op) => {
            return Err(SyncError::Apply {
                path: path.clone(),
                reason: format!("{} is not valid here", op.kind()),
            });
        }
    }
    Ok(())
}

/// Builds the document subtree for a serialized entity.
#[must_use]
pub fn entity_prelim(entity: &Value) -> Prelim {
    let Some(fields) = entity.as_object() else {
        return Prelim::Any(entity.clone());
    };
    Prelim::map(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), list_prelim(key, value))),
    )
}

/// Builds the document subtree for a serialized component.
#[must_use]
pub fn component_prelim(component: &Value) -> Prelim {
    let name = component.get("name").cloned().unwrap_or(Value::Null);
    let values = component
        .get(VALUES)
        .and_then(Value::as_object)
        .map(|values| {
            Prelim::map(
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), Prelim::Any(v.clone()))),
            )
        })
        .unwrap_or_else(|| Prelim::map(Vec::<(String, Prelim)>::new()));
    Prelim::map([("name", Prelim::Any(name)), (VALUES, values)])
}

fn list_prelim(key: &str, value: &Value) -> Prelim {
    match (key, value) {
        (CHILDREN, Value::Array(ids)) => Prelim::array(ids.iter().cloned().map(Prelim::Any)),
        (COMPONENTS, Value::Array(components)) => {
            Prelim::array(components.iter().map(component_prelim))
        }
        _ => Prelim::Any(value.clone()),
    }
}

fn nested(txn: &TransactionMut<'_>, map: NodeId, key: &str, path: &Path) -> SyncResult<NodeId> {
    txn.map_get(map, key)?
        .and_then(Item::node)
        .ok_or_else(|| SyncError::Apply {
            path: path.clone(),
            reason: format!("{key} is not a nested node"),
        })
}

fn find_component(txn: &TransactionMut<'_>, components: NodeId, name: &Value) -> Option<usize> {
    let items = txn.array_items(components).ok()?;
    items.iter().position(|item| {
        item.node()
            .and_then(|c| txn.map_get(c, "name").ok().flatten())
            .and_then(Item::as_any)
            == Some(name)
    })
}

fn property_map(
    txn: &TransactionMut<'_>,
    entity: NodeId,
    component: usize,
    path: &Path,
) -> SyncResult<NodeId> {
    let components = nested(txn, entity, COMPONENTS, path)?;
    let node = txn
        .array_get(components, component)?
        .and_then(Item::node)
        .ok_or_else(|| SyncError::Apply {
            path: path.clone(),
            reason: format!("no component at index {component}"),
        })?;
    nested(txn, node, VALUES, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relm_types::path;

    #[test]
    fn classifies_layout_positions() {
        assert_eq!(classify(&path!["name"]).unwrap(), OpTarget::Attribute("name"));
        assert_eq!(classify(&path!["children"]).unwrap(), OpTarget::Children);
        assert_eq!(classify(&path!["components"]).unwrap(), OpTarget::Components);
        assert_eq!(
            classify(&path!["components", 2, "values", "position"]).unwrap(),
            OpTarget::Property {
                component: 2,
                key: "position"
            }
        );
    }

    #[test]
    fn unknown_attribute_is_reported_by_name() {
        let err = classify(&path!["color"]).unwrap_err();
        assert!(matches!(err, SyncError::UnknownAttribute(ref k) if k == "color"));
        assert!(err.is_fatal());
    }

    #[test]
    fn odd_shapes_are_unrecognized() {
        for p in [path![], path![0], path!["components", 0], path!["children", 0, "x"]] {
            assert!(matches!(classify(&p), Err(SyncError::UnrecognizedPath(_))));
        }
    }
}
