//! Structural diff of two serialized entities.
//!
//! [`diff_entity`] compares the document's copy of an entity (`before`) with
//! the live entity (`after`) and returns the edits that turn one into the
//! other, in the order they must be applied:
//!
//! 1. attributes (`name`, `parent`, ...), `id` excluded
//! 2. `children` array edits
//! 3. `components` array edits, components matched by name
//! 4. property edits inside components present on both sides
//!
//! Within an array, deletions come first from the highest index down, then
//! insertions in ascending order of their final index, so every index is valid
//! at the moment it is applied. Property values are compared as whole JSON
//! values: a vector that changed in one axis is one `update`.

use relm_types::{Path, PathSegment, path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key of the entity's parent id (`null` at the top level).
pub const PARENT: &str = "parent";
/// Key of the entity's child-id list.
pub const CHILDREN: &str = "children";
/// Key of the entity's component list.
pub const COMPONENTS: &str = "components";
/// Key of a component's property map.
pub const VALUES: &str = "values";

const IDENTITY: &str = "id";

/// Kind of a diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    Add,
    Update,
    Delete,
    ArrayInsert,
    ArrayDelete,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKind::Add => "add",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
            OpKind::ArrayInsert => "array-insert",
            OpKind::ArrayDelete => "array-delete",
        })
    }
}

/// One structural edit.
///
/// For map edits `path` ends at the changed key. For array edits `path`
/// addresses the array and `index` the element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiffOp {
    Add {
        path: Path,
        value: Value,
    },
    Update {
        path: Path,
        old: Value,
        new: Value,
    },
    Delete {
        path: Path,
        old: Value,
    },
    ArrayInsert {
        path: Path,
        index: usize,
        value: Value,
    },
    ArrayDelete {
        path: Path,
        index: usize,
        old: Value,
    },
}

impl DiffOp {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            DiffOp::Add { path, .. }
            | DiffOp::Update { path, .. }
            | DiffOp::Delete { path, .. }
            | DiffOp::ArrayInsert { path, .. }
            | DiffOp::ArrayDelete { path, .. } => path,
        }
    }

    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            DiffOp::Add { .. } => OpKind::Add,
            DiffOp::Update { .. } => OpKind::Update,
            DiffOp::Delete { .. } => OpKind::Delete,
            DiffOp::ArrayInsert { .. } => OpKind::ArrayInsert,
            DiffOp::ArrayDelete { .. } => OpKind::ArrayDelete,
        }
    }

    /// The value written by the operation, if any.
    #[must_use]
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            DiffOp::Add { value, .. } | DiffOp::ArrayInsert { value, .. } => Some(value),
            DiffOp::Update { new, .. } => Some(new),
            DiffOp::Delete { .. } | DiffOp::ArrayDelete { .. } => None,
        }
    }

    /// The value replaced or removed by the operation, if any.
    #[must_use]
    pub fn old_value(&self) -> Option<&Value> {
        match self {
            DiffOp::Update { old, .. } | DiffOp::Delete { old, .. } | DiffOp::ArrayDelete { old, .. } => {
                Some(old)
            }
            DiffOp::Add { .. } | DiffOp::ArrayInsert { .. } => None,
        }
    }
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffOp::ArrayInsert { path, index, .. } | DiffOp::ArrayDelete { path, index, .. } => {
                write!(f, "{} {path}@{index}", self.kind())
            }
            _ => write!(f, "{} {}", self.kind(), self.path()),
        }
    }
}

/// Diffs two serialized entities. Equal inputs yield no operations.
#[must_use]
pub fn diff_entity(before: &Value, after: &Value) -> Vec<DiffOp> {
    let empty = Map::new();
    let b = before.as_object().unwrap_or(&empty);
    let a = after.as_object().unwrap_or(&empty);
    let mut ops = Vec::new();

    let attributes = b
        .keys()
        .chain(a.keys())
        .filter(|k| !matches!(k.as_str(), IDENTITY | CHILDREN | COMPONENTS));
    let mut seen: Vec<&String> = attributes.collect();
    seen.sort();
    seen.dedup();
    diff_keys(&Path::root(), &seen, b, a, &mut ops);

    match (b.get(CHILDREN), a.get(CHILDREN)) {
        (Some(Value::Array(old)), Some(Value::Array(new))) => {
            diff_sequence(&path![CHILDREN], old, new, |v| v, &mut ops);
        }
        (old, new) => diff_value(path![CHILDREN], old, new, &mut ops),
    }

    match (b.get(COMPONENTS), a.get(COMPONENTS)) {
        (Some(Value::Array(old)), Some(Value::Array(new))) => {
            let matched = diff_sequence(&path![COMPONENTS], old, new, |c| &c["name"], &mut ops);
            for (i, j) in matched {
                diff_component(j, &old[i], &new[j], &mut ops);
            }
        }
        (old, new) => diff_value(path![COMPONENTS], old, new, &mut ops),
    }

    ops
}

fn diff_keys(
    base: &Path,
    keys: &[&String],
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    ops: &mut Vec<DiffOp>,
) {
    for key in keys {
        diff_value(base.child(key.as_str()), before.get(*key), after.get(*key), ops);
    }
}

fn diff_value(path: Path, before: Option<&Value>, after: Option<&Value>, ops: &mut Vec<DiffOp>) {
    match (before, after) {
        (None, Some(value)) => ops.push(DiffOp::Add {
            path,
            value: value.clone(),
        }),
        (Some(old), None) => ops.push(DiffOp::Delete {
            path,
            old: old.clone(),
        }),
        (Some(old), Some(new)) if old != new => ops.push(DiffOp::Update {
            path,
            old: old.clone(),
            new: new.clone(),
        }),
        _ => {}
    }
}

/// Property edits of a component present on both sides, addressed by its
/// index after the component-list edits.
fn diff_component(index: usize, before: &Value, after: &Value, ops: &mut Vec<DiffOp>) {
    let empty = Map::new();
    let b = before.get(VALUES).and_then(Value::as_object).unwrap_or(&empty);
    let a = after.get(VALUES).and_then(Value::as_object).unwrap_or(&empty);
    let mut keys: Vec<&String> = b.keys().chain(a.keys()).collect();
    keys.sort();
    keys.dedup();
    diff_keys(
        &Path::from(vec![
            PathSegment::from(COMPONENTS),
            PathSegment::Index(index),
            PathSegment::from(VALUES),
        ]),
        &keys,
        b,
        a,
        ops,
    );
}

/// Emits the deletions and insertions turning `before` into `after`, matching
/// elements by `key`. Returns the `(before, after)` index pairs of the kept
/// elements.
fn diff_sequence<'v>(
    path: &Path,
    before: &'v [Value],
    after: &'v [Value],
    key: impl Fn(&'v Value) -> &'v Value,
    ops: &mut Vec<DiffOp>,
) -> Vec<(usize, usize)> {
    let b: Vec<&Value> = before.iter().map(&key).collect();
    let a: Vec<&Value> = after.iter().map(&key).collect();
    let matched = longest_common_subsequence(&b, &a);

    let kept_before: Vec<bool> = {
        let mut kept = vec![false; before.len()];
        matched.iter().for_each(|(i, _)| kept[*i] = true);
        kept
    };
    let kept_after: Vec<bool> = {
        let mut kept = vec![false; after.len()];
        matched.iter().for_each(|(_, j)| kept[*j] = true);
        kept
    };

    for i in (0..before.len()).rev().filter(|i| !kept_before[*i]) {
        ops.push(DiffOp::ArrayDelete {
            path: path.clone(),
            index: i,
            old: before[i].clone(),
        });
    }
    for j in (0..after.len()).filter(|j| !kept_after[*j]) {
        ops.push(DiffOp::ArrayInsert {
            path: path.clone(),
            index: j,
            value: after[j].clone(),
        });
    }
    matched
}

/// Index pairs of one longest common subsequence, in ascending order.
fn longest_common_subsequence<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    // table[i][j] = LCS length of a[i..] and b[j..]
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }
    let mut pairs = Vec::with_capacity(table[0][0]);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}
