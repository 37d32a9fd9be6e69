use pretty_assertions::assert_eq;
use proptest::prelude::*;
use relm_sync::{DiffOp, OpKind, diff_entity};
use relm_types::path;
use serde_json::{Value, json};

fn entity(name: &str, children: &[&str], components: Value) -> Value {
    json!({
        "id": "e1",
        "name": name,
        "parent": null,
        "children": children,
        "components": components,
    })
}

fn transform(x: f64) -> Value {
    json!({ "name": "Transform", "values": { "position": { "x": x, "y": 0.0, "z": 0.0 } } })
}

fn shape() -> Value {
    json!({ "name": "Shape", "values": { "kind": "BOX" } })
}

// ── Attributes ───────────────────────────────────────────────────

#[test]
fn equal_entities_produce_nothing() {
    let e = entity("Box", &["a", "b"], json!([transform(1.0), shape()]));
    assert!(diff_entity(&e, &e).is_empty());
}

#[test]
fn rename_is_one_update() {
    let before = entity("Box", &[], json!([]));
    let after = entity("Crate", &[], json!([]));
    assert_eq!(
        diff_entity(&before, &after),
        vec![DiffOp::Update {
            path: path!["name"],
            old: json!("Box"),
            new: json!("Crate"),
        }]
    );
}

#[test]
fn parent_assignment_replaces_null() {
    let before = entity("Box", &[], json!([]));
    let mut after = before.clone();
    after["parent"] = json!("p");
    let ops = diff_entity(&before, &after);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind(), OpKind::Update);
    assert_eq!(ops[0].old_value(), Some(&Value::Null));
    assert_eq!(ops[0].new_value(), Some(&json!("p")));
}

#[test]
fn identity_is_never_diffed() {
    let before = entity("Box", &[], json!([]));
    let mut after = before.clone();
    after["id"] = json!("e2");
    assert!(diff_entity(&before, &after).is_empty());
}

#[test]
fn extra_and_missing_keys_become_add_and_delete() {
    let mut before = entity("Box", &[], json!([]));
    before["legacy"] = json!(1);
    let mut after = entity("Box", &[], json!([]));
    after["color"] = json!("red");
    let ops = diff_entity(&before, &after);
    assert_eq!(
        ops,
        vec![
            DiffOp::Add {
                path: path!["color"],
                value: json!("red"),
            },
            DiffOp::Delete {
                path: path!["legacy"],
                old: json!(1),
            },
        ]
    );
}

// ── Children ─────────────────────────────────────────────────────

#[test]
fn children_edits_keep_the_common_run() {
    let before = entity("p", &["a", "b", "c"], json!([]));
    let after = entity("p", &["b", "c", "d"], json!([]));
    assert_eq!(
        diff_entity(&before, &after),
        vec![
            DiffOp::ArrayDelete {
                path: path!["children"],
                index: 0,
                old: json!("a"),
            },
            DiffOp::ArrayInsert {
                path: path!["children"],
                index: 2,
                value: json!("d"),
            },
        ]
    );
}

#[test]
fn deletions_run_from_the_highest_index() {
    let before = entity("p", &["a", "b", "c", "d"], json!([]));
    let after = entity("p", &["b"], json!([]));
    let indices: Vec<usize> = diff_entity(&before, &after)
        .iter()
        .map(|op| match op {
            DiffOp::ArrayDelete { index, .. } => *index,
            other => panic!("unexpected {other}"),
        })
        .collect();
    assert_eq!(indices, vec![3, 2, 0]);
}

// ── Components ───────────────────────────────────────────────────

#[test]
fn moved_position_is_a_single_property_update() {
    let before = entity("Box", &[], json!([transform(0.0)]));
    let after = entity("Box", &[], json!([transform(2.5)]));
    let ops = diff_entity(&before, &after);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind(), OpKind::Update);
    assert_eq!(ops[0].path(), &path!["components", 0, "values", "position"]);
    assert_eq!(ops[0].to_string(), "update [components, 0, values, position]");
}

#[test]
fn added_component_is_inserted_whole() {
    let before = entity("Box", &[], json!([transform(0.0)]));
    let after = entity("Box", &[], json!([transform(0.0), shape()]));
    assert_eq!(
        diff_entity(&before, &after),
        vec![DiffOp::ArrayInsert {
            path: path!["components"],
            index: 1,
            value: shape(),
        }]
    );
}

#[test]
fn property_paths_use_indices_after_component_edits() {
    let before = entity("Box", &[], json!([shape(), transform(0.0)]));
    let after = entity("Box", &[], json!([transform(1.0)]));
    let ops = diff_entity(&before, &after);
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].kind(), OpKind::ArrayDelete);
    assert_eq!(ops[0].old_value(), Some(&shape()));
    assert_eq!(ops[1].path(), &path!["components", 0, "values", "position"]);
}

#[test]
fn new_and_dropped_property_keys() {
    let before = entity(
        "Box",
        &[],
        json!([{ "name": "Shape", "values": { "kind": "BOX" } }]),
    );
    let after = entity(
        "Box",
        &[],
        json!([{ "name": "Shape", "values": { "color": "#ff0000" } }]),
    );
    let kinds: Vec<OpKind> = diff_entity(&before, &after).iter().map(DiffOp::kind).collect();
    assert_eq!(kinds, vec![OpKind::Add, OpKind::Delete]);
}

#[test]
fn op_kinds_serialize_kebab_case() {
    let op = DiffOp::ArrayInsert {
        path: path!["children"],
        index: 0,
        value: json!("a"),
    };
    let encoded = serde_json::to_value(&op).unwrap();
    assert_eq!(encoded["kind"], json!("array-insert"));
    assert_eq!(OpKind::ArrayDelete.to_string(), "array-delete");
}

// ── Replay ───────────────────────────────────────────────────────

/// Replays array edits the way the applicator does.
fn replay_children(before: &[String], ops: &[DiffOp]) -> Vec<String> {
    let mut list = before.to_vec();
    for op in ops {
        match op {
            DiffOp::ArrayDelete { index, .. } => {
                list.remove(*index);
            }
            DiffOp::ArrayInsert { index, value, .. } => {
                list.insert(*index, value.as_str().unwrap().to_string());
            }
            other => panic!("unexpected {other}"),
        }
    }
    list
}

fn ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-h]", 0..8).prop_flat_map(|set| {
        Just(set.into_iter().collect::<Vec<_>>()).prop_shuffle()
    })
}

proptest! {
    #[test]
    fn children_ops_replay_to_the_target(before in ids(), after in ids()) {
        let b: Vec<&str> = before.iter().map(String::as_str).collect();
        let a: Vec<&str> = after.iter().map(String::as_str).collect();
        let ops = diff_entity(&entity("p", &b, json!([])), &entity("p", &a, json!([])));
        prop_assert_eq!(replay_children(&before, &ops), after);
    }

    #[test]
    fn diff_of_self_is_empty(names in prop::collection::vec("[a-z]{1,6}", 0..5), x in -10.0f64..10.0) {
        let children: Vec<&str> = names.iter().map(String::as_str).collect();
        let e = entity("n", &children, json!([transform(x)]));
        prop_assert!(diff_entity(&e, &e).is_empty());
    }
}
