use pretty_assertions::assert_eq;
use relm_doc::{
    ArrayDelta, Doc, DocError, EntryChange, EventChange, InsertedItem, Item, Prelim,
};
use relm_types::{ClientId, NodeId, Origin, path};
use serde_json::json;

fn entity(name: &str) -> Prelim {
    Prelim::map([
        ("name", Prelim::any(name)),
        ("children", Prelim::array(Vec::new())),
    ])
}

fn doc_with_entity(name: &str) -> (Doc, NodeId, NodeId) {
    let mut doc = Doc::with_client(ClientId::from_raw(7));
    let root = doc.get_or_insert_array("entities").unwrap();
    let ids = doc
        .transact(Origin::Local, |txn| txn.array_push(root, vec![entity(name)]))
        .unwrap();
    doc.take_batches();
    doc.take_updates();
    (doc, root, ids[0].unwrap())
}

// ── Roots ────────────────────────────────────────────────────────

#[test]
fn roots_have_the_same_id_on_every_replica() {
    let mut a = Doc::new();
    let mut b = Doc::new();
    let ra = a.get_or_insert_array("entities").unwrap();
    let rb = b.get_or_insert_array("entities").unwrap();
    assert_eq!(ra, rb);
    assert_eq!(ra, NodeId::root("entities"));
    assert!(ra.is_root());
}

#[test]
fn root_requested_as_other_kind_is_rejected() {
    let mut doc = Doc::new();
    doc.get_or_insert_map("settings").unwrap();
    let err = doc.get_or_insert_array("settings").unwrap_err();
    assert!(matches!(err, DocError::RootKindMismatch { .. }));
}

#[test]
fn root_lookup_without_creation() {
    let mut doc = Doc::new();
    assert_eq!(doc.root("entities"), None);
    let id = doc.get_or_insert_array("entities").unwrap();
    assert_eq!(doc.root("entities"), Some(id));
}

// ── Transactions ─────────────────────────────────────────────────

#[test]
fn nested_insert_materializes_as_json() {
    let (doc, root, _) = doc_with_entity("lamp");
    assert_eq!(
        doc.materialize(root).unwrap(),
        json!([{ "name": "lamp", "children": [] }])
    );
}

#[test]
fn reads_through_the_transaction() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    let name = doc
        .transact(Origin::Local, |txn| {
            txn.map_set(id, "name", json!("desk"))?;
            Ok(txn.materialize(id)?["name"].clone())
        })
        .unwrap();
    assert_eq!(name, json!("desk"));
    assert_eq!(doc.array_len(root).unwrap(), 1);
}

#[test]
fn failed_transaction_leaves_no_trace() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    let before = doc.materialize(root).unwrap();

    let result: Result<(), DocError> = doc.transact(Origin::Local, |txn| {
        txn.map_set(id, "name", json!("desk"))?;
        txn.array_push(root, vec![entity("chair")])?;
        txn.array_delete(root, 0, 1)?;
        txn.array_delete(root, 5, 1)
    });

    assert!(matches!(result, Err(DocError::IndexOutOfBounds { .. })));
    assert_eq!(doc.materialize(root).unwrap(), before);
    assert!(doc.contains(id));
    assert!(doc.take_batches().is_empty());
    assert!(doc.take_updates().is_empty());
}

#[test]
fn rollback_restores_a_removed_node_under_its_old_id() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    let _ = doc.transact(Origin::Local, |txn| {
        txn.array_delete(root, 0, 1)?;
        Err::<(), _>(DocError::NodeNotFound(id))
    });
    assert!(doc.contains(id));
    assert_eq!(doc.array_get(root, 0).unwrap(), Some(&Item::Node(id)));
}

#[test]
fn map_set_on_array_is_rejected() {
    let (mut doc, root, _) = doc_with_entity("lamp");
    let err = doc
        .transact(Origin::Local, |txn| txn.map_set(root, "name", json!("x")))
        .unwrap_err();
    assert!(matches!(err, DocError::NotAMap(_)));
}

#[test]
fn removing_a_node_drops_its_subtree() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    let children = doc.map_get(id, "children").unwrap().and_then(Item::node).unwrap();
    doc.transact(Origin::Local, |txn| txn.array_delete(root, 0, 1))
        .unwrap();
    assert!(!doc.contains(id));
    assert!(!doc.contains(children));
}

#[test]
fn map_remove_of_missing_key_is_a_noop() {
    let (mut doc, _, id) = doc_with_entity("lamp");
    let removed = doc
        .transact(Origin::Local, |txn| txn.map_remove(id, "missing"))
        .unwrap();
    assert!(!removed);
    assert!(doc.take_batches().is_empty());
    assert!(doc.take_updates().is_empty());
}

// ── Events ───────────────────────────────────────────────────────

#[test]
fn map_update_event_carries_path_and_ancestors() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    doc.transact(Origin::Local, |txn| txn.map_set(id, "name", json!("desk")))
        .unwrap();

    let batches = doc.take_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].origin, Origin::Local);
    let event = &batches[0].events[0];
    assert_eq!(event.root, "entities");
    assert_eq!(event.path, path![0]);
    assert_eq!(event.ancestors, vec![root, id]);
    let EventChange::Map(keys) = &event.change else {
        panic!("expected a map change");
    };
    assert_eq!(
        keys["name"],
        EntryChange::Updated {
            old: json!("lamp"),
            new: json!("desk"),
        }
    );
}

#[test]
fn created_subtree_is_reported_only_through_its_insertion() {
    let mut doc = Doc::new();
    let root = doc.get_or_insert_array("entities").unwrap();
    let ids = doc
        .transact(Origin::Local, |txn| {
            let ids = txn.array_push(root, vec![entity("lamp")])?;
            let id = ids[0].unwrap();
            txn.map_set(id, "name", json!("desk"))?;
            Ok(ids)
        })
        .unwrap();

    let batches = doc.take_batches();
    assert_eq!(batches[0].events.len(), 1);
    assert_eq!(
        batches[0].events[0].change,
        EventChange::Array(vec![ArrayDelta::Insert {
            index: 0,
            items: vec![InsertedItem::Node(ids[0].unwrap())],
        }])
    );
}

#[test]
fn events_are_ordered_shallowest_first() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    doc.transact(Origin::Local, |txn| {
        txn.map_set(id, "name", json!("desk"))?;
        txn.array_push(root, vec![entity("chair")])?;
        Ok(())
    })
    .unwrap();

    let batch = doc.take_batches().remove(0);
    let depths: Vec<usize> = batch.events.iter().map(|e| e.path.len()).collect();
    assert_eq!(depths, vec![0, 1]);
}

#[test]
fn net_unchanged_key_emits_nothing() {
    let (mut doc, _, id) = doc_with_entity("lamp");
    doc.transact(Origin::Local, |txn| {
        txn.map_set(id, "name", json!("desk"))?;
        txn.map_set(id, "name", json!("lamp"))?;
        Ok(())
    })
    .unwrap();
    assert!(doc.take_batches().is_empty());
}

#[test]
fn array_delete_event_captures_removed_content() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    doc.transact(Origin::Local, |txn| txn.array_delete(root, 0, 1))
        .unwrap();

    let batch = doc.take_batches().remove(0);
    let EventChange::Array(deltas) = &batch.events[0].change else {
        panic!("expected an array change");
    };
    let ArrayDelta::Delete { index, removed } = &deltas[0] else {
        panic!("expected a delete");
    };
    assert_eq!(*index, 0);
    assert_eq!(removed[0].node, Some(id));
    assert_eq!(removed[0].value, json!({ "name": "lamp", "children": [] }));
}

#[test]
fn locate_reports_nested_positions() {
    let (mut doc, root, id) = doc_with_entity("lamp");
    let children = doc.map_get(id, "children").unwrap().and_then(Item::node).unwrap();
    doc.transact(Origin::Local, |txn| {
        txn.array_insert(root, 0, vec![entity("chair")])?;
        txn.array_push(children, vec![Prelim::any("child-1")])?;
        Ok(())
    })
    .unwrap();

    let (root_name, at, ancestors) = doc.locate(children).unwrap();
    assert_eq!(root_name, "entities");
    assert_eq!(at, path![1, "children"]);
    assert_eq!(ancestors, vec![root, id, children]);
}
