//! N-writer convergence tests.
//!
//! Several replicas edit the same world without seeing each other, then
//! exchange updates in arbitrary order. Every replica must end with the same
//! document and the same world:
//! 1. Concurrent spawns and deletes (array order, id-addressed delete)
//! 2. Concurrent property and name writes (last writer wins)
//! 3. Concurrent hierarchy edits (one parent, document sibling order)
//! 4. Undo after a peer edited the same hierarchy
//! 5. Random interleavings with shuffled delivery

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use relm_doc::{Doc, Update};
use relm_model::{ComponentRegistry, MemoryWorld, PropertyValue, Vec3, World};
use relm_sync::{SyncConfig, WorldSync};
use relm_types::{ClientId, EntityId};

type Engine = WorldSync<MemoryWorld>;

/// Deterministic client ids for reproducibility.
fn writer(n: u64) -> Engine {
    let config = SyncConfig {
        undo_capture_timeout_ms: 3_600_000,
        ..SyncConfig::default()
    };
    WorldSync::with_doc(
        MemoryWorld::new(ComponentRegistry::core()),
        Doc::with_client(ClientId::from_raw(n)),
        config,
    )
    .unwrap()
}

fn spawn(sync: &mut Engine, id: &str) -> EntityId {
    let id = EntityId::from(id);
    sync.world_mut().spawn_with_id(id.clone(), id.as_str()).unwrap();
    sync.world_mut().insert_component(&id, "Transform").unwrap();
    sync.sync_from(&id).unwrap();
    id
}

fn place(sync: &mut Engine, id: &EntityId, x: f64) {
    let value = PropertyValue::Vector3(Vec3::new(x, 0.0, 0.0));
    sync.world_mut()
        .set_property(id, "Transform", "position", value)
        .unwrap();
    sync.sync_from(id).unwrap();
}

/// Moves `child` under `parent` (or to the top) and syncs every entity whose
/// serialized form changed.
fn reparent(sync: &mut Engine, child: &EntityId, parent: Option<&EntityId>) {
    let old = sync.world().parent(child);
    sync.world_mut().set_parent(child, parent).unwrap();
    let touched = [Some(child.clone()), old, parent.cloned()];
    for id in touched.iter().flatten() {
        sync.sync_from(id).unwrap();
    }
}

fn position(sync: &Engine, id: &EntityId) -> Option<PropertyValue> {
    sync.world()
        .component(id, "Transform")
        .and_then(|c| c.get("position"))
        .cloned()
}

/// Delivers every writer's pending updates to every other writer.
fn exchange(writers: &mut [Engine]) {
    let outboxes: Vec<Vec<Update>> = writers.iter_mut().map(Engine::take_updates).collect();
    for (to, sync) in writers.iter_mut().enumerate() {
        for (from, outbox) in outboxes.iter().enumerate() {
            if from == to {
                continue;
            }
            for update in outbox {
                sync.apply_update(update).unwrap();
            }
        }
    }
}

/// Asserts that all writers hold the same document and the same world.
fn assert_all_converged(writers: &[Engine]) {
    let reference_doc = writers[0].export_world().unwrap();
    let reference_ids = writers[0].world().entity_ids();
    for (i, sync) in writers.iter().enumerate().skip(1) {
        assert_eq!(sync.export_world().unwrap(), reference_doc, "document diverged at writer {i}");
        assert_eq!(sync.world().entity_ids(), reference_ids, "entity set diverged at writer {i}");
        for id in &reference_ids {
            assert_eq!(
                sync.world().to_json(id),
                writers[0].world().to_json(id),
                "entity {id} diverged at writer {i}"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 1. CONCURRENT SPAWNS AND DELETES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn concurrent_spawns_agree_on_order_and_delete_only_their_target() {
    let mut writers = [writer(1), writer(2)];
    let x = spawn(&mut writers[0], "x");
    let y = spawn(&mut writers[1], "y");
    exchange(&mut writers);
    assert_all_converged(&writers);

    writers[0].delete(&x).unwrap();
    exchange(&mut writers);

    assert!(!writers[1].world().contains(&x));
    assert!(writers[1].world().contains(&y));
    assert_all_converged(&writers);
}

#[test]
fn three_writers_spawning_at_once_see_every_entity() {
    let mut writers = [writer(1), writer(2), writer(3)];
    for (i, sync) in writers.iter_mut().enumerate() {
        for n in 0..3 {
            spawn(sync, &format!("{n}-{i}"));
        }
    }
    exchange(&mut writers);

    assert_eq!(writers[0].world().len(), 9);
    assert_all_converged(&writers);
}

#[test]
fn concurrent_deletes_of_one_entity_remove_it_once() {
    let mut writers = [writer(1), writer(2)];
    let e = spawn(&mut writers[0], "e");
    let keep = spawn(&mut writers[0], "keep");
    exchange(&mut writers);

    writers[0].delete(&e).unwrap();
    writers[1].delete(&e).unwrap();
    exchange(&mut writers);

    assert!(!writers[0].world().contains(&e));
    assert!(writers[1].world().contains(&keep));
    assert_all_converged(&writers);
}

#[test]
fn edit_racing_a_delete_is_dropped() {
    let mut writers = [writer(1), writer(2)];
    let e = spawn(&mut writers[0], "e");
    exchange(&mut writers);

    writers[0].delete(&e).unwrap();
    writers[1].world_mut().set_name(&e, "renamed").unwrap();
    writers[1].sync_from(&e).unwrap();
    place(&mut writers[1], &e, 9.0);
    exchange(&mut writers);

    assert!(!writers[0].world().contains(&e));
    assert!(!writers[1].world().contains(&e));
    assert_all_converged(&writers);
}

// ═══════════════════════════════════════════════════════════════════════════
// 2. CONCURRENT WRITES TO ONE VALUE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn concurrent_position_writes_settle_on_one_value() {
    let mut writers = [writer(1), writer(2)];
    let e = spawn(&mut writers[0], "e");
    exchange(&mut writers);

    place(&mut writers[0], &e, 1.0);
    place(&mut writers[1], &e, 2.0);
    exchange(&mut writers);

    let settled = position(&writers[0], &e);
    assert_eq!(position(&writers[1], &e), settled);
    assert!(
        settled == Some(PropertyValue::Vector3(Vec3::new(1.0, 0.0, 0.0)))
            || settled == Some(PropertyValue::Vector3(Vec3::new(2.0, 0.0, 0.0)))
    );
    assert_all_converged(&writers);
}

#[test]
fn concurrent_renames_settle_on_one_name() {
    let mut writers = [writer(1), writer(2), writer(3)];
    let e = spawn(&mut writers[0], "e");
    exchange(&mut writers);

    for (i, sync) in writers.iter_mut().enumerate() {
        sync.world_mut().set_name(&e, &format!("name-{i}")).unwrap();
        sync.sync_from(&e).unwrap();
    }
    exchange(&mut writers);

    assert_all_converged(&writers);
}

#[test]
fn writer_with_more_history_wins_a_concurrent_write() {
    let mut writers = [writer(1), writer(2)];
    let e = spawn(&mut writers[0], "e");
    exchange(&mut writers);

    for x in [1.0, 2.0, 3.0] {
        place(&mut writers[0], &e, x);
    }
    place(&mut writers[1], &e, 7.0);
    exchange(&mut writers);

    assert_eq!(
        position(&writers[1], &e),
        Some(PropertyValue::Vector3(Vec3::new(3.0, 0.0, 0.0)))
    );
    assert_all_converged(&writers);
}

// ═══════════════════════════════════════════════════════════════════════════
// 3. CONCURRENT HIERARCHY EDITS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn concurrent_reparent_settles_on_one_parent() {
    let mut writers = [writer(1), writer(2)];
    let p1 = spawn(&mut writers[0], "p1");
    let p2 = spawn(&mut writers[0], "p2");
    let c = spawn(&mut writers[0], "c");
    exchange(&mut writers);

    reparent(&mut writers[0], &c, Some(&p1));
    reparent(&mut writers[1], &c, Some(&p2));
    exchange(&mut writers);

    let parent = writers[0].world().parent(&c);
    assert!(parent == Some(p1.clone()) || parent == Some(p2.clone()));
    assert_eq!(writers[1].world().parent(&c), parent);
    let listed = |sync: &Engine| [&p1, &p2].map(|p| sync.world().children(p).contains(&c));
    assert_eq!(listed(&writers[0]).iter().filter(|l| **l).count(), 1);
    assert_all_converged(&writers);
}

#[test]
fn concurrent_attach_and_detach_agree() {
    let mut writers = [writer(1), writer(2)];
    let p = spawn(&mut writers[0], "p");
    let q = spawn(&mut writers[0], "q");
    let c = spawn(&mut writers[0], "c");
    reparent(&mut writers[0], &c, Some(&p));
    exchange(&mut writers);

    reparent(&mut writers[0], &c, None);
    reparent(&mut writers[1], &c, Some(&q));
    exchange(&mut writers);

    assert!(writers[0].world().children(&p).is_empty());
    assert_all_converged(&writers);
}

#[test]
fn concurrent_attaches_to_one_parent_share_an_order() {
    let mut writers = [writer(1), writer(2), writer(3)];
    let p = spawn(&mut writers[0], "p");
    exchange(&mut writers);

    for (i, sync) in writers.iter_mut().enumerate() {
        let child = spawn(sync, &format!("child-{i}"));
        reparent(sync, &child, Some(&p));
    }
    exchange(&mut writers);

    assert_eq!(writers[0].world().children(&p).len(), 3);
    assert_all_converged(&writers);
}

#[test]
fn attach_under_a_concurrently_deleted_parent_leaves_the_child_at_the_top() {
    let mut writers = [writer(1), writer(2)];
    let p = spawn(&mut writers[0], "p");
    let c = spawn(&mut writers[0], "c");
    exchange(&mut writers);

    writers[0].delete(&p).unwrap();
    reparent(&mut writers[1], &c, Some(&p));
    exchange(&mut writers);

    assert!(!writers[1].world().contains(&p));
    assert_eq!(writers[0].world().parent(&c), None);
    assert_eq!(writers[1].world().parent(&c), None);
    assert_all_converged(&writers);
}

// ═══════════════════════════════════════════════════════════════════════════
// 4. UNDO AFTER A PEER EDIT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn undoing_an_attach_keeps_a_sibling_a_peer_added_since() {
    let mut writers = [writer(1), writer(2)];
    let p = spawn(&mut writers[0], "p");
    let c1 = spawn(&mut writers[0], "c1");
    writers[0].stop_capturing();
    reparent(&mut writers[0], &c1, Some(&p));
    exchange(&mut writers);

    let c0 = spawn(&mut writers[1], "c0");
    reparent(&mut writers[1], &c0, Some(&p));
    reparent(&mut writers[1], &c1, None);
    exchange(&mut writers);
    assert_eq!(writers[0].world().children(&p), vec![c0.clone()]);

    writers[0].undo().unwrap();
    assert_eq!(writers[0].world().children(&p), vec![c0.clone()]);
    assert_eq!(writers[0].world().parent(&c0), Some(p.clone()));
    assert_eq!(writers[0].world().parent(&c1), None);

    exchange(&mut writers);
    assert_all_converged(&writers);
}

#[test]
fn undoing_a_move_keeps_a_peer_move_made_since() {
    let mut writers = [writer(1), writer(2)];
    let e = spawn(&mut writers[0], "e");
    writers[0].stop_capturing();
    place(&mut writers[0], &e, 1.0);
    exchange(&mut writers);

    place(&mut writers[1], &e, 5.0);
    exchange(&mut writers);

    writers[0].undo().unwrap();
    exchange(&mut writers);
    assert_eq!(
        position(&writers[0], &e),
        Some(PropertyValue::Vector3(Vec3::new(5.0, 0.0, 0.0)))
    );
    assert_all_converged(&writers);
}

// ═══════════════════════════════════════════════════════════════════════════
// 5. RANDOM INTERLEAVINGS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Edit {
    Spawn,
    Move(usize, i32),
    Rename(usize, String),
    Parent(usize, usize),
    Unparent(usize),
    Delete(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => Just(Edit::Spawn),
        3 => (any::<usize>(), -20i32..20).prop_map(|(i, x)| Edit::Move(i, x)),
        2 => (any::<usize>(), "[a-z]{1,4}").prop_map(|(i, n)| Edit::Rename(i, n)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Edit::Parent(i, j)),
        1 => any::<usize>().prop_map(Edit::Unparent),
        1 => any::<usize>().prop_map(Edit::Delete),
    ]
}

/// One replica and the counter its entity ids are minted from.
struct Writer {
    sync: Engine,
    tag: usize,
    spawned: usize,
}

impl Writer {
    fn pick(&self, i: usize) -> Option<EntityId> {
        let ids = self.sync.world().entity_ids();
        (!ids.is_empty()).then(|| ids[i % ids.len()].clone())
    }

    /// Ids are never reused, and a parent always sorts before its child so
    /// concurrent reparenting can never close a cycle.
    fn run(&mut self, edit: &Edit) {
        match edit {
            Edit::Spawn => {
                let id = format!("{:03}-{}", self.spawned, self.tag);
                self.spawned += 1;
                spawn(&mut self.sync, &id);
            }
            Edit::Move(i, x) => {
                if let Some(id) = self.pick(*i) {
                    place(&mut self.sync, &id, f64::from(*x));
                }
            }
            Edit::Rename(i, name) => {
                if let Some(id) = self.pick(*i) {
                    self.sync.world_mut().set_name(&id, name).unwrap();
                    self.sync.sync_from(&id).unwrap();
                }
            }
            Edit::Parent(i, j) => {
                if let (Some(child), Some(parent)) = (self.pick(*i), self.pick(*j))
                    && parent < child
                {
                    reparent(&mut self.sync, &child, Some(&parent));
                }
            }
            Edit::Unparent(i) => {
                if let Some(child) = self.pick(*i)
                    && self.sync.world().parent(&child).is_some()
                {
                    reparent(&mut self.sync, &child, None);
                }
            }
            Edit::Delete(i) => {
                if let Some(id) = self.pick(*i) {
                    self.sync.delete(&id).unwrap();
                }
            }
        }
    }
}

/// Deterministic shuffle driven by proptest-chosen keys.
fn shuffled(updates: Vec<Update>, keys: &[u32]) -> Vec<Update> {
    let mut keyed: Vec<(u32, usize, Update)> = updates
        .into_iter()
        .enumerate()
        .map(|(i, u)| (keys.get(i % keys.len().max(1)).copied().unwrap_or(0), i, u))
        .collect();
    keyed.sort_by_key(|(k, i, _)| (*k, *i));
    keyed.into_iter().map(|(_, _, u)| u).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn writers_converge_whatever_the_delivery_order(
        rounds in prop::collection::vec(
            prop::collection::vec((0..3usize, edit()), 1..6),
            1..6,
        ),
        keys in prop::collection::vec(any::<u32>(), 1..48),
    ) {
        let mut writers: Vec<Writer> = (0..3)
            .map(|tag| Writer { sync: writer(tag as u64 + 1), tag, spawned: 0 })
            .collect();

        for (round, edits) in rounds.iter().enumerate() {
            for (at, edit) in edits {
                writers[*at].run(edit);
            }
            let outboxes: Vec<Vec<Update>> =
                writers.iter_mut().map(|w| w.sync.take_updates()).collect();
            for (to, w) in writers.iter_mut().enumerate() {
                let inbox: Vec<Update> = outboxes
                    .iter()
                    .enumerate()
                    .filter(|(from, _)| *from != to)
                    .flat_map(|(_, outbox)| outbox.iter().cloned())
                    .collect();
                let rotated: Vec<u32> = keys.iter().map(|k| k.rotate_left((to + round) as u32)).collect();
                for update in shuffled(inbox, &rotated) {
                    w.sync.apply_update(&update).unwrap();
                }
                prop_assert_eq!(w.sync.doc().pending_updates(), 0);
            }
        }

        let engines: Vec<Engine> = writers.into_iter().map(|w| w.sync).collect();
        assert_all_converged(&engines);
    }
}
