use pretty_assertions::assert_eq;
use relm_model::{ComponentRegistry, MemoryWorld, PropertyValue, Vec3, World};
use relm_sync::{SyncConfig, SyncEvent, WorldSync};
use relm_types::{EntityId, Origin};

type Engine = WorldSync<MemoryWorld>;

/// An engine whose undo steps only end on `stop_capturing`.
fn engine() -> Engine {
    let config = SyncConfig {
        undo_capture_timeout_ms: 3_600_000,
        ..SyncConfig::default()
    };
    WorldSync::new(MemoryWorld::new(ComponentRegistry::core()), config).unwrap()
}

fn boxed(sync: &mut Engine) -> EntityId {
    let id = EntityId::from("box");
    sync.world_mut().spawn_with_id(id.clone(), "Box").unwrap();
    sync.world_mut().insert_component(&id, "Transform").unwrap();
    sync.world_mut().insert_component(&id, "Shape").unwrap();
    sync.sync_from(&id).unwrap();
    sync.stop_capturing();
    id
}

fn nudge(sync: &mut Engine, id: &EntityId, step: f64) {
    sync.world_mut()
        .set_property(
            id,
            "Transform",
            "position",
            PropertyValue::Vector3(Vec3::new(step, step * 2.0, 0.0)),
        )
        .unwrap();
    sync.sync_from(id).unwrap();
}

#[test]
fn undo_restores_the_state_before_a_burst_of_edits() {
    let mut sync = engine();
    let id = boxed(&mut sync);
    let snapshot = sync.world().to_json(&id).unwrap();

    for step in 1..=5 {
        nudge(&mut sync, &id, f64::from(step));
    }
    sync.world_mut().set_name(&id, "Moved").unwrap();
    sync.sync_from(&id).unwrap();
    assert_ne!(sync.world().to_json(&id).unwrap(), snapshot);

    let reports = sync.undo().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].origin, Origin::Undo);
    assert!(reports[0].is_clean());
    assert_eq!(sync.world().to_json(&id).unwrap(), snapshot);
    assert_eq!(
        sync.get_json(&id).unwrap(),
        snapshot.to_value().unwrap()
    );
}

#[test]
fn redo_reapplies_the_burst() {
    let mut sync = engine();
    let id = boxed(&mut sync);
    for step in 1..=3 {
        nudge(&mut sync, &id, f64::from(step));
    }
    let edited = sync.world().to_json(&id).unwrap();

    sync.undo().unwrap();
    assert!(sync.can_redo());
    let reports = sync.redo().unwrap();
    assert_eq!(reports[0].origin, Origin::Redo);
    assert_eq!(sync.world().to_json(&id).unwrap(), edited);
    assert!(sync.can_undo());
}

#[test]
fn separate_steps_undo_one_at_a_time() {
    let mut sync = engine();
    let id = boxed(&mut sync);
    let original = sync.world().to_json(&id).unwrap();

    nudge(&mut sync, &id, 1.0);
    sync.stop_capturing();
    let after_first = sync.world().to_json(&id).unwrap();
    nudge(&mut sync, &id, 2.0);

    sync.undo().unwrap();
    assert_eq!(sync.world().to_json(&id).unwrap(), after_first);
    sync.undo().unwrap();
    assert_eq!(sync.world().to_json(&id).unwrap(), original);
}

#[test]
fn undoing_a_creation_removes_the_entity() {
    let mut sync = engine();
    let id = boxed(&mut sync);

    let reports = sync.undo().unwrap();
    assert_eq!(
        reports[0].events,
        vec![SyncEvent::EntityRemoved { entity: id.clone() }]
    );
    assert!(!sync.world().contains(&id));
    assert!(sync.correlation().is_empty());

    let reports = sync.redo().unwrap();
    assert_eq!(
        reports[0].events,
        vec![SyncEvent::EntityAdded { entity: id.clone() }]
    );
    assert!(sync.world().contains(&id));
    assert!(sync.node_of(&id).is_some());
}

#[test]
fn undoing_a_delete_restores_the_hierarchy() {
    let mut sync = engine();
    let p = EntityId::from("p");
    let c = EntityId::from("c");
    sync.world_mut().spawn_with_id(p.clone(), "parent").unwrap();
    sync.world_mut().spawn_with_id(c.clone(), "child").unwrap();
    sync.world_mut().set_parent(&c, Some(&p)).unwrap();
    sync.sync_from(&p).unwrap();
    sync.sync_from(&c).unwrap();
    sync.stop_capturing();

    sync.delete(&p).unwrap();
    assert!(sync.world().is_empty());

    let reports = sync.undo().unwrap();
    assert!(reports.iter().all(|r| r.is_clean()));
    assert!(sync.world().contains(&p));
    assert_eq!(sync.world().parent(&c), Some(p.clone()));
    assert_eq!(sync.world().children(&p), vec![c]);
}

#[test]
fn nothing_to_undo_yields_no_reports() {
    let mut sync = engine();
    assert!(!sync.can_undo());
    assert!(sync.undo().unwrap().is_empty());
    assert!(sync.redo().unwrap().is_empty());
}

#[test]
fn remote_changes_are_not_undone() {
    let mut a = engine();
    let mut b = engine();
    let id = boxed(&mut a);
    for update in a.take_updates() {
        b.apply_update(&update).unwrap();
    }
    assert!(!b.can_undo());
    assert!(b.world().contains(&id));
}

#[test]
fn undo_replays_ship_to_peers() {
    let mut a = engine();
    let mut b = engine();
    let id = boxed(&mut a);
    let original = a.world().to_json(&id).unwrap();
    nudge(&mut a, &id, 4.0);
    for update in a.take_updates() {
        b.apply_update(&update).unwrap();
    }

    a.undo().unwrap();
    let updates = a.take_updates();
    assert_eq!(updates.len(), 1);
    b.apply_update(&updates[0]).unwrap();
    assert_eq!(b.world().to_json(&id).unwrap(), original);
}
