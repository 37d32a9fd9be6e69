//! Whole-world import into and export out of a document.

use crate::applicator::entity_prelim;
use crate::error::SyncResult;
use relm_doc::{Doc, Prelim};
use relm_model::{EntityJson, WorldJson};
use relm_types::Origin;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::info;

/// Root map holding named spawn points.
pub const ENTRYWAYS: &str = "entryways";
/// Root map holding world settings.
pub const SETTINGS: &str = "settings";

/// Seeds `doc` with an exported world in one [`Origin::Import`] transaction.
///
/// Entities are appended to the `entities_root` sequence in order; entryways
/// and settings are written key by key, overwriting existing keys.
pub fn import_world_doc(doc: &mut Doc, entities_root: &str, world: &WorldJson) -> SyncResult<()> {
    let entities = doc.get_or_insert_array(entities_root)?;
    let entryways = doc.get_or_insert_map(ENTRYWAYS)?;
    let settings = doc.get_or_insert_map(SETTINGS)?;
    let subtrees = world
        .entities
        .iter()
        .map(|e| e.to_value().map(|v| entity_prelim(&v)))
        .collect::<Result<Vec<Prelim>, _>>()?;

    doc.transact(Origin::Import, |txn| {
        txn.array_push(entities, subtrees)?;
        for (name, position) in &world.entryways {
            txn.map_set(entryways, name, json!(position))?;
        }
        for (key, value) in &world.settings {
            txn.map_set(settings, key, value.clone())?;
        }
        Ok(())
    })?;
    info!(
        entities = world.entities.len(),
        entryways = world.entryways.len(),
        "world imported"
    );
    Ok(())
}

/// Materializes the whole document as an exported world.
pub fn export_world_doc(doc: &Doc, entities_root: &str) -> SyncResult<WorldJson> {
    let entities = match doc.root(entities_root) {
        Some(root) => match doc.materialize(root)? {
            Value::Array(items) => items
                .into_iter()
                .map(EntityJson::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    let entryways: BTreeMap<String, Vec<f64>> = match doc.root(ENTRYWAYS) {
        Some(root) => serde_json::from_value(doc.materialize(root)?)?,
        None => BTreeMap::new(),
    };
    let settings: BTreeMap<String, Value> = match doc.root(SETTINGS) {
        Some(root) => serde_json::from_value(doc.materialize(root)?)?,
        None => BTreeMap::new(),
    };
    Ok(WorldJson {
        entities,
        entryways,
        settings,
    })
}
