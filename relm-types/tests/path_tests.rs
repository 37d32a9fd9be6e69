use relm_types::{path, Origin, Path, PathSegment, ClientId};

#[test]
fn path_macro_mixes_keys_and_indices() {
    let p = path!["components", 2, "values"];
    assert_eq!(p.len(), 3);
    assert_eq!(p.get(0).and_then(PathSegment::as_key), Some("components"));
    assert_eq!(p.get(1).and_then(PathSegment::as_index), Some(2));
    assert_eq!(p.to_string(), "[components, 2, values]");
}

#[test]
fn empty_path_is_root() {
    assert!(path![].is_empty());
    assert_eq!(Path::root(), path![]);
}

#[test]
fn child_appends_without_mutating() {
    let parent = path![0];
    let child = parent.child("children");
    assert_eq!(parent.len(), 1);
    assert_eq!(child, path![0, "children"]);
}

#[test]
fn path_serializes_as_json_array() {
    let p = path!["components", 0, "values", "position"];
    let json = serde_json::to_string(&p).unwrap();
    assert_eq!(json, r#"["components",0,"values","position"]"#);
    let back: Path = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
}

#[test]
fn origin_classification() {
    assert!(Origin::Local.is_local());
    assert!(!Origin::Undo.is_local());
    assert!(Origin::Undo.is_replay());
    assert!(Origin::Redo.is_replay());
    assert!(!Origin::Remote(ClientId::from_raw(3)).is_outgoing());
    assert!(Origin::Import.is_outgoing());
    assert!(Origin::Local.is_outgoing());
}
