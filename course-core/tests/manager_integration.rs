//! End-to-end tests for the course manager over a real temp directory.

use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::rc::Rc;

use course_core::{
    export_bundle, import_bundle, Course, CourseManager, CourseSerializer, JsonCourseSerializer,
    MemoryTransport, PeerId, VehicleId, ViewEntryKind, Waypoint,
};

fn course(name: &str, fieldwork: bool, waypoints: usize) -> Course {
    let mut c = Course::new(name);
    c.fieldwork = fieldwork;
    c.waypoints = (0..waypoints)
        .map(|i| Waypoint::new(i as f64, 0.0, -(i as f64)))
        .collect();
    c
}

#[test]
fn test_save_and_reload_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = CourseManager::open(tmp.path()).unwrap();
    let tractor = VehicleId::from("tractor");
    let combine = VehicleId::from("combine");

    manager.assign(&tractor, course("A", true, 4));
    manager.assign(&tractor, course("B", false, 6));

    assert!(manager
        .save_from_vehicle(Path::new(""), &tractor, "merged")
        .unwrap());

    // The artifact landed in the tree and the first in-memory course was
    // renamed to match it.
    assert!(tmp.path().join("merged.course").is_file());
    assert_eq!(
        manager.assignment(&tractor).unwrap().courses()[0].name,
        "merged"
    );
    assert_eq!(manager.is_saved(&tractor), Some(true));

    // Reloading yields one course with the summed waypoint count, named
    // after the file.
    manager
        .load_course(&combine, Path::new("merged.course"))
        .unwrap();
    let loaded = manager.assignment(&combine).unwrap();
    assert_eq!(loaded.courses().len(), 1);
    assert_eq!(loaded.courses()[0].name, "merged");
    assert_eq!(loaded.courses()[0].waypoint_count(), 10);
}

#[test]
fn test_load_replaces_previous_assignment() {
    let tmp = tempfile::tempdir().unwrap();
    let ser = JsonCourseSerializer;
    fs::write(
        tmp.path().join("one.course"),
        ser.serialize(&course("x", false, 2)).unwrap(),
    )
    .unwrap();
    fs::write(
        tmp.path().join("two.course"),
        ser.serialize(&course("y", false, 3)).unwrap(),
    )
    .unwrap();

    let mut manager = CourseManager::open(tmp.path()).unwrap();
    let tractor = VehicleId::from("tractor");

    manager.load_course(&tractor, Path::new("one.course")).unwrap();
    manager.load_course(&tractor, Path::new("two.course")).unwrap();

    let assignment = manager.assignment(&tractor).unwrap();
    assert_eq!(assignment.courses().len(), 1);
    assert_eq!(assignment.courses()[0].name, "two");
}

#[test]
fn test_sync_propagates_through_server_star() {
    // client1 -> server -> client2, the star topology relay.
    let tmp1 = tempfile::tempdir().unwrap();
    let tmp2 = tempfile::tempdir().unwrap();

    let client1_out = Rc::new(RefCell::new(MemoryTransport::new()));
    let server_out = Rc::new(RefCell::new(MemoryTransport::new()));
    let client2_out = Rc::new(RefCell::new(MemoryTransport::new()));

    let mut client1 = CourseManager::client_at(
        tmp1.path(),
        Box::new(JsonCourseSerializer),
        Box::new(Rc::clone(&client1_out)),
    )
    .unwrap();
    let mut server = CourseManager::server(
        Box::new(JsonCourseSerializer),
        Box::new(Rc::clone(&server_out)),
    );
    let mut client2 = CourseManager::client_at(
        tmp2.path(),
        Box::new(JsonCourseSerializer),
        Box::new(Rc::clone(&client2_out)),
    )
    .unwrap();

    let tractor = VehicleId::from("tractor");
    client1.assign(&tractor, course("A", false, 2));
    client1.assign(&tractor, course("B", false, 3));

    // The wire carries the full list on every change; deliver the latest.
    let msg = client1_out.borrow().broadcasts.last().unwrap().clone();
    server.handle_assignment_sync(&msg, PeerId(1)).unwrap();

    // Server applied it and relayed to everyone but the sender.
    assert!(server.has_course(&tractor));
    let relays = server_out.borrow().relays.clone();
    assert_eq!(relays.len(), 1);
    assert_eq!(relays[0].1, PeerId(1));

    client2.handle_assignment_sync(&relays[0].0, PeerId(0)).unwrap();
    assert_eq!(client2.assignment(&tractor).unwrap().courses().len(), 2);
    assert_eq!(
        client2.combined_course(&tractor, false).unwrap().name,
        "A + 1"
    );
    // Clients never relay further.
    assert!(client2_out.borrow().relays.is_empty());
}

#[test]
fn test_tree_view_pagination_window() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("fields")).unwrap();
    for name in ["w.course", "x.course"] {
        fs::write(tmp.path().join(name), b"{}").unwrap();
    }
    for name in ["a.course", "b.course", "c.course"] {
        fs::write(tmp.path().join("fields").join(name), b"{}").unwrap();
    }

    let mut manager = CourseManager::open(tmp.path()).unwrap();

    // Everything folded: one entry per top-level entity.
    assert_eq!(manager.entry_count(), 3);
    assert_eq!(manager.entry_at_offset(0).unwrap().name, "fields");
    assert_eq!(manager.entry_at_offset(0).unwrap().kind, ViewEntryKind::Directory);

    // Unfolding inserts the direct children right after the directory.
    manager.set_folded(&tmp.path().join("fields"), false);
    let names: Vec<String> = manager.entries().iter().map(|e| e.name.clone()).collect();
    assert_eq!(
        names,
        vec!["fields", "a.course", "b.course", "c.course", "w.course", "x.course"]
    );

    // A two-slot HUD window walking the list.
    manager.set_window_start(5);
    assert_eq!(manager.entry_at_offset(0).unwrap().name, "w.course");
    assert_eq!(manager.entry_at_offset(1).unwrap().name, "x.course");
    assert!(manager.entry_at_offset(2).is_none());

    // Folding again shrinks the list and clamps the window.
    manager.set_folded(&tmp.path().join("fields"), true);
    assert_eq!(manager.entry_count(), 3);
    assert_eq!(manager.window_start(), 3);
}

#[test]
fn test_directory_lifecycle_through_manager() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = CourseManager::open(tmp.path()).unwrap();
    let tractor = VehicleId::from("tractor");

    manager.create_directory(Path::new(""), "fields").unwrap();
    // Creating it again is a no-op.
    manager.create_directory(Path::new(""), "fields").unwrap();
    assert_eq!(manager.entry_count(), 1);

    manager.assign(&tractor, course("A", false, 2));
    assert!(manager
        .save_from_vehicle(Path::new("fields"), &tractor, "saved")
        .unwrap());

    // Non-empty: refused, tree unchanged.
    assert!(!manager.delete_directory(Path::new("fields")).unwrap());
    assert!(tmp.path().join("fields").is_dir());

    assert!(manager.delete_course(Path::new("fields/saved.course")).unwrap());
    assert!(manager.delete_directory(Path::new("fields")).unwrap());
    assert_eq!(manager.entry_count(), 0);
    assert_eq!(manager.window_start(), 1);
}

#[test]
fn test_external_changes_survive_refresh() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = CourseManager::open(tmp.path()).unwrap();

    // Files appear and disappear behind the manager's back.
    fs::write(tmp.path().join("external.course"), b"{}").unwrap();
    manager.refresh().unwrap();
    assert_eq!(manager.entry_count(), 1);

    fs::remove_file(tmp.path().join("external.course")).unwrap();
    manager.refresh().unwrap();
    assert_eq!(manager.entry_count(), 0);
}

#[test]
fn test_bundle_import_repopulates_tree() {
    let src = tempfile::tempdir().unwrap();
    let ser = JsonCourseSerializer;
    fs::write(
        src.path().join("pack.course"),
        ser.serialize(&course("packed", false, 3)).unwrap(),
    )
    .unwrap();

    let mut source = CourseManager::open(src.path()).unwrap();
    source.refresh().unwrap();

    let mut buf = Vec::new();
    {
        let root = source.view().unwrap();
        assert_eq!(root.files.len(), 1);
    }
    // Export straight from the source tree.
    let mut root = course_core::DirectoryEntity::open_root(src.path()).unwrap();
    root.refresh().unwrap();
    export_bundle(&root, "pack", Cursor::new(&mut buf)).unwrap();

    let dst = tempfile::tempdir().unwrap();
    let mut target = CourseManager::open(dst.path()).unwrap();
    import_bundle(Cursor::new(&buf), dst.path()).unwrap();
    target.refresh().unwrap();

    assert_eq!(target.entry_count(), 1);
    let tractor = VehicleId::from("tractor");
    target.load_course(&tractor, Path::new("pack.course")).unwrap();
    assert_eq!(
        target.combined_course(&tractor, false).unwrap().waypoint_count(),
        3
    );
}
