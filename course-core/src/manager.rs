//! The course manager: tree, view, pagination and assignments in one
//! explicitly owned service instance.
//!
//! There is no global singleton; construct a manager, pass it to
//! consumers, and use [`CourseManager::migrate_from`] when a replacement
//! instance takes over during a live reload.
//!
//! Roles: the *client* owns the course files on disk and carries the
//! entity/view trees; the *server* holds only assignment state received
//! over the network and never touches local disk for courses.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::assignment::{AssignmentRegistry, CourseAssignment, VehicleId};
use crate::course::{
    Course, CourseSerializer, JsonCourseSerializer, LegacyWaypoint, COURSE_EXTENSION,
};
use crate::error::{CourseError, CourseResult};
use crate::fs::{DirectoryEntity, DirectoryView, FoldState, ViewEntry};
use crate::sync::{AssignmentSyncMessage, AssignmentTransport, NullTransport, PeerId};
use crate::CourseDirs;

/// Which side of the client/server split this manager runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the course files on disk.
    Client,
    /// Authoritative for relaying sync messages; no local course files.
    Server,
}

/// Client-side tree state: entities, view, fold map and flattened list.
struct CourseTree {
    root: DirectoryEntity,
    view: DirectoryView,
    fold: FoldState,
    entries: Vec<ViewEntry>,
}

/// Orchestrates the course tree, its display view and the vehicle
/// assignment registry.
pub struct CourseManager {
    role: Role,
    tree: Option<CourseTree>,
    /// 1-based start of the pagination window into the flattened list.
    window_start: usize,
    registry: AssignmentRegistry,
    legacy: HashMap<VehicleId, Vec<LegacyWaypoint>>,
    vehicles_with_courses: HashSet<VehicleId>,
    serializer: Box<dyn CourseSerializer>,
    transport: Box<dyn AssignmentTransport>,
}

impl CourseManager {
    /// Open a client manager over the configured course root, creating
    /// the root directory on disk if needed.
    pub fn client(
        dirs: &CourseDirs,
        serializer: Box<dyn CourseSerializer>,
        transport: Box<dyn AssignmentTransport>,
    ) -> CourseResult<Self> {
        Self::client_at(&dirs.course_root(), serializer, transport)
    }

    /// Open a client manager over an explicit course root path.
    pub fn client_at(
        root: &Path,
        serializer: Box<dyn CourseSerializer>,
        transport: Box<dyn AssignmentTransport>,
    ) -> CourseResult<Self> {
        let mut root = DirectoryEntity::open_root(root)?;
        root.refresh()?;
        info!("opened course root {}", root.full_path().display());

        let fold = FoldState::new();
        let view = DirectoryView::build(&root, &fold);
        let entries = view.collect_entries();
        Ok(Self {
            role: Role::Client,
            tree: Some(CourseTree {
                root,
                view,
                fold,
                entries,
            }),
            window_start: 1,
            registry: AssignmentRegistry::new(),
            legacy: HashMap::new(),
            vehicles_with_courses: HashSet::new(),
            serializer,
            transport,
        })
    }

    /// Open a client manager with the default JSON serializer and a
    /// no-op transport.
    pub fn open(root: &Path) -> CourseResult<Self> {
        Self::client_at(
            root,
            Box::new(JsonCourseSerializer),
            Box::new(NullTransport),
        )
    }

    /// Create a server-side manager: assignment state only, no tree.
    pub fn server(
        serializer: Box<dyn CourseSerializer>,
        transport: Box<dyn AssignmentTransport>,
    ) -> Self {
        Self {
            role: Role::Server,
            tree: None,
            window_start: 1,
            registry: AssignmentRegistry::new(),
            legacy: HashMap::new(),
            vehicles_with_courses: HashSet::new(),
            serializer,
            transport,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Absolute path of the course root, on the client side.
    pub fn root_path(&self) -> Option<&Path> {
        self.tree.as_ref().map(|t| t.root.full_path())
    }

    /// Current view tree, on the client side.
    pub fn view(&self) -> Option<&DirectoryView> {
        self.tree.as_ref().map(|t| &t.view)
    }

    // ---- tree and view -------------------------------------------------

    /// Re-scan the course root and rebuild the view. A no-op on the
    /// server side.
    pub fn refresh(&mut self) -> CourseResult<()> {
        match self.tree.as_mut() {
            Some(tree) => tree.root.refresh()?,
            None => {
                debug!("refresh skipped, no course tree on the server side");
                return Ok(());
            }
        }
        self.rebuild_view();
        Ok(())
    }

    fn rebuild_view(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            tree.view = DirectoryView::build(&tree.root, &tree.fold);
            tree.entries = tree.view.collect_entries();
        }
        self.window_start = clamp_window(self.window_start, self.entry_count());
    }

    /// Flattened display list in view order.
    pub fn entries(&self) -> &[ViewEntry] {
        self.tree.as_ref().map(|t| t.entries.as_slice()).unwrap_or(&[])
    }

    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    /// Fold or unfold the directory with the given full path.
    pub fn set_folded(&mut self, path: &Path, folded: bool) {
        if let Some(tree) = self.tree.as_mut() {
            tree.fold.set_folded(path, folded);
        }
        self.rebuild_view();
    }

    /// Flip the fold state of a directory, returning the new state.
    pub fn toggle_fold(&mut self, path: &Path) -> bool {
        let folded = match self.tree.as_mut() {
            Some(tree) => tree.fold.toggle(path),
            None => true,
        };
        self.rebuild_view();
        folded
    }

    /// Unfold every directory in the tree.
    pub fn unfold_all(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            let mut paths = Vec::new();
            collect_directory_paths(&tree.root, &mut paths);
            for path in paths {
                tree.fold.set_folded(&path, false);
            }
        }
        self.rebuild_view();
    }

    /// Fold every directory again.
    pub fn fold_all(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            tree.fold.clear();
        }
        self.rebuild_view();
    }

    // ---- pagination ----------------------------------------------------

    /// 1-based start of the display window.
    pub fn window_start(&self) -> usize {
        self.window_start
    }

    /// Set the window start, clamped to `[1, max(1, entry count)]`.
    pub fn set_window_start(&mut self, start: usize) {
        self.window_start = clamp_window(start, self.entry_count());
    }

    /// Entry at `window_start - 1 + offset`, or `None` when the slot is
    /// past the end of the list.
    pub fn entry_at_offset(&self, offset: usize) -> Option<&ViewEntry> {
        self.entries().get(self.window_start - 1 + offset)
    }

    // ---- directory operations ------------------------------------------

    /// Create a directory under `parent` (relative to the course root).
    pub fn create_directory(&mut self, parent: &Path, name: &str) -> CourseResult<()> {
        let tree = self.tree.as_mut().ok_or(CourseError::NoCourseTree)?;
        let dir = tree
            .root
            .directory_at_mut(parent)
            .ok_or_else(|| CourseError::EntryNotFound(parent.to_path_buf()))?;
        dir.create_directory(name)?;
        self.rebuild_view();
        Ok(())
    }

    /// Delete the directory at `rel` (relative to the course root).
    /// Refused with `Ok(false)` when it is missing or non-empty.
    pub fn delete_directory(&mut self, rel: &Path) -> CourseResult<bool> {
        let (parent, name) = split_rel(rel)?;
        let tree = self.tree.as_mut().ok_or(CourseError::NoCourseTree)?;
        let deleted = match tree.root.directory_at_mut(&parent) {
            Some(dir) => dir.delete_directory(&name)?,
            None => {
                warn!("no directory at {}", rel.display());
                false
            }
        };
        self.rebuild_view();
        Ok(deleted)
    }

    /// Delete the course file at `rel` (relative to the course root).
    pub fn delete_course(&mut self, rel: &Path) -> CourseResult<bool> {
        let (parent, name) = split_rel(rel)?;
        let tree = self.tree.as_mut().ok_or(CourseError::NoCourseTree)?;
        let deleted = match tree.root.directory_at_mut(&parent) {
            Some(dir) => dir.delete_file(&name)?,
            None => {
                warn!("no directory at {}", parent.display());
                false
            }
        };
        self.rebuild_view();
        Ok(deleted)
    }

    // ---- assignments ---------------------------------------------------

    /// Append a course to the vehicle's assignment and broadcast the
    /// updated list. Assign appends; loading replaces.
    pub fn assign(&mut self, vehicle: &VehicleId, course: Course) {
        self.registry.assign(vehicle, course);
        self.refresh_vehicle_state(vehicle);
        self.broadcast_assignment(vehicle);
    }

    /// Remove the vehicle's assignment and legacy projection entirely.
    /// No-op when none exists.
    pub fn unload_all(&mut self, vehicle: &VehicleId) {
        if self.unload_all_internal(vehicle) {
            self.broadcast_assignment(vehicle);
        }
    }

    fn unload_all_internal(&mut self, vehicle: &VehicleId) -> bool {
        let existed = self.registry.unload_all(vehicle);
        self.legacy.remove(vehicle);
        self.vehicles_with_courses.remove(vehicle);
        existed
    }

    /// Load a course document from `rel` (relative to the course root)
    /// onto the vehicle, replacing whatever was assigned before, and
    /// broadcast the new assignment.
    ///
    /// The course is named after the file stem. A missing file is a
    /// logged no-op; a read or format failure fails this call without
    /// touching the tree or the registry.
    pub fn load_course(&mut self, vehicle: &VehicleId, rel: &Path) -> CourseResult<()> {
        let tree = self.tree.as_ref().ok_or(CourseError::NoCourseTree)?;
        let (parent, name) = split_rel(rel)?;
        let file = tree
            .root
            .directory_at(&parent)
            .and_then(|dir| dir.get(&name))
            .and_then(|entity| entity.as_file());
        let Some(file) = file else {
            warn!("no course file at {}", rel.display());
            return Ok(());
        };

        let path = file.full_path().to_path_buf();
        let bytes = fs::read(&path)?;
        let mut course = self.serializer.deserialize(&bytes)?;
        course.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        self.unload_all_internal(vehicle);
        self.registry.assign(vehicle, course);
        self.refresh_vehicle_state(vehicle);
        self.broadcast_assignment(vehicle);
        Ok(())
    }

    /// Combine the vehicle's courses and write them as one document named
    /// `name` into the directory at `target` (relative to the course
    /// root), then refresh and rename the first loaded course in memory
    /// to match the artifact.
    ///
    /// Returns `Ok(false)` (logged) when there is nothing to save or the
    /// target directory is unknown. A serialization or write failure
    /// fails the call before any entity is inserted.
    pub fn save_from_vehicle(
        &mut self,
        target: &Path,
        vehicle: &VehicleId,
        name: &str,
    ) -> CourseResult<bool> {
        let Some(mut artifact) = self.registry.combined_course(vehicle, false) else {
            warn!("no courses loaded on {vehicle}, nothing to save");
            return Ok(false);
        };
        artifact.name = name.to_string();

        let tree = self.tree.as_ref().ok_or(CourseError::NoCourseTree)?;
        let Some(dir) = tree.root.directory_at(target) else {
            warn!("no target directory at {}", target.display());
            return Ok(false);
        };
        let file_path = dir.full_path().join(format!("{name}.{COURSE_EXTENSION}"));

        let bytes = self.serializer.serialize(&artifact)?;
        fs::write(&file_path, bytes)?;
        info!("saved {} as {}", vehicle, file_path.display());

        self.refresh()?;
        self.registry.rename_first_course(vehicle, name);
        self.registry.set_saved(vehicle, true);
        self.refresh_vehicle_state(vehicle);
        self.broadcast_assignment(vehicle);
        Ok(true)
    }

    /// Rebuild an assignment from a save game. The stored slot index is
    /// advisory only; the real slot is re-derived from the vehicle
    /// identity. Nothing is broadcast.
    pub fn restore_assignment(
        &mut self,
        vehicle: &VehicleId,
        advisory_slot: usize,
        courses: Vec<Course>,
    ) {
        self.unload_all_internal(vehicle);
        for course in courses {
            self.registry.assign(vehicle, course);
        }
        self.refresh_vehicle_state(vehicle);

        if let Some(actual) = self.registry.slot_index(vehicle) {
            if actual != advisory_slot {
                debug!(
                    "stored slot {advisory_slot} for {vehicle} is stale, actual slot is {actual}"
                );
            }
        }
    }

    pub fn assignment(&self, vehicle: &VehicleId) -> Option<&CourseAssignment> {
        self.registry.get(vehicle)
    }

    /// See [`AssignmentRegistry::has_course`]: at least one course is
    /// assigned, saved or not.
    pub fn has_course(&self, vehicle: &VehicleId) -> bool {
        self.registry.has_course(vehicle)
    }

    pub fn is_saved(&self, vehicle: &VehicleId) -> Option<bool> {
        self.registry.is_saved(vehicle)
    }

    pub fn slot_index(&self, vehicle: &VehicleId) -> Option<usize> {
        self.registry.slot_index(vehicle)
    }

    pub fn combined_course(
        &self,
        vehicle: &VehicleId,
        exclude_fieldwork: bool,
    ) -> Option<Course> {
        self.registry.combined_course(vehicle, exclude_fieldwork)
    }

    pub fn fieldwork_course(&self, vehicle: &VehicleId) -> Option<Course> {
        self.registry.fieldwork_course(vehicle).cloned()
    }

    /// Flat legacy waypoint projection for old integrations; empty when
    /// the vehicle has no assignment.
    pub fn legacy_waypoints(&self, vehicle: &VehicleId) -> &[LegacyWaypoint] {
        self.legacy.get(vehicle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn vehicles_with_courses(&self) -> &HashSet<VehicleId> {
        &self.vehicles_with_courses
    }

    fn refresh_vehicle_state(&mut self, vehicle: &VehicleId) {
        if self.registry.has_course(vehicle) {
            self.vehicles_with_courses.insert(vehicle.clone());
            self.legacy
                .insert(vehicle.clone(), self.registry.legacy_waypoints(vehicle));
        } else {
            self.vehicles_with_courses.remove(vehicle);
            self.legacy.remove(vehicle);
        }
    }

    // ---- sync ----------------------------------------------------------

    /// Serialize the vehicle's full current course list and send it as
    /// one message. Fire-and-forget; a failed serialization skips the
    /// send and logs.
    fn broadcast_assignment(&mut self, vehicle: &VehicleId) {
        let mut blobs = Vec::new();
        if let Some(assignment) = self.registry.get(vehicle) {
            for course in assignment.courses() {
                match self.serializer.serialize(course) {
                    Ok(bytes) => blobs.push(bytes),
                    Err(err) => {
                        warn!("skipping assignment sync for {vehicle}: {err}");
                        return;
                    }
                }
            }
        }
        let msg = AssignmentSyncMessage {
            vehicle: vehicle.clone(),
            slot_index: self.registry.slot_index(vehicle),
            courses: blobs,
        };
        self.transport.broadcast(&msg);
    }

    /// Apply a peer's assignment sync: replay the full list with replace
    /// semantics, then relay to the rest of the star when this manager is
    /// the authoritative server.
    ///
    /// All course blobs are decoded before any local state changes, so a
    /// malformed message leaves the registry untouched.
    pub fn handle_assignment_sync(
        &mut self,
        msg: &AssignmentSyncMessage,
        sender: PeerId,
    ) -> CourseResult<()> {
        let mut courses = Vec::with_capacity(msg.courses.len());
        for blob in &msg.courses {
            courses.push(self.serializer.deserialize(blob)?);
        }

        self.unload_all_internal(&msg.vehicle);
        for course in courses {
            self.registry.assign(&msg.vehicle, course);
        }
        self.refresh_vehicle_state(&msg.vehicle);
        debug!(
            "applied assignment sync for {} ({} courses)",
            msg.vehicle,
            msg.courses.len()
        );

        if self.role == Role::Server {
            self.transport.relay(msg, sender);
        }
        Ok(())
    }

    // ---- lifetime ------------------------------------------------------

    /// Carry assignment and UI state over from the instance this manager
    /// replaces during a live reload. Tree contents come from the new
    /// instance's own refresh, not from the old one.
    pub fn migrate_from(&mut self, old: CourseManager) {
        self.registry = old.registry;
        self.legacy = old.legacy;
        self.vehicles_with_courses = old.vehicles_with_courses;
        self.window_start = old.window_start;
        if let (Some(tree), Some(old_tree)) = (self.tree.as_mut(), old.tree) {
            tree.fold = old_tree.fold;
        }
        self.rebuild_view();
    }
}

fn clamp_window(start: usize, entry_count: usize) -> usize {
    start.clamp(1, entry_count.max(1))
}

fn collect_directory_paths(dir: &DirectoryEntity, out: &mut Vec<PathBuf>) {
    for entry in dir.entries() {
        if let crate::fs::Entity::Directory(sub) = entry {
            out.push(sub.full_path().to_path_buf());
            collect_directory_paths(sub, out);
        }
    }
}

/// Split a root-relative path into (parent, final component name).
fn split_rel(rel: &Path) -> CourseResult<(PathBuf, String)> {
    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CourseError::EntryNotFound(rel.to_path_buf()))?;
    let parent = rel.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    Ok((parent, name.to_string()))
}
