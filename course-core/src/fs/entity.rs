//! On-disk course tree entities.
//!
//! The tree is a closed variant type: a node is either a [`FileEntity`]
//! (one serialized course document) or a [`DirectoryEntity`] owning a
//! name-keyed map of children. Parent links are plain paths used only for
//! path/display reconstruction, never for ownership.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use log::{debug, warn};

use crate::error::{CourseError, CourseResult};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity token for an entity.
///
/// Assigned once at creation and never reused; entities that survive a
/// refresh keep their id, so view-held references stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// A node in the course tree.
#[derive(Debug)]
pub enum Entity {
    File(FileEntity),
    Directory(DirectoryEntity),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::File(f) => f.id,
            Entity::Directory(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::File(f) => &f.name,
            Entity::Directory(d) => &d.name,
        }
    }

    pub fn full_path(&self) -> &Path {
        match self {
            Entity::File(f) => &f.full_path,
            Entity::Directory(d) => &d.full_path,
        }
    }

    /// Parent directory path; `None` for the root.
    pub fn parent_path(&self) -> Option<&Path> {
        match self {
            Entity::File(f) => f.parent.as_deref(),
            Entity::Directory(d) => d.parent.as_deref(),
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryEntity> {
        match self {
            Entity::Directory(d) => Some(d),
            Entity::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntity> {
        match self {
            Entity::File(f) => Some(f),
            Entity::Directory(_) => None,
        }
    }
}

// Equality is by full path; ordering is by name, with the path as tie-break
// so the order stays total.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.full_path() == other.full_path()
    }
}

impl Eq for Entity {}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.full_path().cmp(other.full_path()))
    }
}

/// A single serialized course document on disk.
#[derive(Debug)]
pub struct FileEntity {
    id: EntityId,
    name: String,
    full_path: PathBuf,
    parent: Option<PathBuf>,
}

impl FileEntity {
    fn new(parent: &Path, name: &str) -> Self {
        Self {
            id: EntityId::next(),
            name: name.to_string(),
            full_path: parent.join(name),
            parent: Some(parent.to_path_buf()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }
}

/// A directory in the course tree, owning its children exclusively.
#[derive(Debug)]
pub struct DirectoryEntity {
    id: EntityId,
    name: String,
    full_path: PathBuf,
    parent: Option<PathBuf>,
    entries: BTreeMap<String, Entity>,
}

impl DirectoryEntity {
    fn new(parent: &Path, name: &str) -> Self {
        Self {
            id: EntityId::next(),
            name: name.to_string(),
            full_path: parent.join(name),
            parent: Some(parent.to_path_buf()),
            entries: BTreeMap::new(),
        }
    }

    /// Open (creating on disk if needed) a root directory.
    ///
    /// The root has no parent; call [`DirectoryEntity::refresh`] afterwards
    /// to populate it.
    pub fn open_root(path: &Path) -> CourseResult<Self> {
        fs::create_dir_all(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            id: EntityId::next(),
            name,
            full_path: path.to_path_buf(),
            parent: None,
            entries: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Direct children in name order.
    pub fn entries(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entries.get(name)
    }

    /// Zero direct entries. Emptiness is non-recursive.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Descend to the directory at `rel` (relative to this one).
    /// An empty path resolves to this directory itself.
    pub fn directory_at(&self, rel: &Path) -> Option<&DirectoryEntity> {
        let mut current = self;
        for component in rel.components() {
            let name = match component {
                Component::Normal(n) => n.to_str()?,
                Component::CurDir => continue,
                _ => return None,
            };
            current = current.entries.get(name)?.as_directory()?;
        }
        Some(current)
    }

    /// Mutable variant of [`DirectoryEntity::directory_at`].
    pub fn directory_at_mut(&mut self, rel: &Path) -> Option<&mut DirectoryEntity> {
        let mut current = self;
        for component in rel.components() {
            let name = match component {
                Component::Normal(n) => n.to_str()?,
                Component::CurDir => continue,
                _ => return None,
            };
            current = match current.entries.get_mut(name) {
                Some(Entity::Directory(d)) => d,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Synchronize `entries` with the actual on-disk children.
    ///
    /// Mark-and-sweep: every tracked name starts as pending removal, the
    /// disk is enumerated once, tracked entries are unmarked (directories
    /// recursively refreshed, files kept untouched so their identity is
    /// stable), untracked entries are created, and whatever is still
    /// pending afterwards no longer exists on disk and is pruned.
    pub fn refresh(&mut self) -> CourseResult<()> {
        let mut pending: Vec<String> = self.entries.keys().cloned().collect();

        for item in fs::read_dir(&self.full_path)? {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    warn!(
                        "skipping unreadable entry under {}: {}",
                        self.full_path.display(),
                        err
                    );
                    continue;
                }
            };
            let file_type = match item.file_type() {
                Ok(t) => t,
                Err(err) => {
                    warn!("skipping {:?}: {}", item.file_name(), err);
                    continue;
                }
            };
            let name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("skipping non-UTF-8 entry {:?}", raw);
                    continue;
                }
            };

            pending.retain(|p| p != &name);

            let tracked_as_dir = matches!(self.entries.get(&name), Some(Entity::Directory(_)));
            let tracked_as_file = matches!(self.entries.get(&name), Some(Entity::File(_)));

            if file_type.is_dir() {
                if tracked_as_dir {
                    if let Some(Entity::Directory(dir)) = self.entries.get_mut(&name) {
                        dir.refresh()?;
                    }
                } else {
                    if tracked_as_file {
                        debug!("{name} changed from file to directory");
                    }
                    let mut dir = DirectoryEntity::new(&self.full_path, &name);
                    dir.refresh()?;
                    self.entries.insert(name, Entity::Directory(dir));
                }
            } else if !tracked_as_file {
                if tracked_as_dir {
                    debug!("{name} changed from directory to file");
                }
                let file = FileEntity::new(&self.full_path, &name);
                self.entries.insert(name, Entity::File(file));
            }
        }

        for name in pending {
            debug!(
                "pruning stale entry {} under {}",
                name,
                self.full_path.display()
            );
            self.entries.remove(&name);
        }

        Ok(())
    }

    /// Create a subdirectory, on disk and in memory.
    ///
    /// Idempotent: an already-tracked directory of that name is returned
    /// unchanged, and an already-existing on-disk folder is not an error.
    pub fn create_directory(&mut self, name: &str) -> CourseResult<&DirectoryEntity> {
        if let Some(Entity::File(file)) = self.entries.get(name) {
            return Err(CourseError::NotADirectory(file.full_path.clone()));
        }

        if !self.entries.contains_key(name) {
            let path = self.full_path.join(name);
            match fs::create_dir(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.into()),
            }
            let dir = DirectoryEntity::new(&self.full_path, name);
            self.entries.insert(name.to_string(), Entity::Directory(dir));
        }

        match self.entries.get(name) {
            Some(Entity::Directory(dir)) => Ok(dir),
            _ => Err(CourseError::NotADirectory(self.full_path.join(name))),
        }
    }

    /// Delete an empty subdirectory.
    ///
    /// Returns `false` without touching anything when the directory is
    /// missing or still has entries; the caller must re-check emptiness.
    pub fn delete_directory(&mut self, name: &str) -> CourseResult<bool> {
        let path = match self.entries.get(name) {
            Some(Entity::Directory(dir)) => {
                if !dir.entries.is_empty() {
                    warn!(
                        "refusing to delete non-empty directory {}",
                        dir.full_path.display()
                    );
                    return Ok(false);
                }
                dir.full_path.clone()
            }
            _ => {
                warn!(
                    "no directory named {} under {}",
                    name,
                    self.full_path.display()
                );
                return Ok(false);
            }
        };

        fs::remove_dir(&path)?;
        self.entries.remove(name);
        Ok(true)
    }

    /// Delete a tracked file, always issuing the on-disk delete.
    pub fn delete_file(&mut self, name: &str) -> CourseResult<bool> {
        let path = match self.entries.get(name) {
            Some(Entity::File(file)) => file.full_path.clone(),
            _ => {
                warn!("no file named {} under {}", name, self.full_path.display());
                return Ok(false);
            }
        };

        fs::remove_file(&path)?;
        self.entries.remove(name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"{}").unwrap();
    }

    #[test]
    fn test_refresh_matches_disk() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("fields")).unwrap();
        touch(&tmp.path().join("headland.course"));
        touch(&tmp.path().join("fields/row1.course"));

        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.refresh().unwrap();

        let names: Vec<&str> = root.entries().map(Entity::name).collect();
        assert_eq!(names, vec!["fields", "headland.course"]);

        let fields = root.get("fields").unwrap().as_directory().unwrap();
        assert_eq!(fields.entry_count(), 1);
        assert!(fields.get("row1.course").is_some());
    }

    #[test]
    fn test_refresh_prunes_and_picks_up() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("old.course"));

        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.refresh().unwrap();
        assert!(root.get("old.course").is_some());

        fs::remove_file(tmp.path().join("old.course")).unwrap();
        touch(&tmp.path().join("new.course"));
        root.refresh().unwrap();

        assert!(root.get("old.course").is_none());
        assert!(root.get("new.course").is_some());
        assert_eq!(root.entry_count(), 1);
    }

    #[test]
    fn test_refresh_preserves_file_identity() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("keep.course"));

        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.refresh().unwrap();
        let id_before = root.get("keep.course").unwrap().id();

        touch(&tmp.path().join("other.course"));
        root.refresh().unwrap();

        let id_after = root.get("keep.course").unwrap().id();
        assert_eq!(id_before, id_after);
    }

    #[test]
    fn test_refresh_reaches_nested_changes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();

        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.refresh().unwrap();

        fs::create_dir(tmp.path().join("a/b")).unwrap();
        touch(&tmp.path().join("a/b/deep.course"));
        root.refresh().unwrap();

        let deep = root.directory_at(Path::new("a/b")).unwrap();
        assert!(deep.get("deep.course").is_some());
    }

    #[test]
    fn test_create_directory_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();

        let first = root.create_directory("fields").unwrap().id();
        let second = root.create_directory("fields").unwrap().id();

        assert_eq!(first, second);
        assert!(tmp.path().join("fields").is_dir());
        assert_eq!(root.entry_count(), 1);
    }

    #[test]
    fn test_delete_non_empty_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.create_directory("fields").unwrap();
        touch(&tmp.path().join("fields/row1.course"));
        root.refresh().unwrap();

        assert!(!root.delete_directory("fields").unwrap());
        assert!(root.get("fields").is_some());
        assert!(tmp.path().join("fields").is_dir());
    }

    #[test]
    fn test_delete_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.create_directory("fields").unwrap();

        assert!(root.delete_directory("fields").unwrap());
        assert!(root.get("fields").is_none());
        assert!(!tmp.path().join("fields").exists());
    }

    #[test]
    fn test_delete_file_removes_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("gone.course"));
        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.refresh().unwrap();

        assert!(root.delete_file("gone.course").unwrap());
        assert!(!tmp.path().join("gone.course").exists());
        assert!(!root.delete_file("gone.course").unwrap());
    }

    #[test]
    fn test_entity_ordering_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("b.course"));
        touch(&tmp.path().join("a.course"));
        let mut root = DirectoryEntity::open_root(tmp.path()).unwrap();
        root.refresh().unwrap();

        let entities: Vec<&Entity> = root.entries().collect();
        assert!(entities[0] < entities[1]);
        assert_eq!(entities[0].name(), "a.course");
    }
}
