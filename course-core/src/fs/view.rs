//! Display projection of the course tree.
//!
//! Views are rebuilt from scratch on every refresh, never diffed. Fold
//! state is UI-owned and lives in a [`FoldState`] map keyed by directory
//! path, so it survives rebuilds without relying on object identity.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use super::entity::{DirectoryEntity, Entity, EntityId};

/// Number of spaces per indentation step when rendering.
const INDENT_WIDTH: usize = 2;

/// Persistent fold state, keyed by directory path.
///
/// Directories absent from the map are folded; that makes "folded" the
/// default for newly discovered directories.
#[derive(Debug, Default, Clone)]
pub struct FoldState {
    unfolded: HashSet<PathBuf>,
}

impl FoldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unfolded(&self, path: &Path) -> bool {
        self.unfolded.contains(path)
    }

    pub fn set_folded(&mut self, path: &Path, folded: bool) {
        if folded {
            self.unfolded.remove(path);
        } else {
            self.unfolded.insert(path.to_path_buf());
        }
    }

    /// Flip the fold state, returning the new `folded` value.
    pub fn toggle(&mut self, path: &Path) -> bool {
        let folded = !self.is_unfolded(path);
        self.set_folded(path, !folded);
        !folded
    }

    /// Fold everything again.
    pub fn clear(&mut self) {
        self.unfolded.clear();
    }
}

/// View of a single course file.
#[derive(Debug, Clone)]
pub struct FileView {
    pub name: String,
    pub level: usize,
    pub entity: EntityId,
    pub path: PathBuf,
}

/// View of a directory, carrying its fold state and name-sorted children.
#[derive(Debug, Clone)]
pub struct DirectoryView {
    pub name: String,
    pub level: usize,
    pub entity: EntityId,
    pub path: PathBuf,
    pub directories: Vec<DirectoryView>,
    pub files: Vec<FileView>,
    pub folded: bool,
}

/// Kind tag for a flattened view entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEntryKind {
    Directory,
    File,
}

/// One line of the flattened display list the UI paginates over.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEntry {
    pub name: String,
    pub level: usize,
    pub entity: EntityId,
    pub path: PathBuf,
    pub kind: ViewEntryKind,
    pub folded: bool,
}

impl ViewEntry {
    /// Indentation steps: level 1 sits flush left, deeper levels indent
    /// by (level - 1).
    pub fn indent(&self) -> usize {
        self.level.saturating_sub(1)
    }
}

impl DirectoryView {
    /// Build the full view tree for `dir` as the level-0 root.
    pub fn build(dir: &DirectoryEntity, fold: &FoldState) -> Self {
        Self::build_at(dir, 0, fold)
    }

    fn build_at(dir: &DirectoryEntity, level: usize, fold: &FoldState) -> Self {
        let mut directories = Vec::new();
        let mut files = Vec::new();

        // BTreeMap iteration keeps both lists name-sorted.
        for entry in dir.entries() {
            match entry {
                Entity::Directory(sub) => {
                    directories.push(Self::build_at(sub, level + 1, fold));
                }
                Entity::File(file) => files.push(FileView {
                    name: file.name().to_string(),
                    level: level + 1,
                    entity: file.id(),
                    path: file.full_path().to_path_buf(),
                }),
            }
        }

        DirectoryView {
            name: dir.name().to_string(),
            level,
            entity: dir.id(),
            path: dir.full_path().to_path_buf(),
            directories,
            files,
            // The root is never rendered and never folds.
            folded: level > 0 && !fold.is_unfolded(dir.full_path()),
        }
    }

    /// Flatten into the list the UI paginates over.
    ///
    /// The root contributes nothing; every visible descendant contributes
    /// exactly one entry; a folded directory contributes only itself.
    pub fn collect_entries(&self) -> Vec<ViewEntry> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<ViewEntry>) {
        if self.level > 0 {
            out.push(ViewEntry {
                name: self.name.clone(),
                level: self.level,
                entity: self.entity,
                path: self.path.clone(),
                kind: ViewEntryKind::Directory,
                folded: self.folded,
            });
            if self.folded {
                return;
            }
        }
        for dir in &self.directories {
            dir.collect_into(out);
        }
        for file in &self.files {
            out.push(ViewEntry {
                name: file.name.clone(),
                level: file.level,
                entity: file.entity,
                path: file.path.clone(),
                kind: ViewEntryKind::File,
                folded: false,
            });
        }
    }

    fn fmt_into(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.level > 0 {
            writeln!(
                f,
                "{:indent$}{}/",
                "",
                self.name,
                indent = (self.level - 1) * INDENT_WIDTH
            )?;
            if self.folded {
                return Ok(());
            }
        }
        for dir in &self.directories {
            dir.fmt_into(f)?;
        }
        for file in &self.files {
            writeln!(
                f,
                "{:indent$}{}",
                "",
                file.name,
                indent = (file.level - 1) * INDENT_WIDTH
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for DirectoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_into(f)
    }
}
