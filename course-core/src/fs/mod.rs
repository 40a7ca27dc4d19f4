//! Course tree filesystem layer.
//!
//! Two halves:
//! - `entity`: the on-disk tree, synchronized with the filesystem
//! - `view`: the display projection with UI-owned fold state

mod entity;
mod view;

pub use entity::{DirectoryEntity, Entity, EntityId, FileEntity};
pub use view::{DirectoryView, FileView, FoldState, ViewEntry, ViewEntryKind};
