//! Course manager core.
//!
//! This crate manages persistent, hierarchical collections of named
//! path-sequences ("courses") on disk and tracks which courses are
//! loaded onto which vehicle:
//! - `fs`: entity tree synchronized with the filesystem, plus the
//!   foldable display view and its flattening
//! - `assignment`: vehicle → courses registry
//! - `manager`: the orchestrating service (pagination, load/save,
//!   multiplayer sync)
//! - `bundle`: ZIP import/export of course collections
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous; every operation runs
//! to completion before control returns. The only cross-process concern
//! is the client/server split: course files exist only on the client,
//! the server holds assignment state received over the network.

pub mod assignment;
pub mod bundle;
pub mod course;
pub mod error;
pub mod fs;
pub mod manager;
pub mod sync;

use std::path::PathBuf;

use serde::Deserialize;

pub use assignment::{AssignmentRegistry, CourseAssignment, VehicleId};
pub use bundle::{export_bundle, import_bundle, BundleManifest};
pub use course::{
    Course, CourseSerializer, JsonCourseSerializer, LegacyWaypoint, Waypoint, COURSE_EXTENSION,
};
pub use error::{CourseError, CourseResult};
pub use fs::{DirectoryEntity, DirectoryView, Entity, EntityId, FoldState, ViewEntry, ViewEntryKind};
pub use manager::{CourseManager, Role};
pub use sync::{AssignmentSyncMessage, AssignmentTransport, MemoryTransport, NullTransport, PeerId};

/// Location of the course root on the client machine.
///
/// Resolves to `<user_data_root>/<namespace>/Courses/<world_id>/`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseDirs {
    pub user_data_root: PathBuf,
    pub namespace: String,
    pub world_id: String,
}

impl CourseDirs {
    pub fn course_root(&self) -> PathBuf {
        self.user_data_root
            .join(&self.namespace)
            .join("Courses")
            .join(&self.world_id)
    }

    /// Read the configuration from a JSON file.
    pub fn from_json_file(path: &std::path::Path) -> CourseResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_root_layout() {
        let dirs = CourseDirs {
            user_data_root: PathBuf::from("/home/op/.game"),
            namespace: "fieldwork".to_string(),
            world_id: "map01".to_string(),
        };
        assert_eq!(
            dirs.course_root(),
            PathBuf::from("/home/op/.game/fieldwork/Courses/map01")
        );
    }

    #[test]
    fn test_course_dirs_from_json() {
        let json = r#"{
            "user_data_root": "/data",
            "namespace": "fieldwork",
            "world_id": "map02"
        }"#;
        let dirs: CourseDirs = serde_json::from_str(json).unwrap();
        assert_eq!(dirs.course_root(), PathBuf::from("/data/fieldwork/Courses/map02"));
    }
}
