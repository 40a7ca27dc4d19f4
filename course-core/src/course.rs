//! Course documents and the serializer seam.
//!
//! A course is opaque to this crate beyond its name, waypoint count and
//! fieldwork flag. The on-disk byte format is owned by a [`CourseSerializer`]
//! implementation; [`JsonCourseSerializer`] is the default.

use serde::{Deserialize, Serialize};

use crate::error::CourseResult;

/// File extension used for serialized course documents.
pub const COURSE_EXTENSION: &str = "course";

/// One point along a course path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// An ordered sequence of waypoints defining a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    /// In-field work course (vs. transport/headland).
    #[serde(default)]
    pub fieldwork: bool,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl Course {
    /// Create an empty course with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fieldwork: false,
            waypoints: Vec::new(),
        }
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }
}

/// One waypoint in the flat, globally numbered legacy projection.
///
/// Sequence numbers are 1-based and contiguous across all of a vehicle's
/// concatenated courses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyWaypoint {
    pub position: Waypoint,
    pub sequence_number: usize,
}

/// Owner of the on-disk course document format.
pub trait CourseSerializer {
    /// Serialize a course to its document bytes.
    fn serialize(&self, course: &Course) -> CourseResult<Vec<u8>>;

    /// Deserialize a course from document bytes.
    fn deserialize(&self, bytes: &[u8]) -> CourseResult<Course>;
}

/// Default JSON course document format.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCourseSerializer;

impl CourseSerializer for JsonCourseSerializer {
    fn serialize(&self, course: &Course) -> CourseResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(course)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> CourseResult<Course> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
