//! Vehicle → courses assignment registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::course::{Course, LegacyWaypoint};

/// Opaque identity of a runtime vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The courses currently loaded onto one vehicle.
///
/// `courses` is append-only and keeps the HUD load order.
#[derive(Debug, Clone)]
pub struct CourseAssignment {
    vehicle: VehicleId,
    courses: Vec<Course>,
    is_saved: bool,
}

impl CourseAssignment {
    pub fn vehicle(&self) -> &VehicleId {
        &self.vehicle
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn is_saved(&self) -> bool {
        self.is_saved
    }
}

/// All current assignments, at most one per vehicle.
///
/// Every query treats "no assignment" as a normal state and returns an
/// empty or absent result, never an error.
#[derive(Debug, Default)]
pub struct AssignmentRegistry {
    assignments: Vec<CourseAssignment>,
}

impl AssignmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `course` to the vehicle's assignment, creating the
    /// assignment on first load. Never replaces existing courses.
    pub fn assign(&mut self, vehicle: &VehicleId, course: Course) {
        match self.get_mut(vehicle) {
            Some(assignment) => {
                assignment.courses.push(course);
                assignment.is_saved = true;
            }
            None => self.assignments.push(CourseAssignment {
                vehicle: vehicle.clone(),
                courses: vec![course],
                is_saved: true,
            }),
        }
    }

    /// Remove the vehicle's assignment entirely. Returns whether one
    /// existed.
    pub fn unload_all(&mut self, vehicle: &VehicleId) -> bool {
        let before = self.assignments.len();
        self.assignments.retain(|a| &a.vehicle != vehicle);
        self.assignments.len() != before
    }

    pub fn get(&self, vehicle: &VehicleId) -> Option<&CourseAssignment> {
        self.assignments.iter().find(|a| &a.vehicle == vehicle)
    }

    fn get_mut(&mut self, vehicle: &VehicleId) -> Option<&mut CourseAssignment> {
        self.assignments.iter_mut().find(|a| &a.vehicle == vehicle)
    }

    /// Position of the vehicle's assignment in the registry list.
    pub fn slot_index(&self, vehicle: &VehicleId) -> Option<usize> {
        self.assignments.iter().position(|a| &a.vehicle == vehicle)
    }

    /// True iff an assignment exists with at least one course, regardless
    /// of its saved flag. This is the single contract for every caller.
    pub fn has_course(&self, vehicle: &VehicleId) -> bool {
        self.get(vehicle).is_some_and(|a| !a.courses.is_empty())
    }

    pub fn is_saved(&self, vehicle: &VehicleId) -> Option<bool> {
        self.get(vehicle).map(|a| a.is_saved)
    }

    pub fn set_saved(&mut self, vehicle: &VehicleId, saved: bool) {
        if let Some(assignment) = self.get_mut(vehicle) {
            assignment.is_saved = saved;
        }
    }

    /// Rename the vehicle's first loaded course, keeping the in-memory
    /// name consistent with an on-disk artifact after a save-as.
    pub fn rename_first_course(&mut self, vehicle: &VehicleId, name: &str) -> bool {
        match self.get_mut(vehicle) {
            Some(assignment) => match assignment.courses.first_mut() {
                Some(course) => {
                    course.name = name.to_string();
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleId> {
        self.assignments.iter().map(|a| &a.vehicle)
    }

    /// Concatenate the vehicle's courses, in load order, into one
    /// synthetic course.
    ///
    /// With `exclude_fieldwork`, courses flagged as fieldwork do not
    /// contribute. The combined name is the first contributor's name,
    /// suffixed with `" + N"` (N = contributors - 1) when more than one
    /// course contributed. `None` when nothing contributes.
    pub fn combined_course(&self, vehicle: &VehicleId, exclude_fieldwork: bool) -> Option<Course> {
        let assignment = self.get(vehicle)?;
        let contributors: Vec<&Course> = assignment
            .courses
            .iter()
            .filter(|c| !(exclude_fieldwork && c.fieldwork))
            .collect();
        let first = contributors.first()?;

        let name = if contributors.len() > 1 {
            format!("{} + {}", first.name, contributors.len() - 1)
        } else {
            first.name.clone()
        };

        let mut combined = Course::new(name);
        combined.fieldwork = first.fieldwork;
        for course in &contributors {
            combined.waypoints.extend_from_slice(&course.waypoints);
        }
        Some(combined)
    }

    /// First assigned course flagged as fieldwork, if any.
    pub fn fieldwork_course(&self, vehicle: &VehicleId) -> Option<&Course> {
        self.get(vehicle)?.courses.iter().find(|c| c.fieldwork)
    }

    /// Build the flat legacy projection for a vehicle: every waypoint of
    /// every assigned course, numbered 1-based and contiguously.
    pub fn legacy_waypoints(&self, vehicle: &VehicleId) -> Vec<LegacyWaypoint> {
        let Some(assignment) = self.get(vehicle) else {
            return Vec::new();
        };
        assignment
            .courses
            .iter()
            .flat_map(|c| c.waypoints.iter())
            .enumerate()
            .map(|(i, wp)| LegacyWaypoint {
                position: *wp,
                sequence_number: i + 1,
            })
            .collect()
    }
}
