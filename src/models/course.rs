use serde::{Deserialize, Serialize};

use super::user::InstructorSnapshot;
use super::OneOrMany;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseFile {
    pub file_name: String,
    pub file_reference: String,
}

/// Course record as stored in the "courses" table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub course_description: String,
    pub course_price: f64,

    /// Instructor user IDs. Source of truth for ownership and for the instructor index.
    pub course_instructor_ids: Vec<String>,

    /// Embedded instructor snapshots, same order as `course_instructor_ids`.
    #[serde(default)]
    pub course_instructor: Vec<InstructorSnapshot>,

    #[serde(default)]
    pub course_image: Option<String>,
    #[serde(default)]
    pub course_videos: Vec<String>,
    #[serde(default)]
    pub course_lessons: Vec<Lesson>,
    #[serde(default)]
    pub course_files: Vec<CourseFile>,
    #[serde(default)]
    pub course_published: bool,

    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Course {
    pub fn is_instructed_by(&self, user_id: &str) -> bool {
        self.course_instructor_ids.iter().any(|id| id == user_id)
    }

    /// Rebuilds the embedded instructor list so it follows `course_instructor_ids`,
    /// swapping in `fresh` for its owner and keeping the other entries as they are.
    pub fn with_instructor_snapshot(&self, fresh: &InstructorSnapshot) -> Vec<InstructorSnapshot> {
        self.course_instructor_ids
            .iter()
            .filter_map(|id| {
                if *id == fresh.user_id {
                    Some(fresh.clone())
                } else {
                    self.course_instructor
                        .iter()
                        .find(|snapshot| snapshot.user_id == *id)
                        .cloned()
                }
            })
            .collect()
    }
}

/// Course summary embedded in an instructor's `user_uploaded_courses`.
///
/// Carries no instructor block on purpose: an instructor edit would otherwise
/// leave a nested stale copy inside every one of these entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseSnapshot {
    pub course_id: String,
    pub course_name: String,
    pub course_description: String,
    pub course_price: f64,
    #[serde(default)]
    pub course_image: Option<String>,
    #[serde(default)]
    pub course_published: bool,
}

impl From<&Course> for CourseSnapshot {
    fn from(course: &Course) -> Self {
        CourseSnapshot {
            course_id: course.course_id.clone(),
            course_name: course.course_name.clone(),
            course_description: course.course_description.clone(),
            course_price: course.course_price,
            course_image: course.course_image.clone(),
            course_published: course.course_published,
        }
    }
}

/// Replaces the entry with the same `course_id` in place, or appends it.
///
/// Duplicate entries left behind by racing writers are collapsed.
pub fn upsert_course_snapshot(list: &[CourseSnapshot], snapshot: CourseSnapshot) -> Vec<CourseSnapshot> {
    let mut merged: Vec<CourseSnapshot> = Vec::with_capacity(list.len() + 1);
    let mut placed = false;

    for entry in list {
        if entry.course_id == snapshot.course_id {
            if !placed {
                merged.push(snapshot.clone());
                placed = true;
            }
        } else if !merged.iter().any(|kept| kept.course_id == entry.course_id) {
            merged.push(entry.clone());
        }
    }

    if !placed {
        merged.push(snapshot);
    }

    merged
}

pub fn remove_course_snapshot(list: &[CourseSnapshot], course_id: &str) -> Vec<CourseSnapshot> {
    list.iter()
        .filter(|entry| entry.course_id != course_id)
        .cloned()
        .collect()
}

/// Body for course creation. Create-mode validation decides which fields are required.
#[derive(Debug, Deserialize, Default)]
pub struct CreateCourseRequest {
    pub course_name: Option<String>,
    pub course_description: Option<String>,
    pub course_price: Option<f64>,
    pub course_instructor: Option<OneOrMany<String>>,
    pub course_image: Option<String>,
    pub course_videos: Option<Vec<String>>,
    pub course_lessons: Option<Vec<Lesson>>,
    pub course_files: Option<Vec<CourseFile>>,
    pub course_published: Option<bool>,
}

/// Sparse course update: omitted fields keep their stored value.
pub type UpdateCourseRequest = CreateCourseRequest;
