use serde::{Deserialize, Serialize};

use crate::store::{KeyedStore, ENROLLMENTS_KEY, STUDENTS_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub enrolled_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_date: Option<String>,
}

/// AND-combined filter over the roster: optional exact class match plus
/// optional case-insensitive substring search over name and roll number.
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class: Option<String>,
    pub search: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        if let Some(class) = &self.class {
            if &student.enrolled_class != class {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if needle.is_empty() {
                return true;
            }
            let name_hit = student.name.to_lowercase().contains(&needle);
            // A record missing the searched field is non-matching, not matching-everything.
            let roll_hit = student
                .roll_number
                .as_deref()
                .map(|r| r.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !name_hit && !roll_hit {
                return false;
            }
        }
        true
    }
}

/// Wholesale load in stored insertion order; entries that fail to
/// deserialize are skipped rather than failing the whole roster.
pub fn load_students(store: &dyn KeyedStore) -> Vec<Student> {
    let raw = store
        .get(STUDENTS_KEY)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    raw.into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

pub fn save_students(store: &dyn KeyedStore, students: &[Student]) -> anyhow::Result<()> {
    store.set(STUDENTS_KEY, &serde_json::to_value(students)?)
}

pub fn load_enrollments(store: &dyn KeyedStore) -> Vec<Enrollment> {
    let raw = store
        .get(ENROLLMENTS_KEY)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    raw.into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

pub fn filter_students<'a>(students: &'a [Student], filter: &StudentFilter) -> Vec<&'a Student> {
    students.iter().filter(|s| filter.matches(s)).collect()
}

/// Resolved class for fan-out: the enrollment record wins, the roster's
/// own enrolledClass is the fallback for students with no enrollment row.
pub fn resolved_class<'a>(student: &'a Student, enrollments: &'a [Enrollment]) -> &'a str {
    enrollments
        .iter()
        .find(|e| e.student_id == student.id)
        .map(|e| e.class_name.as_str())
        .unwrap_or(student.enrolled_class.as_str())
}
