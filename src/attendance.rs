use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::roster::Student;
use crate::store::{attendance_key, KeyedStore, ATTENDANCE_HISTORY_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

pub type DayMarks = BTreeMap<String, AttendanceStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub present: usize,
    pub absent: usize,
    pub not_marked: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Write-time materialized view of a saved day. At most one record per
/// date; re-saving a day replaces its record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceHistoryRecord {
    pub date: String,
    pub timestamp: String,
    pub data: DayMarks,
    pub total_students: usize,
    pub present_count: usize,
    pub absent_count: usize,
}

/// One calendar day of attendance. Marks are volatile until `save`;
/// absence of a student's key means unmarked.
#[derive(Debug, Clone)]
pub struct DailyAttendanceLedger {
    pub date: String,
    pub marks: DayMarks,
}

/// 1-decimal rounding for the summary percentage.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn is_iso_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").is_ok()
}

impl DailyAttendanceLedger {
    pub fn load(store: &dyn KeyedStore, date: &str) -> DailyAttendanceLedger {
        let marks = store
            .get(&attendance_key(date))
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        DailyAttendanceLedger {
            date: date.to_string(),
            marks,
        }
    }

    pub fn mark(&mut self, student_id: &str, status: AttendanceStatus) {
        self.marks.insert(student_id.to_string(), status);
    }

    /// Marks every student in the caller's filtered view; students
    /// outside the view are untouched.
    pub fn mark_all_matching(&mut self, filtered: &[&Student], status: AttendanceStatus) {
        for student in filtered {
            self.marks.insert(student.id.clone(), status);
        }
    }

    pub fn reset(&mut self) {
        self.marks.clear();
    }

    pub fn summarize(&self, filtered: &[&Student]) -> DaySummary {
        summarize(filtered, &self.marks)
    }

    /// The only durable operation: persists the mapping verbatim under
    /// the date's key, then replaces the date's history record.
    pub fn save(
        &self,
        store: &dyn KeyedStore,
        roster_total: usize,
    ) -> anyhow::Result<AttendanceHistoryRecord> {
        store.set(&attendance_key(&self.date), &serde_json::to_value(&self.marks)?)?;

        let present_count = self
            .marks
            .values()
            .filter(|s| **s == AttendanceStatus::Present)
            .count();
        let absent_count = self.marks.len() - present_count;
        let record = AttendanceHistoryRecord {
            date: self.date.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data: self.marks.clone(),
            total_students: roster_total,
            present_count,
            absent_count,
        };

        let mut history = load_history(store);
        history.retain(|r| r.date != self.date);
        history.push(record.clone());
        store.set(ATTENDANCE_HISTORY_KEY, &serde_json::to_value(&history)?)?;
        Ok(record)
    }
}

pub fn summarize(filtered: &[&Student], marks: &DayMarks) -> DaySummary {
    let mut present = 0usize;
    let mut absent = 0usize;
    let mut not_marked = 0usize;
    for student in filtered {
        match marks.get(&student.id) {
            Some(AttendanceStatus::Present) => present += 1,
            Some(AttendanceStatus::Absent) => absent += 1,
            None => not_marked += 1,
        }
    }
    let total = filtered.len();
    let percentage = if total == 0 {
        0.0
    } else {
        round1(present as f64 / total as f64 * 100.0)
    };
    DaySummary {
        present,
        absent,
        not_marked,
        total,
        percentage,
    }
}

pub fn load_history(store: &dyn KeyedStore) -> Vec<AttendanceHistoryRecord> {
    store
        .get(ATTENDANCE_HISTORY_KEY)
        .and_then(|v| v.as_array().cloned())
        .map(|records| {
            records
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect()
        })
        .unwrap_or_default()
}
