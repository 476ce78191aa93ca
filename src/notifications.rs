use serde::{Deserialize, Serialize};

use crate::roster::{resolved_class, Enrollment, Student};
use crate::store::{KeyedStore, NOTIFICATIONS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Individual,
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    All,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_type: Option<RecipientType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum Draft {
    Individual {
        student_id: String,
        title: String,
        message: String,
    },
    Bulk {
        recipient_type: RecipientType,
        class_name: Option<String>,
        title: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Individual,
    Bulk,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationError {
    pub code: String,
    pub message: String,
}

impl NotificationError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Fan-out: resolve the abstract audience against the roster.
/// Class matching is exact and case-sensitive; an empty resolution is
/// an error surfaced to the caller, never persisted.
pub fn resolve_recipients(
    students: &[Student],
    enrollments: &[Enrollment],
    recipient_type: RecipientType,
    class_name: Option<&str>,
) -> Result<Vec<Recipient>, NotificationError> {
    let recipients: Vec<Recipient> = match recipient_type {
        RecipientType::All => students
            .iter()
            .map(|s| Recipient {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect(),
        RecipientType::Class => {
            let Some(class) = class_name else {
                return Err(NotificationError::new(
                    "bad_params",
                    "className is required for class notifications",
                ));
            };
            students
                .iter()
                .filter(|s| resolved_class(s, enrollments) == class)
                .map(|s| Recipient {
                    id: s.id.clone(),
                    name: s.name.clone(),
                })
                .collect()
        }
    };
    if recipients.is_empty() {
        return Err(NotificationError::new(
            "no_recipients",
            "notification resolves to an empty audience",
        ));
    }
    Ok(recipients)
}

pub fn load_log(store: &dyn KeyedStore) -> Vec<Notification> {
    store
        .get(NOTIFICATIONS_KEY)
        .and_then(|v| v.as_array().cloned())
        .map(|records| {
            records
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn save_log(store: &dyn KeyedStore, log: &[Notification]) -> Result<(), NotificationError> {
    let value = serde_json::to_value(log)
        .map_err(|e| NotificationError::new("store_write_failed", e.to_string()))?;
    store
        .set(NOTIFICATIONS_KEY, &value)
        .map_err(|e| NotificationError::new("store_write_failed", e.to_string()))
}

fn require_non_empty(value: &str, field: &str) -> Result<String, NotificationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NotificationError::new(
            "bad_params",
            format!("{} must not be empty", field),
        ));
    }
    Ok(trimmed.to_string())
}

/// Ids are creation-ordered: clock milliseconds, bumped past the head
/// of the log if the clock has not advanced since the last send.
fn next_id(log: &[Notification]) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    match log.first() {
        Some(head) if head.id >= now => head.id + 1,
        _ => now,
    }
}

/// Validates the draft, resolves its audience, and prepends the record;
/// the log reads most-recent-first.
pub fn send(
    store: &dyn KeyedStore,
    students: &[Student],
    enrollments: &[Enrollment],
    draft: Draft,
) -> Result<Notification, NotificationError> {
    let mut log = load_log(store);
    let id = next_id(&log);
    let timestamp = chrono::Utc::now().to_rfc3339();

    let notification = match draft {
        Draft::Individual {
            student_id,
            title,
            message,
        } => {
            let student_id = require_non_empty(&student_id, "studentId")?;
            let title = require_non_empty(&title, "title")?;
            let message = require_non_empty(&message, "message")?;
            let student = students
                .iter()
                .find(|s| s.id == student_id)
                .ok_or_else(|| NotificationError::new("not_found", "student not found"))?;
            Notification {
                id,
                kind: NotificationKind::Individual,
                title,
                message,
                timestamp,
                recipient_id: Some(student.id.clone()),
                recipient_name: Some(student.name.clone()),
                recipient_type: None,
                class_name: None,
                recipients: Vec::new(),
                recipient_count: None,
            }
        }
        Draft::Bulk {
            recipient_type,
            class_name,
            title,
            message,
        } => {
            let title = require_non_empty(&title, "title")?;
            let message = require_non_empty(&message, "message")?;
            let recipients =
                resolve_recipients(students, enrollments, recipient_type, class_name.as_deref())?;
            let recipient_count = recipients.len();
            Notification {
                id,
                kind: NotificationKind::Bulk,
                title,
                message,
                timestamp,
                recipient_id: None,
                recipient_name: None,
                recipient_type: Some(recipient_type),
                class_name,
                recipients,
                recipient_count: Some(recipient_count),
            }
        }
    };

    log.insert(0, notification.clone());
    save_log(store, &log)?;
    Ok(notification)
}

/// Hard remove by id; a second delete of the same id is a no-op.
pub fn delete(store: &dyn KeyedStore, id: i64) -> Result<bool, NotificationError> {
    let mut log = load_log(store);
    let before = log.len();
    log.retain(|n| n.id != id);
    if log.len() == before {
        return Ok(false);
    }
    save_log(store, &log)?;
    Ok(true)
}

pub fn list(store: &dyn KeyedStore, filter: ListFilter) -> Vec<Notification> {
    load_log(store)
        .into_iter()
        .filter(|n| match filter {
            ListFilter::All => true,
            ListFilter::Individual => n.kind == NotificationKind::Individual,
            ListFilter::Bulk => n.kind == NotificationKind::Bulk,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn student(id: &str, name: &str, class: &str) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            roll_number: None,
            enrolled_class: class.to_string(),
            phone: None,
            join_date: None,
        }
    }

    fn roster() -> Vec<Student> {
        vec![
            student("1", "Amara", "Pottery"),
            student("2", "Liam", "Pottery"),
            student("3", "Zia", "Sketching"),
        ]
    }

    #[test]
    fn bulk_all_fans_out_to_whole_roster_and_lands_at_head() {
        let store = MemoryStore::new();
        let students = roster();
        let sent = send(
            &store,
            &students,
            &[],
            Draft::Bulk {
                recipient_type: RecipientType::All,
                class_name: None,
                title: "Exhibition".to_string(),
                message: "Opens Friday".to_string(),
            },
        )
        .expect("send bulk");
        assert_eq!(sent.recipient_count, Some(3));

        let bulk = list(&store, ListFilter::Bulk);
        assert_eq!(bulk.first().map(|n| n.id), Some(sent.id));
    }

    #[test]
    fn class_match_is_exact_and_case_sensitive() {
        let students = roster();
        let hits = resolve_recipients(&students, &[], RecipientType::Class, Some("Sketching"))
            .expect("resolve");
        assert_eq!(hits, vec![Recipient { id: "3".to_string(), name: "Zia".to_string() }]);

        let err = resolve_recipients(&students, &[], RecipientType::Class, Some("sketching"))
            .expect_err("case mismatch");
        assert_eq!(err.code, "no_recipients");
    }

    #[test]
    fn empty_audience_is_rejected_and_never_persisted() {
        let store = MemoryStore::new();
        let err = send(
            &store,
            &[],
            &[],
            Draft::Bulk {
                recipient_type: RecipientType::All,
                class_name: None,
                title: "t".to_string(),
                message: "m".to_string(),
            },
        )
        .expect_err("no audience");
        assert_eq!(err.code, "no_recipients");
        assert!(list(&store, ListFilter::All).is_empty());
    }

    #[test]
    fn blank_title_is_rejected() {
        let store = MemoryStore::new();
        let students = roster();
        let err = send(
            &store,
            &students,
            &[],
            Draft::Individual {
                student_id: "1".to_string(),
                title: "   ".to_string(),
                message: "hello".to_string(),
            },
        )
        .expect_err("blank title");
        assert_eq!(err.code, "bad_params");
    }

    #[test]
    fn log_reads_most_recent_first_with_increasing_ids() {
        let store = MemoryStore::new();
        let students = roster();
        let first = send(
            &store,
            &students,
            &[],
            Draft::Individual {
                student_id: "1".to_string(),
                title: "a".to_string(),
                message: "m".to_string(),
            },
        )
        .expect("first");
        let second = send(
            &store,
            &students,
            &[],
            Draft::Individual {
                student_id: "2".to_string(),
                title: "b".to_string(),
                message: "m".to_string(),
            },
        )
        .expect("second");
        assert!(second.id > first.id);

        let log = list(&store, ListFilter::All);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, second.id);
        assert_eq!(log[1].id, first.id);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let students = roster();
        let sent = send(
            &store,
            &students,
            &[],
            Draft::Individual {
                student_id: "1".to_string(),
                title: "a".to_string(),
                message: "m".to_string(),
            },
        )
        .expect("send");

        assert!(delete(&store, sent.id).expect("first delete"));
        let after_first = list(&store, ListFilter::All).len();
        assert!(!delete(&store, sent.id).expect("second delete"));
        assert_eq!(list(&store, ListFilter::All).len(), after_first);
    }

    #[test]
    fn enrollment_row_overrides_roster_class_for_fanout() {
        let students = vec![student("1", "Amara", "Pottery")];
        let enrollments = vec![Enrollment {
            student_id: "1".to_string(),
            student_name: "Amara".to_string(),
            class_name: "Oil Painting".to_string(),
            status: "active".to_string(),
            enrollment_date: None,
        }];
        let hits =
            resolve_recipients(&students, &enrollments, RecipientType::Class, Some("Oil Painting"))
                .expect("resolve via enrollment");
        assert_eq!(hits.len(), 1);

        let err = resolve_recipients(&students, &enrollments, RecipientType::Class, Some("Pottery"))
            .expect_err("roster class shadowed by enrollment");
        assert_eq!(err.code, "no_recipients");
    }
}
