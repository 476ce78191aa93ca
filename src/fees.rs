use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::roster::Student;
use crate::settings::AdminSettings;
use crate::store::{KeyedStore, STUDENT_FEES_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    pub total_fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Immutable once created; appended to a student's payment list and
/// never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub amount: f64,
    pub date: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEntry {
    pub fee_structure: FeeStructure,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

pub type FeeMap = BTreeMap<String, FeeEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Paid,
    Partial,
    Pending,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRow {
    pub student: Student,
    #[serde(flatten)]
    pub entry: FeeEntry,
    pub status: FeeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub total_collection: f64,
    pub total_pending: f64,
    pub paid_count: usize,
    pub partial_count: usize,
    pub pending_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeError {
    pub code: String,
    pub message: String,
}

impl FeeError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_amount(raw: &str) -> Self {
        FeeError::new(
            "invalid_amount",
            format!("payment amount must be a positive number, got {}", raw),
        )
    }
}

/// Status is a pure function of the structure: paid once the running
/// total reaches totalFee, partial while anything is paid, else pending.
pub fn status(entry: &FeeEntry) -> FeeStatus {
    if entry.paid_amount >= entry.fee_structure.total_fee {
        FeeStatus::Paid
    } else if entry.paid_amount > 0.0 {
        FeeStatus::Partial
    } else {
        FeeStatus::Pending
    }
}

pub fn load_fee_map(store: &dyn KeyedStore) -> FeeMap {
    store
        .get(STUDENT_FEES_KEY)
        .and_then(|v| v.as_object().cloned())
        .map(|obj| {
            obj.into_iter()
                .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|e| (k, e)))
                .collect()
        })
        .unwrap_or_default()
}

fn default_entry(student: &Student, settings: &AdminSettings) -> FeeEntry {
    FeeEntry {
        fee_structure: FeeStructure {
            total_fee: settings.fee_for_class(&student.enrolled_class),
            due_date: None,
        },
        paid_amount: 0.0,
        payments: Vec::new(),
    }
}

/// Merge the roster with the persisted fee map; a student with no
/// persisted entry gets the class-derived default totalFee and zero paid.
pub fn load_rows(
    store: &dyn KeyedStore,
    students: &[&Student],
    settings: &AdminSettings,
) -> Vec<FeeRow> {
    let fee_map = load_fee_map(store);
    students
        .iter()
        .map(|student| {
            let entry = fee_map
                .get(&student.id)
                .cloned()
                .unwrap_or_else(|| default_entry(student, settings));
            let status = status(&entry);
            FeeRow {
                student: (*student).clone(),
                entry,
                status,
            }
        })
        .collect()
}

/// Appends a payment and persists the full fee map in one write.
/// Rejects non-positive and non-finite amounts before any mutation;
/// overpayment is permitted (paidAmount may exceed totalFee).
pub fn record_payment(
    store: &dyn KeyedStore,
    student: &Student,
    settings: &AdminSettings,
    amount: f64,
    method: &str,
    transaction_id: Option<String>,
    notes: Option<String>,
) -> Result<(Payment, FeeEntry), FeeError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(FeeError::invalid_amount(&amount.to_string()));
    }

    let mut fee_map = load_fee_map(store);
    let entry = fee_map
        .entry(student.id.clone())
        .or_insert_with(|| default_entry(student, settings));

    let now = chrono::Utc::now();
    let payment = Payment {
        id: now.timestamp_millis(),
        amount,
        date: now.format("%Y-%m-%d").to_string(),
        method: method.to_string(),
        transaction_id,
        notes,
    };
    entry.payments.push(payment.clone());
    entry.paid_amount += amount;
    let updated = entry.clone();

    let value = serde_json::to_value(&fee_map)
        .map_err(|e| FeeError::new("store_write_failed", e.to_string()))?;
    store
        .set(STUDENT_FEES_KEY, &value)
        .map_err(|e| FeeError::new("store_write_failed", e.to_string()))?;

    Ok((payment, updated))
}

pub fn summary_stats(rows: &[FeeRow]) -> FeeSummary {
    let mut summary = FeeSummary {
        total_collection: 0.0,
        total_pending: 0.0,
        paid_count: 0,
        partial_count: 0,
        pending_count: 0,
    };
    for row in rows {
        summary.total_collection += row.entry.paid_amount;
        // Never negative, even when overpaid.
        summary.total_pending +=
            (row.entry.fee_structure.total_fee - row.entry.paid_amount).max(0.0);
        match row.status {
            FeeStatus::Paid => summary.paid_count += 1,
            FeeStatus::Partial => summary.partial_count += 1,
            FeeStatus::Pending => summary.pending_count += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn student(id: &str, class: &str) -> Student {
        Student {
            id: id.to_string(),
            name: "Test Student".to_string(),
            roll_number: None,
            enrolled_class: class.to_string(),
            phone: None,
            join_date: None,
        }
    }

    fn entry(total: f64, paid: f64) -> FeeEntry {
        FeeEntry {
            fee_structure: FeeStructure {
                total_fee: total,
                due_date: None,
            },
            paid_amount: paid,
            payments: Vec::new(),
        }
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(status(&entry(1000.0, 0.0)), FeeStatus::Pending);
        assert_eq!(status(&entry(1000.0, 400.0)), FeeStatus::Partial);
        assert_eq!(status(&entry(1000.0, 1000.0)), FeeStatus::Paid);
        assert_eq!(status(&entry(1000.0, 1200.0)), FeeStatus::Paid);
    }

    #[test]
    fn payments_accumulate_and_derive_status() {
        let store = MemoryStore::new();
        let settings = AdminSettings::default();
        let s = student("s1", "Watercolor"); // default 3000

        let (_, e1) = record_payment(&store, &s, &settings, 400.0, "cash", None, None)
            .expect("first payment");
        assert_eq!(e1.paid_amount, 400.0);
        assert_eq!(status(&e1), FeeStatus::Partial);

        let (_, e2) = record_payment(&store, &s, &settings, 2600.0, "cash", None, None)
            .expect("second payment");
        assert_eq!(e2.paid_amount, 3000.0);
        assert_eq!(e2.payments.len(), 2);
        assert_eq!(status(&e2), FeeStatus::Paid);
    }

    #[test]
    fn invalid_amounts_leave_state_untouched() {
        let store = MemoryStore::new();
        let settings = AdminSettings::default();
        let s = student("s1", "Watercolor");

        for bad in [0.0, -25.0, f64::NAN, f64::INFINITY] {
            let err = record_payment(&store, &s, &settings, bad, "cash", None, None)
                .expect_err("rejected");
            assert_eq!(err.code, "invalid_amount");
        }
        assert!(load_fee_map(&store).is_empty());
    }

    #[test]
    fn overpayment_is_representable_but_pending_never_negative() {
        let store = MemoryStore::new();
        let settings = AdminSettings::default();
        let s = student("s1", "Sketching"); // 2500

        let (_, e) = record_payment(&store, &s, &settings, 4000.0, "card", None, None)
            .expect("overpayment");
        assert_eq!(e.paid_amount, 4000.0);

        let roster = [&s];
        let rows = load_rows(&store, &roster, &settings);
        let summary = summary_stats(&rows);
        assert_eq!(summary.total_collection, 4000.0);
        assert_eq!(summary.total_pending, 0.0);
        assert_eq!(summary.paid_count, 1);
    }

    #[test]
    fn feeless_student_gets_class_default() {
        let store = MemoryStore::new();
        let settings = AdminSettings::default();
        let s = student("s1", "Sculpture");
        let roster = [&s];
        let rows = load_rows(&store, &roster, &settings);
        assert_eq!(rows[0].entry.fee_structure.total_fee, 4500.0);
        assert_eq!(rows[0].entry.paid_amount, 0.0);
        assert_eq!(rows[0].status, FeeStatus::Pending);
    }
}
