use crate::attendance::{
    is_iso_date, load_history, AttendanceStatus, DailyAttendanceLedger, DayMarks,
};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::store::KeyedStore;
use serde_json::json;

use super::roster::parse_filter;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_required_date(params: &serde_json::Value) -> Result<String, HandlerErr> {
    let raw = params
        .get("date")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing date"))?;
    if !is_iso_date(&raw) {
        return Err(HandlerErr::new("bad_params", "date must be YYYY-MM-DD"));
    }
    Ok(raw)
}

fn parse_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    match params.get("status").and_then(|v| v.as_str()) {
        Some("present") => Ok(AttendanceStatus::Present),
        Some("absent") => Ok(AttendanceStatus::Absent),
        Some(other) => Err(HandlerErr::new(
            "bad_params",
            format!("status must be present or absent, got {}", other),
        )),
        None => Err(HandlerErr::new("bad_params", "missing status")),
    }
}

/// The working mapping travels with the request; marks are volatile
/// until attendance.save.
fn parse_marks(params: &serde_json::Value) -> Result<DayMarks, HandlerErr> {
    match params.get("marks") {
        None => Ok(DayMarks::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| HandlerErr::new("bad_params", "marks must map studentId to present|absent")),
    }
}

fn attendance_open(
    store: &dyn KeyedStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params)?;
    let students = roster::load_students(store);
    let filter = parse_filter(params);
    let filtered = roster::filter_students(&students, &filter);

    let ledger = DailyAttendanceLedger::load(store, &date);
    let summary = ledger.summarize(&filtered);
    Ok(json!({
        "date": date,
        "students": filtered,
        "marks": ledger.marks,
        "summary": summary
    }))
}

fn attendance_mark(
    store: &dyn KeyedStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params)?;
    let student_id = params
        .get("studentId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing studentId"))?;
    let status = parse_status(params)?;

    let students = roster::load_students(store);
    let filter = parse_filter(params);

    let mut ledger = DailyAttendanceLedger {
        date,
        marks: parse_marks(params)?,
    };
    ledger.mark(&student_id, status);
    let filtered = roster::filter_students(&students, &filter);
    let summary = ledger.summarize(&filtered);
    Ok(json!({ "marks": ledger.marks, "summary": summary }))
}

fn attendance_mark_all(
    store: &dyn KeyedStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params)?;
    let status = parse_status(params)?;

    let students = roster::load_students(store);
    let filter = parse_filter(params);
    let filtered = roster::filter_students(&students, &filter);

    let mut ledger = DailyAttendanceLedger {
        date,
        marks: parse_marks(params)?,
    };
    ledger.mark_all_matching(&filtered, status);
    let summary = ledger.summarize(&filtered);
    Ok(json!({ "marks": ledger.marks, "summary": summary }))
}

fn attendance_save(
    store: &dyn KeyedStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params)?;
    let students = roster::load_students(store);
    let ledger = DailyAttendanceLedger {
        date,
        marks: parse_marks(params)?,
    };

    let record = ledger
        .save(store, students.len())
        .map_err(|e| HandlerErr::new("store_write_failed", e.to_string()))?;
    let all: Vec<&roster::Student> = students.iter().collect();
    let summary = ledger.summarize(&all);
    Ok(json!({ "saved": true, "record": record, "summary": summary }))
}

fn attendance_history(
    store: &dyn KeyedStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut history = load_history(store);
    if let Some(date) = params.get("date").and_then(|v| v.as_str()) {
        history.retain(|r| r.date == date);
    }
    Ok(json!({ "history": history }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&dyn KeyedStore, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.open" => Some(dispatch(state, req, attendance_open)),
        "attendance.mark" => Some(dispatch(state, req, attendance_mark)),
        "attendance.markAll" => Some(dispatch(state, req, attendance_mark_all)),
        "attendance.save" => Some(dispatch(state, req, attendance_save)),
        "attendance.history" => Some(dispatch(state, req, attendance_history)),
        _ => None,
    }
}
