use crate::fees;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::settings::load_settings;
use serde_json::json;

use super::roster::parse_filter;

fn handle_fees_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let students = roster::load_students(store);
    let filter = parse_filter(&req.params);
    let filtered = roster::filter_students(&students, &filter);
    let settings = load_settings(store);

    let rows = fees::load_rows(store, &filtered, &settings);
    let summary = fees::summary_stats(&rows);
    ok(&req.id, json!({ "rows": rows, "summary": summary }))
}

fn handle_fees_record_payment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let method = match req.params.get("method").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing method", None),
    };
    // A missing or non-numeric amount is the same failure as a
    // non-positive one: rejected before any mutation.
    let amount = match req.params.get("amount").and_then(|v| v.as_f64()) {
        Some(v) => v,
        None => {
            return err(
                &req.id,
                "invalid_amount",
                "payment amount must be a positive number",
                None,
            )
        }
    };
    let transaction_id = req
        .params
        .get("transactionId")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let notes = req
        .params
        .get("notes")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let students = roster::load_students(store);
    let Some(student) = students.iter().find(|s| s.id == student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };
    let settings = load_settings(store);

    match fees::record_payment(
        store,
        student,
        &settings,
        amount,
        &method,
        transaction_id,
        notes,
    ) {
        Ok((payment, entry)) => {
            let status = fees::status(&entry);
            ok(
                &req.id,
                json!({ "payment": payment, "entry": entry, "status": status }),
            )
        }
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.open" => Some(handle_fees_open(state, req)),
        "fees.recordPayment" => Some(handle_fees_record_payment(state, req)),
        _ => None,
    }
}
