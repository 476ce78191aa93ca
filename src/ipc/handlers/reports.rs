use crate::attendance::{is_iso_date, DailyAttendanceLedger};
use crate::export::{attendance_csv_filename, build_attendance_csv};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;
use std::path::PathBuf;

use super::roster::parse_filter;

fn handle_attendance_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let date = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(v) if is_iso_date(v) => v.trim().to_string(),
        Some(_) => return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None),
        None => return err(&req.id, "bad_params", "missing date", None),
    };

    let students = roster::load_students(store);
    let filter = parse_filter(&req.params);
    let filtered = roster::filter_students(&students, &filter);
    let ledger = DailyAttendanceLedger::load(store, &date);
    let csv = build_attendance_csv(&filtered, &ledger.marks);
    let filename = attendance_csv_filename(&date);

    let out = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => {
            let Some(workspace) = state.workspace.as_ref() else {
                return err(&req.id, "no_workspace", "select a workspace first", None);
            };
            workspace.join(&filename)
        }
    };

    if let Some(parent) = out.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out.to_string_lossy() })),
            );
        }
    }
    if let Err(e) = std::fs::write(&out, csv) {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out.to_string_lossy() })),
        );
    }

    ok(
        &req.id,
        json!({
            "ok": true,
            "rowsExported": filtered.len(),
            "filename": filename,
            "path": out.to_string_lossy()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.attendanceCsv" => Some(handle_attendance_csv(state, req)),
        _ => None,
    }
}
