use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::notifications::{self, Draft, ListFilter, RecipientType};
use crate::roster;
use serde_json::json;

fn parse_draft(params: &serde_json::Value) -> Result<Draft, serde_json::Value> {
    let title = params
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let message = params
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    match params.get("type").and_then(|v| v.as_str()) {
        Some("individual") => Ok(Draft::Individual {
            student_id: params
                .get("studentId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            title,
            message,
        }),
        Some("bulk") => {
            let recipient_type = match params.get("recipientType").and_then(|v| v.as_str()) {
                Some("all") => RecipientType::All,
                Some("class") => RecipientType::Class,
                _ => return Err(json!("recipientType must be all or class")),
            };
            Ok(Draft::Bulk {
                recipient_type,
                class_name: params
                    .get("className")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string()),
                title,
                message,
            })
        }
        _ => Err(json!("type must be individual or bulk")),
    }
}

fn handle_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let draft = match parse_draft(&req.params) {
        Ok(d) => d,
        Err(detail) => {
            return err(
                &req.id,
                "bad_params",
                detail.as_str().unwrap_or("bad notification draft"),
                None,
            )
        }
    };

    let students = roster::load_students(store);
    let enrollments = roster::load_enrollments(store);
    match notifications::send(store, &students, &enrollments, draft) {
        Ok(notification) => ok(&req.id, json!({ "notification": notification })),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let filter = match req.params.get("filter").and_then(|v| v.as_str()) {
        None | Some("all") => ListFilter::All,
        Some("individual") => ListFilter::Individual,
        Some("bulk") => ListFilter::Bulk,
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                "filter must be one of: all, individual, bulk",
                Some(json!({ "filter": other })),
            )
        }
    };
    let notifications = notifications::list(store, filter);
    ok(&req.id, json!({ "notifications": notifications }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = req.params.get("id").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    match notifications::delete(store, id) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.send" => Some(handle_send(state, req)),
        "notifications.list" => Some(handle_list(state, req)),
        "notifications.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
