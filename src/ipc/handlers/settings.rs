use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::settings::{load_settings, save_settings};
use serde_json::json;

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let settings = load_settings(store);
    ok(&req.id, json!({ "settings": settings }))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut settings = load_settings(store);

    if let Some(fees) = req.params.get("classFees").and_then(|v| v.as_object()) {
        for (class, fee) in fees {
            let Some(fee) = fee.as_f64().filter(|f| f.is_finite() && *f >= 0.0) else {
                return err(
                    &req.id,
                    "bad_params",
                    "class fees must be non-negative numbers",
                    Some(json!({ "class": class })),
                );
            };
            settings.class_fees.insert(class.clone(), fee);
        }
    }
    if let Some(default_fee) = req.params.get("defaultFee") {
        let Some(fee) = default_fee.as_f64().filter(|f| f.is_finite() && *f >= 0.0) else {
            return err(
                &req.id,
                "bad_params",
                "defaultFee must be a non-negative number",
                None,
            );
        };
        settings.default_fee = fee;
    }

    if let Err(e) = save_settings(store, &settings) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "settings": settings }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
