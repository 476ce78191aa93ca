use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, Student, StudentFilter};
use crate::store::KeyedStore;
use serde_json::json;
use uuid::Uuid;

fn store_ref<'a>(state: &'a AppState, req: &Request) -> Result<&'a dyn KeyedStore, serde_json::Value> {
    state
        .store
        .as_deref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The front end's class selector sends "all" for the unfiltered view.
pub fn parse_filter(params: &serde_json::Value) -> StudentFilter {
    let class = optional_str(params, "class").filter(|c| c != "all");
    let search = optional_str(params, "search");
    StudentFilter { class, search }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let students = roster::load_students(store);
    let filter = parse_filter(&req.params);
    let filtered = roster::filter_students(&students, &filter);
    ok(
        &req.id,
        json!({
            "students": filtered,
            "totalCount": students.len(),
            "filteredCount": filtered.len()
        }),
    )
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let enrolled_class = match required_str(req, "enrolledClass") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = match store_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let student = Student {
        id: Uuid::new_v4().to_string(),
        name,
        roll_number: optional_str(&req.params, "rollNumber"),
        enrolled_class,
        phone: optional_str(&req.params, "phone"),
        join_date: optional_str(&req.params, "joinDate"),
    };

    let mut students = roster::load_students(store);
    students.push(student.clone());
    if let Err(e) = roster::save_students(store, &students) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "student": student }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()).cloned() else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let store = match store_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let mut students = roster::load_students(store);
    let Some(student) = students.iter_mut().find(|s| s.id == student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    if let Some(name) = patch.get("name").and_then(|v| v.as_str()) {
        student.name = name.trim().to_string();
    }
    if let Some(class) = patch.get("enrolledClass").and_then(|v| v.as_str()) {
        student.enrolled_class = class.trim().to_string();
    }
    if patch.contains_key("rollNumber") {
        student.roll_number = patch
            .get("rollNumber")
            .and_then(|v| v.as_str())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    if patch.contains_key("phone") {
        student.phone = patch
            .get("phone")
            .and_then(|v| v.as_str())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    if patch.contains_key("joinDate") {
        student.join_date = patch
            .get("joinDate")
            .and_then(|v| v.as_str())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    let updated = student.clone();

    if let Err(e) = roster::save_students(store, &students) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "student": updated }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = match store_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let mut students = roster::load_students(store);
    let before = students.len();
    students.retain(|s| s.id != student_id);
    let removed = students.len() != before;
    if removed {
        if let Err(e) = roster::save_students(store, &students) {
            return err(&req.id, "store_write_failed", e.to_string(), None);
        }
    }
    ok(&req.id, json!({ "removed": removed }))
}

fn handle_enrollments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let enrollments = roster::load_enrollments(store);
    ok(&req.id, json!({ "enrollments": enrollments }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "enrollments.list" => Some(handle_enrollments_list(state, req)),
        _ => None,
    }
}
