use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_atelierd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn atelierd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn setup_roster(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &PathBuf) {
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (i, (name, class)) in [
        ("Amara", "Pottery"),
        ("Liam", "Pottery"),
        ("Zia", "Sketching"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            stdin,
            reader,
            &format!("r{}", i),
            "students.create",
            json!({ "name": name, "enrolledClass": class }),
        );
    }
}

#[test]
fn bulk_all_reaches_whole_roster_and_heads_the_bulk_list() {
    let workspace = temp_dir("atelier-notify-all");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_roster(&mut stdin, &mut reader, &workspace);

    let sent = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "notifications.send",
        json!({
            "type": "bulk",
            "recipientType": "all",
            "title": "Exhibition night",
            "message": "Student gallery opens Friday at 6pm."
        }),
    );
    assert_eq!(sent["notification"]["recipientCount"], 3);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "notifications.list",
        json!({ "filter": "bulk" }),
    );
    let head = &listed["notifications"][0];
    assert_eq!(head["id"], sent["notification"]["id"]);
    assert_eq!(head["recipients"].as_array().expect("recipients").len(), 3);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn class_fanout_matches_exactly_and_empty_audience_is_rejected() {
    let workspace = temp_dir("atelier-notify-class");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_roster(&mut stdin, &mut reader, &workspace);

    let sent = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "notifications.send",
        json!({
            "type": "bulk",
            "recipientType": "class",
            "className": "Sketching",
            "title": "Charcoal supplies",
            "message": "Bring your own charcoal next week."
        }),
    );
    assert_eq!(sent["notification"]["recipientCount"], 1);
    assert_eq!(sent["notification"]["recipients"][0]["name"], "Zia");

    // Case mismatch resolves to nobody and nothing is persisted.
    let rejected = request(
        &mut stdin,
        &mut reader,
        "2",
        "notifications.send",
        json!({
            "type": "bulk",
            "recipientType": "class",
            "className": "sketching",
            "title": "t",
            "message": "m"
        }),
    );
    assert_eq!(rejected["ok"], false);
    assert_eq!(rejected["error"]["code"], "no_recipients");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "notifications.list",
        json!({}),
    );
    assert_eq!(listed["notifications"].as_array().expect("log").len(), 1);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn individual_send_requires_fields_and_log_reads_most_recent_first() {
    let workspace = temp_dir("atelier-notify-individual");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_roster(&mut stdin, &mut reader, &workspace);

    let students = request_ok(&mut stdin, &mut reader, "1", "students.list", json!({}));
    let first_id = students["students"][0]["id"].as_str().expect("id").to_string();

    let missing_title = request(
        &mut stdin,
        &mut reader,
        "2",
        "notifications.send",
        json!({
            "type": "individual",
            "studentId": first_id,
            "title": "  ",
            "message": "hello"
        }),
    );
    assert_eq!(missing_title["ok"], false);
    assert_eq!(missing_title["error"]["code"], "bad_params");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "notifications.send",
        json!({
            "type": "individual",
            "studentId": first_id,
            "title": "Fee reminder",
            "message": "Second installment due."
        }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "notifications.send",
        json!({
            "type": "individual",
            "studentId": first_id,
            "title": "Kiln day",
            "message": "Glazing on Thursday."
        }),
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "notifications.list",
        json!({ "filter": "individual" }),
    );
    let log = listed["notifications"].as_array().expect("log");
    assert_eq!(log.len(), 2);
    assert_eq!(log[0]["id"], second["notification"]["id"]);
    assert_eq!(log[1]["id"], first["notification"]["id"]);
    assert!(
        log[0]["id"].as_i64().expect("id") > log[1]["id"].as_i64().expect("id"),
        "ids must be creation-ordered"
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn delete_is_idempotent() {
    let workspace = temp_dir("atelier-notify-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_roster(&mut stdin, &mut reader, &workspace);

    let sent = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "notifications.send",
        json!({
            "type": "bulk",
            "recipientType": "all",
            "title": "t",
            "message": "m"
        }),
    );
    let id = sent["notification"]["id"].as_i64().expect("id");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "notifications.delete",
        json!({ "id": id }),
    );
    assert_eq!(first["removed"], true);

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "notifications.delete",
        json!({ "id": id }),
    );
    assert_eq!(second["removed"], false);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "notifications.list",
        json!({}),
    );
    assert!(listed["notifications"].as_array().expect("log").is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}
