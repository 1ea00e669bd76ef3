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
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
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

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
}

#[test]
fn add_edit_flush_delete_flow() {
    let workspace = temp_dir("rosterd-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.open",
        json!({ "stage": "grade1" }),
    );
    assert_eq!(opened.get("count").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(
        opened.get("label").and_then(|v| v.as_str()),
        Some("سنة أولى")
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "roster.addChild",
        json!({ "stage": "grade1" }),
    );
    let child_id = created
        .get("childId")
        .and_then(|v| v.as_str())
        .expect("childId")
        .to_string();

    let edited = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "roster.editField",
        json!({ "stage": "grade1", "childId": child_id, "field": "name", "value": "مينا" }),
    );
    assert_eq!(edited.get("pending").and_then(|v| v.as_u64()), Some(1));

    let flushed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.flush",
        json!({ "stage": "grade1", "force": true }),
    );
    assert_eq!(flushed.get("pending").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(
        flushed
            .get("failures")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    // The edit survives a fresh fetch.
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "roster.open",
        json!({ "stage": "grade1" }),
    );
    let rows = reopened.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name").and_then(|v| v.as_str()), Some("مينا"));
    assert_eq!(rows[0].get("page").and_then(|v| v.as_str()), Some("grade1"));

    // Delete needs the confirmation attestation.
    let unconfirmed = request(
        &mut stdin,
        &mut reader,
        "7",
        "roster.deleteChild",
        json!({ "stage": "grade1", "childId": child_id }),
    );
    assert_eq!(error_code(&unconfirmed), "confirm_required");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "roster.deleteChild",
        json!({ "stage": "grade1", "childId": child_id, "confirm": true }),
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "roster.list",
        json!({ "stage": "grade1" }),
    );
    assert_eq!(listed.get("count").and_then(|v| v.as_u64()), Some(0));
}

#[test]
fn search_and_sort_follow_the_roster_view_rules() {
    let workspace = temp_dir("rosterd-search");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.open",
        json!({ "stage": "grade2" }),
    );

    for (i, name) in ["مينا", "أمير", "بولا", "John"].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "roster.addChild",
            json!({ "stage": "grade2" }),
        );
        let id = created.get("childId").and_then(|v| v.as_str()).expect("id");
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("e{}", i),
            "roster.editField",
            json!({ "stage": "grade2", "childId": id, "field": "name", "value": name }),
        );
    }

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "roster.list",
        json!({ "stage": "grade2" }),
    );
    let names: Vec<&str> = all
        .get("rows")
        .and_then(|v| v.as_array())
        .expect("rows")
        .iter()
        .map(|r| r.get("name").and_then(|v| v.as_str()).unwrap_or(""))
        .collect();
    // Latin before Arabic, hamza-alef folded in with plain alef.
    assert_eq!(names, vec!["John", "أمير", "بولا", "مينا"]);

    let hits = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "roster.list",
        json!({ "stage": "grade2", "search": "JO" }),
    );
    assert_eq!(hits.get("count").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(hits.get("total").and_then(|v| v.as_u64()), Some(4));
}

#[test]
fn operations_require_workspace_and_open_view() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "1",
        "roster.open",
        json!({ "stage": "grade1" }),
    );
    assert_eq!(error_code(&no_ws), "no_workspace");

    let workspace = temp_dir("rosterd-gates");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let no_view = request(
        &mut stdin,
        &mut reader,
        "3",
        "roster.addChild",
        json!({ "stage": "grade1" }),
    );
    assert_eq!(error_code(&no_view), "no_view");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "roster.open",
        json!({ "stage": "grade1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.close",
        json!({ "stage": "grade1" }),
    );
    let closed = request(
        &mut stdin,
        &mut reader,
        "6",
        "roster.list",
        json!({ "stage": "grade1" }),
    );
    assert_eq!(error_code(&closed), "no_view");

    let unknown = request(&mut stdin, &mut reader, "7", "nope.method", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");
}
