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

fn add_child(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    stage: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "roster.addChild",
        json!({ "stage": stage }),
    );
    created
        .get("childId")
        .and_then(|v| v.as_str())
        .expect("childId")
        .to_string()
}

#[test]
fn marks_merge_and_survive_reopen() {
    let workspace = temp_dir("rosterd-marks");
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
        json!({ "stage": "grade1" }),
    );
    let child_id = add_child(&mut stdin, &mut reader, "3", "grade1");

    for (i, (period, present)) in [("2025-01", true), ("2025-02", false)].into_iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.set",
            json!({
                "stage": "grade1",
                "childId": child_id,
                "dimension": "visited",
                "period": period,
                "present": present
            }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "roster.flush",
        json!({ "stage": "grade1", "force": true }),
    );

    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.open",
        json!({ "stage": "grade1" }),
    );
    let rows = reopened.get("rows").and_then(|v| v.as_array()).expect("rows");
    let visited = rows[0].get("visited").expect("visited map");
    assert_eq!(visited.get("2025-01").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(visited.get("2025-02").and_then(|v| v.as_bool()), Some(false));
}

#[test]
fn reset_overwrites_one_period_for_every_record() {
    let workspace = temp_dir("rosterd-reset");
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
        json!({ "stage": "grade4" }),
    );
    let a = add_child(&mut stdin, &mut reader, "3", "grade4");
    let b = add_child(&mut stdin, &mut reader, "4", "grade4");

    for (i, id) in [&a, &b].iter().enumerate() {
        for (j, period) in ["2025-03-02", "2025-03-09"].iter().enumerate() {
            let _ = request_ok(
                &mut stdin,
                &mut reader,
                &format!("m{}{}", i, j),
                "attendance.set",
                json!({
                    "stage": "grade4",
                    "childId": id,
                    "dimension": "activity",
                    "period": period,
                    "present": true
                }),
            );
        }
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.flush",
        json!({ "stage": "grade4", "force": true }),
    );

    let unconfirmed = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.reset",
        json!({ "stage": "grade4", "dimension": "activity", "period": "2025-03-09" }),
    );
    assert_eq!(error_code(&unconfirmed), "confirm_required");

    let reset = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.reset",
        json!({
            "stage": "grade4",
            "dimension": "activity",
            "period": "2025-03-09",
            "confirm": true
        }),
    );
    assert_eq!(reset.get("updated").and_then(|v| v.as_u64()), Some(2));

    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "roster.open",
        json!({ "stage": "grade4" }),
    );
    for row in reopened.get("rows").and_then(|v| v.as_array()).expect("rows") {
        let activity = row.get("activity").expect("activity map");
        assert_eq!(
            activity.get("2025-03-09").and_then(|v| v.as_bool()),
            Some(false)
        );
        // The reset never touches the other period.
        assert_eq!(
            activity.get("2025-03-02").and_then(|v| v.as_bool()),
            Some(true)
        );
    }
}

#[test]
fn activity_dimension_is_gated_by_the_stage_flag() {
    let workspace = temp_dir("rosterd-activity-gate");
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
        json!({ "stage": "grade1" }),
    );
    let child_id = add_child(&mut stdin, &mut reader, "3", "grade1");

    let rejected = request(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.set",
        json!({
            "stage": "grade1",
            "childId": child_id,
            "dimension": "activity",
            "period": "2025-03-02",
            "present": true
        }),
    );
    assert_eq!(error_code(&rejected), "bad_params");

    let bad_period = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.set",
        json!({
            "stage": "grade1",
            "childId": child_id,
            "dimension": "visited",
            "period": "2025-1",
            "present": true
        }),
    );
    assert_eq!(error_code(&bad_period), "bad_params");
}
