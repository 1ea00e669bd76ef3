use serde_json::json;

use crate::import::{DelimitedSheetReader, TabularImportReader};
use crate::ipc::error::ok;
use crate::ipc::helpers::{failures_json, get_required_str, open_view, HandlerErr};
use crate::ipc::types::{AppState, Request};

/// The sheet payload arrives either inline (`text`) or as a file path the
/// host has already vetted.
fn sheet_bytes(params: &serde_json::Value) -> Result<Vec<u8>, HandlerErr> {
    if let Some(text) = params.get("text").and_then(|v| v.as_str()) {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(path) = params.get("path").and_then(|v| v.as_str()) {
        return std::fs::read(path)
            .map_err(|e| HandlerErr::new("file_read_failed", e.to_string()));
    }
    Err(HandlerErr::bad_params("missing text or path"))
}

fn import_sheet(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let bytes = sheet_bytes(params)?;
    let rows = DelimitedSheetReader
        .parse(&bytes)
        .map_err(|e| HandlerErr::new("sheet_parse_failed", e.to_string()))?;

    let (store, view) = open_view(state, &stage)?;
    let report = view.bulk_import(store, &rows);
    Ok(json!({
        "created": report.created,
        "skipped": report.skipped,
        "failures": failures_json(&report.failures)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "import.sheet" => import_sheet(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
