use std::time::Instant;

use serde_json::json;

use crate::attendance::Dimension;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    failures_json, get_required_bool, get_required_str, open_view, require_confirm, roster_err,
    write_failures_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};

fn parse_dimension(params: &serde_json::Value) -> Result<Dimension, HandlerErr> {
    let name = get_required_str(params, "dimension")?;
    Dimension::parse(&name)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown dimension: {}", name)))
}

fn attendance_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let child_id = get_required_str(params, "childId")?;
    let dimension = parse_dimension(params)?;
    let present = get_required_bool(params, "present")?;
    // The period defaults to today/this month, the same default the UI shows.
    let period = match params.get("period").and_then(|v| v.as_str()) {
        Some(p) => p.to_string(),
        None => dimension.current_period(),
    };

    let (store, view) = open_view(state, &stage)?;
    view.set_attendance(&child_id, dimension, &period, present, Instant::now())
        .map_err(roster_err)?;
    let failures = view.flush_due(store, Instant::now());
    Ok(json!({
        "period": period,
        "pending": view.pending_writes(),
        "failures": write_failures_json(&failures)
    }))
}

fn attendance_reset(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let dimension = parse_dimension(params)?;
    let period = get_required_str(params, "period")?;
    require_confirm(params)?;

    let (store, view) = open_view(state, &stage)?;
    let report = view
        .reset_period(store, dimension, &period)
        .map_err(roster_err)?;
    Ok(json!({
        "updated": report.updated,
        "failures": failures_json(&report.failures)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.set" => attendance_set(state, &req.params),
        "attendance.reset" => attendance_reset(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
