use std::time::Instant;

use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_required_str, open_view, record_json, require_confirm, roster_err, write_failures_json,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::roster::{RosterSynchronizer, DEFAULT_DEBOUNCE};
use crate::stages;
use crate::store::Field;

fn roster_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let store = state
        .store
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;

    // Re-opening a stage replaces its view; pending writes are dropped with it.
    if let Some(mut old) = state.views.remove(&stage) {
        old.close();
    }

    let mut view = RosterSynchronizer::new(&stage, stages::has_activity(&stage), DEFAULT_DEBOUNCE);
    let fetched = view.fetch(store);
    let rows: Vec<serde_json::Value> = view.records().iter().map(record_json).collect();
    let count = rows.len();
    // The view stays open (with an empty roster) even when the fetch fails,
    // so the operator can retry without re-entering the stage.
    state.views.insert(stage.clone(), view);
    fetched.map_err(roster_err)?;

    Ok(json!({
        "stage": stage,
        "label": stages::label_for(&stage),
        "rows": rows,
        "count": count
    }))
}

fn roster_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let search = params
        .get("search")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let (_store, view) = open_view(state, &stage)?;
    let rows: Vec<serde_json::Value> = view.filtered(search).into_iter().map(record_json).collect();
    Ok(json!({
        "rows": rows,
        "count": rows.len(),
        "total": view.records().len()
    }))
}

fn roster_add_child(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let (store, view) = open_view(state, &stage)?;
    let id = view.add_child(store).map_err(roster_err)?;
    Ok(json!({ "childId": id }))
}

fn roster_edit_field(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let child_id = get_required_str(params, "childId")?;
    let field_name = get_required_str(params, "field")?;
    let value = get_required_str(params, "value")?;
    let field = Field::parse(&field_name)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown field: {}", field_name)))?;

    let (store, view) = open_view(state, &stage)?;
    view.edit_field(&child_id, field, &value, Instant::now())
        .map_err(roster_err)?;
    // Edits also give matured windows from earlier keys a chance to fire.
    let failures = view.flush_due(store, Instant::now());
    Ok(json!({
        "pending": view.pending_writes(),
        "failures": write_failures_json(&failures)
    }))
}

fn roster_flush(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let force = params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let (store, view) = open_view(state, &stage)?;
    let failures = if force {
        view.flush_all(store)
    } else {
        view.flush_due(store, Instant::now())
    };
    Ok(json!({
        "pending": view.pending_writes(),
        "failures": write_failures_json(&failures)
    }))
}

fn roster_delete_child(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let child_id = get_required_str(params, "childId")?;
    require_confirm(params)?;
    let (store, view) = open_view(state, &stage)?;
    view.delete_child(store, &child_id).map_err(roster_err)?;
    Ok(json!({ "ok": true }))
}

fn roster_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    match state.views.remove(&stage) {
        Some(mut view) => {
            view.close();
            Ok(json!({ "ok": true }))
        }
        None => Err(HandlerErr::new(
            "no_view",
            format!("no open roster for {}", stage),
        )),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.open" => roster_open(state, &req.params),
        "roster.list" => roster_list(state, &req.params),
        "roster.addChild" => roster_add_child(state, &req.params),
        "roster.editField" => roster_edit_field(state, &req.params),
        "roster.flush" => roster_flush(state, &req.params),
        "roster.deleteChild" => roster_delete_child(state, &req.params),
        "roster.close" => roster_close(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
