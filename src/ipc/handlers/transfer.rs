use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    failures_json, get_required_bool, get_required_str, open_view, require_confirm, roster_err,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::stages;

fn transfer_toggle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let child_id = get_required_str(params, "childId")?;
    let selected = get_required_bool(params, "selected")?;
    let (_store, view) = open_view(state, &stage)?;
    view.toggle_selection(&child_id, selected)
        .map_err(roster_err)?;
    Ok(json!({ "selected": view.selection_len() }))
}

fn transfer_clear(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let (_store, view) = open_view(state, &stage)?;
    view.clear_selection();
    Ok(json!({ "selected": 0 }))
}

fn transfer_apply(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let target = get_required_str(params, "target")?;
    require_confirm(params)?;
    if stages::lookup(&target).is_none() {
        return Err(HandlerErr::new(
            "unknown_stage",
            format!("unknown target stage: {}", target),
        ));
    }
    if target == stage {
        return Err(HandlerErr::bad_params("target equals the current stage"));
    }

    let (store, view) = open_view(state, &stage)?;
    let report = view.transfer_selected(store, &target).map_err(roster_err)?;
    Ok(json!({
        "moved": report.moved,
        "failures": failures_json(&report.failures)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "transfer.toggle" => transfer_toggle(state, &req.params),
        "transfer.clear" => transfer_clear(state, &req.params),
        "transfer.apply" => transfer_apply(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
