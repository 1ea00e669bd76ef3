use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::stages;

fn stages_list(_params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let entries: Vec<serde_json::Value> = stages::STAGES
        .iter()
        .map(|s| {
            json!({
                "stage": s.key,
                "label": s.label,
                "hasActivity": s.has_activity
            })
        })
        .collect();
    Ok(json!({ "stages": entries }))
}

fn stages_login(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let stage = get_required_str(params, "stage")?;
    let username = get_required_str(params, "username")?;
    let password = get_required_str(params, "password")?;
    if stages::lookup(&stage).is_none() {
        return Err(HandlerErr::new("unknown_stage", format!("unknown stage: {}", stage)));
    }
    let granted = stages::check_login(&stage, &username, &password);
    Ok(json!({
        "granted": granted,
        "label": stages::label_for(&stage)
    }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stages.list" => stages_list(&req.params),
        "stages.login" => stages_login(&req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
