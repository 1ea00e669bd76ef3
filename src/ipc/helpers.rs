use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::roster::{ItemFailure, RosterError, RosterSynchronizer, WriteFailure};
use crate::store::{ChildRecord, SqliteStore};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Destructive and batch operations only run after a human has confirmed in
/// the UI shell; the shell attests to that with `confirm: true`.
pub fn require_confirm(params: &serde_json::Value) -> Result<(), HandlerErr> {
    let confirmed = params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !confirmed {
        return Err(HandlerErr::new(
            "confirm_required",
            "operation requires confirm: true",
        ));
    }
    Ok(())
}

/// Split borrow of the store and one open stage view out of the app state.
pub fn open_view<'a>(
    state: &'a mut AppState,
    stage: &str,
) -> Result<(&'a mut SqliteStore, &'a mut RosterSynchronizer), HandlerErr> {
    let AppState { store, views, .. } = state;
    let store = store
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let view = views
        .get_mut(stage)
        .ok_or_else(|| HandlerErr::new("no_view", format!("open the {} roster first", stage)))?;
    Ok((store, view))
}

pub fn roster_err(e: RosterError) -> HandlerErr {
    let code = match &e {
        RosterError::Fetch(_) => "fetch_failed",
        RosterError::Create(_) => "create_failed",
        RosterError::Delete { .. } => "delete_failed",
        RosterError::UnknownChild(_) => "not_found",
        RosterError::DimensionNotTracked | RosterError::BadPeriod(_) => "bad_params",
        RosterError::EmptySelection => "empty_selection",
    };
    HandlerErr::new(code, e.to_string())
}

pub fn record_json(rec: &ChildRecord) -> serde_json::Value {
    serde_json::to_value(rec).unwrap_or_else(|_| json!({}))
}

pub fn failures_json(failures: &[ItemFailure]) -> Vec<serde_json::Value> {
    failures
        .iter()
        .map(|f| json!({ "id": f.id, "message": f.message }))
        .collect()
}

pub fn write_failures_json(failures: &[WriteFailure]) -> Vec<serde_json::Value> {
    failures
        .iter()
        .map(|f| json!({ "childId": f.child_id, "message": f.message }))
        .collect()
}
