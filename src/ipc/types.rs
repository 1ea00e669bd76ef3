use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::roster::RosterSynchronizer;
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    /// One open roster view per stage, keyed by stage id. Created by
    /// `roster.open`, torn down by `roster.close`.
    pub views: HashMap<String, RosterSynchronizer>,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            workspace: None,
            store: None,
            views: HashMap::new(),
        }
    }
}
