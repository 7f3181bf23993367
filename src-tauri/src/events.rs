use serde::Serialize;
use tauri::{AppHandle, Emitter, Runtime};

/// Event names as constants — matches the listener names in ui/app.js
pub mod event_names {
    pub const PRICE_UPDATE: &str = "price:update";
    pub const PRICE_DROP: &str = "price:drop";
    pub const AUTH_CHANGE: &str = "auth:change";
}

pub fn emit_event<R: Runtime, T: Serialize + Clone>(
    app: &AppHandle<R>,
    event: &str,
    payload: T,
) -> Result<(), String> {
    app.emit(event, payload).map_err(|e| e.to_string())
}
