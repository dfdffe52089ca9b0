use crate::use_cases::HubHandle;
use axum::extract::ws::Utf8Bytes;

#[derive(Clone)]
pub struct AppState {
    // Entry point into the hub; snapshots arrive as shared JSON text.
    pub hub: HubHandle<Utf8Bytes>,
}
