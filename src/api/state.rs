use std::sync::Arc;

use crate::accel::AddExecutor;
use crate::telemetry::query::DeviceQuery;

/// Process-wide service context, constructed at startup and injected into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn AddExecutor>,
    pub device_query: Arc<dyn DeviceQuery>,
}
