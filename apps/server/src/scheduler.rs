//! Background scheduler for periodic provider health probes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::main_lib::AppState;

/// Starts the background health monitor, unless the interval is zero.
pub fn start_health_scheduler(state: &Arc<AppState>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("Health scheduler disabled");
        return None;
    }
    Some(state.health.clone().spawn(interval))
}
