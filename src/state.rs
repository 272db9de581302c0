use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::notify::Notifier;

pub struct AppState {
    /// The connection mutex doubles as the booking-path critical section:
    /// the availability check and the insert run under one guard.
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Arc<dyn Notifier>,
}
