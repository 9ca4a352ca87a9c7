use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Store;
use crate::mail::Mailer;
use crate::routes::auth::LoginLimiter;

/// Shared application state handed to every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub mailer: Arc<Mailer>,
    pub config: Arc<AppConfig>,
    pub login_limiter: Arc<LoginLimiter>,
}

impl AppState {
    pub fn new(store: Store, mailer: Mailer, config: AppConfig) -> Self {
        Self {
            login_limiter: Arc::new(LoginLimiter::from_config(&config.auth)),
            store,
            mailer: Arc::new(mailer),
            config: Arc::new(config),
        }
    }
}
