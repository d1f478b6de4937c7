use crate::application_impl::BookmarkCoordinator;
use crate::application_port::*;
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodic re-check of the session on behalf of the app. Tears the
/// bookmark state down once the session is gone and follows a user change
/// made outside this process.
pub struct SessionWatch {
    validator: Arc<dyn SessionValidator>,
    coordinator: BookmarkCoordinator,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl SessionWatch {
    pub fn new(
        validator: Arc<dyn SessionValidator>,
        coordinator: BookmarkCoordinator,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            validator,
            coordinator,
            interval,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) {
        let admitted = match self.coordinator.user_id() {
            Some(user_id) => user_id,
            None => return,
        };

        if !self.validator.ensure_valid_session().await {
            warn!(user_id = %admitted, "session lost, dropping bookmark state");
            self.coordinator.teardown();
            return;
        }

        if let Some(current) = self.validator.current_user().await {
            if current != admitted {
                self.coordinator.switch_user(current);
                self.coordinator.spawn_reconcile();
            }
        }
    }

    pub async fn run(&self) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("SessionWatch shutting down...");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.tick_once().await;
                }
            }
        }
    }
}
