use crate::application_impl::SingleFlight;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// A validation younger than this is trusted without asking the gateway.
    pub revalidate_window: Duration,
    /// Refresh once the access token is this close to expiry.
    pub refresh_margin: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            revalidate_window: Duration::from_secs(30),
            refresh_margin: Duration::from_secs(300),
        }
    }
}

/// Session validator over a `SessionGateway`. At most one refresh is in
/// flight at a time; everyone who needs one awaits the same call.
pub struct SessionManager {
    gateway: Arc<dyn SessionGateway>,
    config: SessionConfig,
    last_validated: Arc<Mutex<Option<Instant>>>,
    refresh_flight: SingleFlight<(), bool>,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn SessionGateway>, config: SessionConfig) -> Self {
        Self {
            gateway,
            config,
            last_validated: Arc::new(Mutex::new(None)),
            refresh_flight: SingleFlight::new(),
        }
    }

    fn recently_validated(&self) -> bool {
        let last = self
            .last_validated
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) => at.elapsed() < self.config.revalidate_window,
            None => false,
        }
    }

    fn mark(last_validated: &Mutex<Option<Instant>>, at: Option<Instant>) {
        let mut last = last_validated.lock().unwrap_or_else(|e| e.into_inner());
        *last = at;
    }

    async fn perform_refresh(&self) -> bool {
        let gateway = self.gateway.clone();
        let last_validated = self.last_validated.clone();

        self.refresh_flight
            .run((), move || async move {
                debug!("refreshing session");
                match gateway.refresh_session().await {
                    Ok(Some(session)) => {
                        info!(user_id = %session.user_id, expires_at = %session.expires_at, "session refreshed");
                        Self::mark(&last_validated, Some(Instant::now()));
                        true
                    }
                    Ok(None) => {
                        warn!("session refresh returned no session");
                        Self::mark(&last_validated, None);
                        false
                    }
                    Err(e) => {
                        warn!("session refresh failed: {}", e);
                        Self::mark(&last_validated, None);
                        false
                    }
                }
            })
            .await
    }
}

#[async_trait::async_trait]
impl SessionValidator for SessionManager {
    async fn ensure_valid_session(&self) -> bool {
        if self.recently_validated() {
            trace!("session validated recently");
            return true;
        }

        if let Some(refreshed) = self.refresh_flight.join(&()).await {
            return refreshed;
        }

        let session = match self.gateway.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                Self::mark(&self.last_validated, None);
                return false;
            }
            Err(e) => {
                warn!("session lookup failed: {}", e);
                Self::mark(&self.last_validated, None);
                return false;
            }
        };

        if session.expires_within(self.config.refresh_margin, Utc::now()) {
            // the lookup may predate a refresh that finished while we waited
            if self.recently_validated() {
                return true;
            }
            if let Some(refreshed) = self.refresh_flight.join(&()).await {
                return refreshed;
            }
            debug!(expires_at = %session.expires_at, "session inside refresh margin");
            return self.perform_refresh().await;
        }

        Self::mark(&self.last_validated, Some(Instant::now()));
        true
    }

    async fn get_valid_session(&self) -> Result<Session, AuthError> {
        let valid = self.ensure_valid_session().await;
        let session = self.gateway.get_session().await.map_err(AuthError::from)?;
        match (valid, session) {
            (true, Some(session)) => Ok(session),
            (_, None) => Err(AuthError::AuthRequired),
            (false, Some(_)) => Err(AuthError::SessionInvalid(
                "session could not be refreshed".to_string(),
            )),
        }
    }

    async fn force_refresh(&self) -> bool {
        Self::mark(&self.last_validated, None);
        self.perform_refresh().await
    }

    async fn current_user(&self) -> Option<UserId> {
        match self.gateway.get_session().await {
            Ok(session) => session.map(|s| s.user_id),
            Err(e) => {
                warn!("session lookup failed: {}", e);
                None
            }
        }
    }

    async fn sign_in(&self, input: SignInInput) -> Result<Session, AuthError> {
        let credentials = Credentials {
            email: input.email,
            password: input.password,
        };
        let session = self
            .gateway
            .sign_in(&credentials)
            .await
            .map_err(AuthError::from)?;
        Self::mark(&self.last_validated, Some(Instant::now()));
        info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    async fn sign_out(&self) {
        Self::mark(&self.last_validated, None);
        if let Err(e) = self.gateway.sign_out().await {
            warn!("sign out failed: {}", e);
        }
        info!("signed out");
    }
}
