use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum RefreshBehavior {
    /// Issue a new session valid for `ttl`.
    Renew { ttl: chrono::Duration },
    Fail,
    /// The service answers with no session and drops the current one.
    Empty,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn fake_session(user_id: &UserId, expires_in: chrono::Duration) -> Session {
    Session {
        access_token: AccessToken(format!("fake-access-token:{}", user_id)),
        refresh_token: RefreshToken(format!("fake-refresh-token:{}", user_id)),
        expires_at: Utc::now() + expires_in,
        user_id: user_id.clone(),
    }
}

// Minimal fake for local runs and tests.
// Extend to simulate more error cases when needed.
pub struct FakeSessionGateway {
    session: Mutex<Option<Session>>,
    accounts: Mutex<HashMap<String, (String, UserId)>>,
    refresh_behavior: Mutex<RefreshBehavior>,
    refresh_latency: Mutex<Duration>,
    get_latency: Mutex<Duration>,
    get_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl FakeSessionGateway {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            accounts: Mutex::new(HashMap::new()),
            refresh_behavior: Mutex::new(RefreshBehavior::Renew {
                ttl: chrono::Duration::hours(1),
            }),
            refresh_latency: Mutex::new(Duration::ZERO),
            get_latency: Mutex::new(Duration::ZERO),
            get_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let gateway = Self::new();
        gateway.set_session(Some(session));
        gateway
    }

    pub fn set_session(&self, session: Option<Session>) {
        *lock(&self.session) = session;
    }

    pub fn add_account(&self, email: &str, password: &str, user_id: UserId) {
        lock(&self.accounts).insert(email.to_string(), (password.to_string(), user_id));
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        *lock(&self.refresh_behavior) = behavior;
    }

    pub fn set_refresh_latency(&self, latency: Duration) {
        *lock(&self.refresh_latency) = latency;
    }

    /// Lookups answer with the session as it was when the call started.
    pub fn set_get_latency(&self, latency: Duration) {
        *lock(&self.get_latency) = latency;
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeSessionGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionGateway for FakeSessionGateway {
    async fn get_session(&self) -> Result<Option<Session>, DataServiceError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let session = lock(&self.session).clone();
        let latency = *lock(&self.get_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Option<Session>, DataServiceError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *lock(&self.refresh_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let behavior = *lock(&self.refresh_behavior);
        let mut session = lock(&self.session);
        match behavior {
            RefreshBehavior::Renew { ttl } => {
                let renewed = session.as_ref().map(|s| fake_session(&s.user_id, ttl));
                *session = renewed.clone();
                Ok(renewed)
            }
            RefreshBehavior::Fail => Err(DataServiceError::Store(
                "simulated refresh failure".to_string(),
            )),
            RefreshBehavior::Empty => {
                *session = None;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, DataServiceError> {
        let user_id = match lock(&self.accounts).get(&credentials.email) {
            Some((password, user_id)) if *password == credentials.password => user_id.clone(),
            _ => return Err(DataServiceError::InvalidCredentials),
        };
        let session = fake_session(&user_id, chrono::Duration::hours(1));
        *lock(&self.session) = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), DataServiceError> {
        *lock(&self.session) = None;
        Ok(())
    }
}
