use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::SessionWatch;
use crate::settings::Settings;
use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEMO_EMAIL: &str = "demo@toolshelf.dev";
pub const DEMO_PASSWORD: &str = "demo-password";

/// Composition root: owns the validator, the coordinator and the session
/// re-check loop, and ties the coordinator lifecycle to sign-in/sign-out.
pub struct Server {
    pub session_validator: Arc<dyn SessionValidator>,
    pub bookmark_service: Arc<dyn BookmarkService>,
    coordinator: BookmarkCoordinator,
    watch_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let (gateway, repo): (Arc<dyn SessionGateway>, Arc<dyn MembershipRepo>) =
            match settings.backend.kind.as_str() {
                "memory" => {
                    let gateway = FakeSessionGateway::new();
                    gateway.add_account(DEMO_EMAIL, DEMO_PASSWORD, UserId::new("demo-user"));
                    let repo = InMemoryMembershipRepo::new();
                    for (id, name) in [
                        ("tool-1", "Formatter"),
                        ("tool-2", "Linter"),
                        ("tool-3", "Profiler"),
                        ("tool-42", "Debugger"),
                    ] {
                        repo.insert_named_tool(id, name);
                    }
                    (Arc::new(gateway), Arc::new(repo))
                }
                "redis" => {
                    let url = settings
                        .backend
                        .redis_url
                        .as_deref()
                        .ok_or_else(|| anyhow!("backend.redis_url is required for redis"))?;
                    let redis_client = redis::Client::open(url)?;
                    let redis_manager = redis_client.get_connection_manager().await?;

                    let key = std::env::var("JWT_SIGNING_KEY")
                        .unwrap_or_else(|_| "my-dev-secret-key".to_string())
                        .into_bytes();
                    let codec = JwtHs256Codec::new(JwtConfig {
                        issuer: settings.jwt.issuer.clone(),
                        audience: settings.jwt.audience.clone(),
                        access_ttl: Duration::from_secs(settings.jwt.access_ttl_secs),
                        refresh_ttl: Duration::from_secs(settings.jwt.refresh_ttl_secs),
                        signing_key: key,
                    });

                    let gateway = RedisSessionGateway::new(
                        redis_manager.clone(),
                        settings.backend.key_prefix.clone(),
                        codec,
                    );
                    let repo = RedisMembershipRepo::new(
                        redis_manager,
                        settings.backend.key_prefix.clone(),
                    );
                    (Arc::new(gateway), Arc::new(repo))
                }
                other => return Err(anyhow!("Unknown backend: {}", other)),
            };

        let session_config = SessionConfig {
            revalidate_window: Duration::from_secs(settings.session.revalidate_window_secs),
            refresh_margin: Duration::from_secs(settings.session.refresh_margin_secs),
        };
        let cache_config = CacheConfig {
            ids_ttl: Duration::from_secs(settings.cache.ids_ttl_secs),
            records_ttl: Duration::from_secs(settings.cache.records_ttl_secs),
            page_size: PageSize(settings.cache.page_size),
            fetch_timeout: settings.cache.fetch_timeout_ms.map(Duration::from_millis),
        };
        let recheck = Duration::from_secs(settings.session.recheck_interval_secs.max(1));

        let server = Self::from_parts(gateway, repo, session_config, cache_config, recheck);
        info!(backend = %settings.backend.kind, "server started");
        Ok(server)
    }

    pub fn from_parts(
        gateway: Arc<dyn SessionGateway>,
        repo: Arc<dyn MembershipRepo>,
        session_config: SessionConfig,
        cache_config: CacheConfig,
        recheck_interval: Duration,
    ) -> Self {
        let session_validator: Arc<dyn SessionValidator> =
            Arc::new(SessionManager::new(gateway, session_config));
        let coordinator = BookmarkCoordinator::new(repo, session_validator.clone(), cache_config);
        let bookmark_service: Arc<dyn BookmarkService> = Arc::new(coordinator.clone());

        let cancel = CancellationToken::new();
        let watch = SessionWatch::new(
            session_validator.clone(),
            coordinator.clone(),
            recheck_interval,
            cancel.clone(),
        );
        let watch_handle = tokio::spawn(async move {
            watch.run().await;
        });

        Self {
            session_validator,
            bookmark_service,
            coordinator,
            watch_handle: Mutex::new(Some(watch_handle)),
            cancel,
        }
    }

    pub fn coordinator(&self) -> &BookmarkCoordinator {
        &self.coordinator
    }

    pub async fn sign_in(&self, input: SignInInput) -> Result<Session, AuthError> {
        let session = self.session_validator.sign_in(input).await?;
        self.coordinator.init(session.user_id.clone());
        self.coordinator.spawn_reconcile();
        Ok(session)
    }

    pub async fn sign_out(&self) {
        self.coordinator.teardown();
        self.session_validator.sign_out().await;
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.watch_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("session watch handle dropped: {:?}", r);
        }

        self.coordinator.teardown();
    }
}
