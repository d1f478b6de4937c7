use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use toolshelf::application_impl::*;
use toolshelf::application_port::*;
use toolshelf::domain_model::*;
use toolshelf::infra_memory::*;

fn manager_with(gateway: &Arc<FakeSessionGateway>) -> SessionManager {
    SessionManager::new(gateway.clone(), SessionConfig::default())
}

fn session_expiring_in(user: &str, expires_in: chrono::Duration) -> Session {
    fake_session(&UserId::new(user), expires_in)
}

#[tokio::test]
async fn recent_validation_skips_the_gateway() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::hours(1),
    )));
    let manager = manager_with(&gateway);

    assert!(manager.ensure_valid_session().await);
    assert_eq!(gateway.get_calls(), 1);

    assert!(manager.ensure_valid_session().await);
    assert!(manager.is_authenticated().await);
    assert_eq!(gateway.get_calls(), 1);
    assert_eq!(gateway.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn revalidates_after_the_window_lapses() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::hours(1),
    )));
    let manager = manager_with(&gateway);

    assert!(manager.ensure_valid_session().await);
    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(manager.ensure_valid_session().await);
    assert_eq!(gateway.get_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_refresh() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::minutes(1),
    )));
    gateway.set_refresh_latency(Duration::from_millis(200));
    let manager = manager_with(&gateway);

    let results = join_all((0..5).map(|_| manager.ensure_valid_session())).await;

    assert_eq!(results, vec![true; 5]);
    assert_eq!(gateway.refresh_calls(), 1);

    // the renewed session is far from expiry and recently validated
    assert!(manager.ensure_valid_session().await);
    assert_eq!(gateway.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn lookup_that_predates_a_finished_refresh_does_not_refresh_again() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::minutes(1),
    )));
    gateway.set_get_latency(Duration::from_millis(50));
    gateway.set_refresh_latency(Duration::from_millis(10));
    let manager = manager_with(&gateway);

    // the second lookup starts before the first caller's refresh and
    // answers with the old expiry after that refresh has landed
    let (first, second) = tokio::join!(manager.ensure_valid_session(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.ensure_valid_session().await
    });

    assert!(first);
    assert!(second);
    assert_eq!(gateway.get_calls(), 2);
    assert_eq!(gateway.refresh_calls(), 1);
}

#[tokio::test]
async fn no_session_is_not_valid() {
    let gateway = Arc::new(FakeSessionGateway::new());
    let manager = manager_with(&gateway);

    assert!(!manager.ensure_valid_session().await);
    assert_eq!(manager.current_user().await, None);
    assert_eq!(
        manager.get_valid_session().await,
        Err(AuthError::AuthRequired)
    );
}

#[tokio::test]
async fn failed_refresh_is_retried_on_the_next_call() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::minutes(1),
    )));
    gateway.set_refresh_behavior(RefreshBehavior::Fail);
    let manager = manager_with(&gateway);

    assert!(!manager.ensure_valid_session().await);
    assert!(matches!(
        manager.get_valid_session().await,
        Err(AuthError::SessionInvalid(_))
    ));
    assert_eq!(gateway.refresh_calls(), 2);

    gateway.set_refresh_behavior(RefreshBehavior::Renew {
        ttl: chrono::Duration::hours(1),
    });
    assert!(manager.ensure_valid_session().await);
    assert_eq!(gateway.refresh_calls(), 3);

    let session = manager.get_valid_session().await.unwrap();
    assert_eq!(session.user_id, UserId::new("alice"));
}

#[tokio::test]
async fn refresh_answering_empty_signs_the_user_out() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::minutes(1),
    )));
    gateway.set_refresh_behavior(RefreshBehavior::Empty);
    let manager = manager_with(&gateway);

    assert!(!manager.ensure_valid_session().await);
    assert_eq!(manager.current_user().await, None);
}

#[tokio::test]
async fn force_refresh_ignores_the_recent_validation() {
    let gateway = Arc::new(FakeSessionGateway::with_session(session_expiring_in(
        "alice",
        chrono::Duration::hours(1),
    )));
    let manager = manager_with(&gateway);

    assert!(manager.ensure_valid_session().await);
    assert!(manager.force_refresh().await);
    assert_eq!(gateway.refresh_calls(), 1);
}

#[tokio::test]
async fn sign_in_and_sign_out() {
    let gateway = Arc::new(FakeSessionGateway::new());
    gateway.add_account("alice@example.com", "hunter2", UserId::new("alice"));
    let manager = manager_with(&gateway);

    let wrong = manager
        .sign_in(SignInInput {
            email: "alice@example.com".to_string(),
            password: "nope".to_string(),
        })
        .await;
    assert_eq!(wrong.unwrap_err(), AuthError::InvalidCredentials);
    assert!(!manager.ensure_valid_session().await);

    let session = manager
        .sign_in(SignInInput {
            email: "alice@example.com".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(session.user_id, UserId::new("alice"));

    let lookups = gateway.get_calls();
    assert!(manager.ensure_valid_session().await);
    assert_eq!(gateway.get_calls(), lookups);
    assert_eq!(manager.current_user().await, Some(UserId::new("alice")));

    manager.sign_out().await;
    assert!(!manager.ensure_valid_session().await);
}
