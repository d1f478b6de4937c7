use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolshelf::api;
use toolshelf::application_impl::*;
use toolshelf::application_port::*;
use toolshelf::domain_model::*;
use toolshelf::infra_memory::*;
use toolshelf::server::*;
use warp::Filter;
use warp::http::StatusCode;

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "hunter2";

fn server() -> (Arc<Server>, Arc<InMemoryMembershipRepo>) {
    let gateway = Arc::new(FakeSessionGateway::new());
    gateway.add_account(EMAIL, PASSWORD, UserId::new("alice"));
    let repo = Arc::new(InMemoryMembershipRepo::new());
    repo.insert_named_tool("tool-1", "Formatter");
    repo.insert_named_tool("tool-42", "Debugger");
    repo.seed(&UserId::new("alice"), &["tool-1"]);

    let server = Server::from_parts(
        gateway,
        repo.clone(),
        SessionConfig::default(),
        CacheConfig::default(),
        Duration::from_secs(60),
    );
    (Arc::new(server), repo)
}

fn credentials(password: &str) -> SignInInput {
    SignInInput {
        email: EMAIL.to_string(),
        password: password.to_string(),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn body<B: AsRef<[u8]>>(response: &warp::http::Response<B>) -> Value {
    serde_json::from_slice(response.body().as_ref()).unwrap()
}

#[tokio::test]
async fn sign_in_admits_the_user_and_reconciles() {
    let (server, repo) = server();

    let rejected = server.sign_in(credentials("wrong")).await;
    assert_eq!(rejected.unwrap_err(), AuthError::InvalidCredentials);
    assert_eq!(server.coordinator().user_id(), None);

    server.sign_in(credentials(PASSWORD)).await.unwrap();
    assert_eq!(server.coordinator().user_id(), Some(UserId::new("alice")));

    let service = server.bookmark_service.clone();
    wait_until(|| service.snapshot().initialized).await;
    assert!(service.is_member(&ItemId::from("tool-1")));
    assert_eq!(repo.list_calls(), 1);

    server.sign_out().await;
    assert_eq!(server.coordinator().user_id(), None);
    assert!(!service.is_member(&ItemId::from("tool-1")));
    assert!(!server.session_validator.is_authenticated().await);

    server.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn watch_tears_down_after_the_session_is_gone() {
    let user_id = UserId::new("alice");
    let gateway = Arc::new(FakeSessionGateway::with_session(fake_session(
        &user_id,
        chrono::Duration::hours(1),
    )));
    let validator: Arc<dyn SessionValidator> = Arc::new(SessionManager::new(
        gateway.clone(),
        SessionConfig::default(),
    ));
    let repo = Arc::new(InMemoryMembershipRepo::new());
    let coordinator = BookmarkCoordinator::new(repo, validator.clone(), CacheConfig::default());
    coordinator.init(user_id.clone());
    let watch = SessionWatch::new(
        validator.clone(),
        coordinator.clone(),
        Duration::from_secs(60),
        CancellationToken::new(),
    );

    watch.tick_once().await;
    assert_eq!(coordinator.user_id(), Some(user_id));

    gateway.set_session(None);
    tokio::time::advance(Duration::from_secs(31)).await;
    watch.tick_once().await;
    assert_eq!(coordinator.user_id(), None);
}

#[tokio::test(start_paused = true)]
async fn watch_follows_a_user_change() {
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let gateway = Arc::new(FakeSessionGateway::with_session(fake_session(
        &alice,
        chrono::Duration::hours(1),
    )));
    let validator: Arc<dyn SessionValidator> = Arc::new(SessionManager::new(
        gateway.clone(),
        SessionConfig::default(),
    ));
    let repo = Arc::new(InMemoryMembershipRepo::new());
    repo.seed(&alice, &["tool-1"]);
    let coordinator = BookmarkCoordinator::new(repo, validator.clone(), CacheConfig::default());
    coordinator.init(alice);
    coordinator.fetch_membership(false).await;
    let watch = SessionWatch::new(
        validator,
        coordinator.clone(),
        Duration::from_secs(60),
        CancellationToken::new(),
    );

    gateway.set_session(Some(fake_session(&bob, chrono::Duration::hours(1))));
    watch.tick_once().await;

    assert_eq!(coordinator.user_id(), Some(bob));
    assert!(!coordinator.is_member(&ItemId::from("tool-1")));
}

#[tokio::test]
async fn http_bridge_round_trip() {
    let (server, repo) = server();
    let routes = api::v1::routes(server.clone()).recover(api::v1::recover_error);

    let response = warp::test::request()
        .method("POST")
        .path("/bookmarks/tool-42/toggle")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&response)["success"], json!(false));

    let response = warp::test::request()
        .method("POST")
        .path("/session")
        .json(&json!({ "email": EMAIL, "password": PASSWORD }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["data"]["user_id"], json!("alice"));

    let response = warp::test::request()
        .method("GET")
        .path("/session")
        .reply(&routes)
        .await;
    assert_eq!(body(&response)["data"]["authenticated"], json!(true));

    let response = warp::test::request()
        .method("GET")
        .path("/bookmarks?force=true")
        .reply(&routes)
        .await;
    assert_eq!(body(&response)["data"]["value"], json!(["tool-1"]));

    let response = warp::test::request()
        .method("POST")
        .path("/bookmarks/tool-42/toggle")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let toggled = body(&response);
    assert_eq!(toggled["data"]["outcome"], json!("added"));
    assert_eq!(toggled["data"]["is_member"], json!(true));

    let response = warp::test::request()
        .method("DELETE")
        .path("/bookmarks")
        .json(&json!({ "confirm": false }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_REQUIRED);
    assert_eq!(repo.clear_calls(), 0);

    let response = warp::test::request()
        .method("DELETE")
        .path("/bookmarks")
        .json(&json!({ "confirm": true }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(repo.bookmarks_of(&UserId::new("alice")).is_empty());

    server.shutdown().await;
}
