use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use toolshelf::application_impl::*;
use toolshelf::application_port::*;
use toolshelf::domain_model::*;
use toolshelf::infra_memory::*;

fn catalog() -> Arc<InMemoryMembershipRepo> {
    let repo = Arc::new(InMemoryMembershipRepo::new());
    for (id, name) in [
        ("tool-1", "Formatter"),
        ("tool-2", "Linter"),
        ("tool-42", "Debugger"),
    ] {
        repo.insert_named_tool(id, name);
    }
    repo
}

fn coordinator_for(repo: &Arc<InMemoryMembershipRepo>, user: &str) -> BookmarkCoordinator {
    let user_id = UserId::new(user);
    let gateway = Arc::new(FakeSessionGateway::with_session(fake_session(
        &user_id,
        chrono::Duration::hours(1),
    )));
    let validator = Arc::new(SessionManager::new(gateway, SessionConfig::default()));
    let coordinator = BookmarkCoordinator::new(repo.clone(), validator, CacheConfig::default());
    coordinator.init(user_id);
    coordinator
}

fn tool(id: &str) -> ItemId {
    ItemId::from(id)
}

#[tokio::test]
async fn toggle_shows_membership_before_the_remote_call_resolves() {
    let repo = catalog();
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_membership(false).await;
    let mut events = coordinator.subscribe();
    let gate = repo.gate_mutations();

    let toggling = coordinator.clone();
    let toggle = tokio::spawn(async move { toggling.toggle_membership(&tool("tool-42")).await });

    gate.entered().await;
    assert!(coordinator.is_member(&tool("tool-42")));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    gate.release();
    assert_eq!(toggle.await.unwrap(), Ok(ToggleOutcome::Added));

    assert_eq!(
        events.recv().await.unwrap(),
        MembershipEvent::MembershipChanged {
            action: MembershipAction::Added,
            item_id: tool("tool-42"),
        }
    );
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(repo.bookmarks_of(&UserId::new("alice")), vec![tool("tool-42")]);
    assert_eq!(
        coordinator.fetch_membership(false).await.value,
        vec![tool("tool-42")]
    );
}

#[tokio::test]
async fn failed_add_rolls_back() {
    let repo = catalog();
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_membership(false).await;
    let mut events = coordinator.subscribe();
    repo.fail_next_add(1);

    let result = coordinator.toggle_membership(&tool("tool-42")).await;

    assert!(matches!(result, Err(BookmarkError::MutationFailed(_))));
    assert!(!coordinator.is_member(&tool("tool-42")));
    assert!(coordinator.snapshot().error.is_some());
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert!(coordinator.fetch_membership(false).await.value.is_empty());
    assert_eq!(repo.list_calls(), 1);
}

#[tokio::test]
async fn failed_remove_restores_the_item() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1", "tool-2"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_membership(false).await;
    repo.fail_next_remove(1);

    let result = coordinator.toggle_membership(&tool("tool-1")).await;

    assert!(matches!(result, Err(BookmarkError::MutationFailed(_))));
    assert!(coordinator.is_member(&tool("tool-1")));
    let cached = coordinator.fetch_membership(false).await.value;
    assert!(cached.contains(&tool("tool-1")));
    assert_eq!(cached.len(), 2);
}

#[tokio::test]
async fn remove_updates_displayed_records_and_broadcasts() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1", "tool-2"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_full_records().await;
    let mut events = coordinator.subscribe();

    let outcome = coordinator.toggle_membership(&tool("tool-1")).await;

    assert_eq!(outcome, Ok(ToggleOutcome::Removed));
    assert!(!coordinator.is_member(&tool("tool-1")));
    let shown: Vec<ItemId> = coordinator
        .displayed_records()
        .into_iter()
        .map(|t| t.item_id)
        .collect();
    assert_eq!(shown, vec![tool("tool-2")]);
    assert_eq!(
        events.recv().await.unwrap(),
        MembershipEvent::MembershipChanged {
            action: MembershipAction::Removed,
            item_id: tool("tool-1"),
        }
    );
}

#[tokio::test]
async fn add_invalidates_cached_records() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_full_records().await;

    coordinator.toggle_membership(&tool("tool-2")).await.unwrap();
    let records = coordinator.fetch_full_records().await;

    assert_eq!(repo.list_calls(), 2);
    let ids: Vec<ItemId> = records.value.into_iter().map(|t| t.item_id).collect();
    assert_eq!(ids, vec![tool("tool-1"), tool("tool-2")]);
}

#[tokio::test]
async fn racing_adds_leave_one_bookmark() {
    let repo = catalog();
    let first = coordinator_for(&repo, "alice");
    let second = coordinator_for(&repo, "alice");
    first.fetch_membership(false).await;
    second.fetch_membership(false).await;
    let gate = repo.gate_mutations();

    let toggling = first.clone();
    let first_toggle =
        tokio::spawn(async move { toggling.toggle_membership(&tool("tool-42")).await });
    let toggling = second.clone();
    let second_toggle =
        tokio::spawn(async move { toggling.toggle_membership(&tool("tool-42")).await });

    // both adds are in flight before either reaches the store
    gate.parked_at_least(2).await;
    assert!(first.is_member(&tool("tool-42")));
    assert!(second.is_member(&tool("tool-42")));
    assert_eq!(repo.add_calls(), 2);

    gate.release();
    gate.release();
    let outcomes = [
        first_toggle.await.unwrap().unwrap(),
        second_toggle.await.unwrap().unwrap(),
    ];

    let added = outcomes
        .iter()
        .filter(|o| **o == ToggleOutcome::Added)
        .count();
    let already = outcomes
        .iter()
        .filter(|o| **o == ToggleOutcome::AlreadyExists)
        .count();
    assert_eq!((added, already), (1, 1));
    assert!(first.is_member(&tool("tool-42")));
    assert!(second.is_member(&tool("tool-42")));
    assert_eq!(repo.bookmarks_of(&UserId::new("alice")), vec![tool("tool-42")]);
    assert_eq!(repo.remove_calls(), 0);
}

#[tokio::test]
async fn already_bookmarked_add_brings_the_record_into_view() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1"]);
    let first = coordinator_for(&repo, "alice");
    let second = coordinator_for(&repo, "alice");
    first.fetch_full_records().await;
    second.fetch_full_records().await;
    let mut second_events = second.subscribe();

    first.toggle_membership(&tool("tool-2")).await.unwrap();
    let outcome = second.toggle_membership(&tool("tool-2")).await;

    assert_eq!(outcome, Ok(ToggleOutcome::AlreadyExists));
    assert_eq!(second_events.try_recv(), Err(TryRecvError::Empty));
    let records = second.fetch_full_records().await;
    let ids: Vec<ItemId> = records.value.into_iter().map(|t| t.item_id).collect();
    assert_eq!(ids, vec![tool("tool-1"), tool("tool-2")]);
    let shown: Vec<ItemId> = second
        .displayed_records()
        .into_iter()
        .map(|t| t.item_id)
        .collect();
    assert_eq!(shown, vec![tool("tool-1"), tool("tool-2")]);
}

#[tokio::test]
async fn failed_remove_restores_records_fetched_while_it_was_in_flight() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1", "tool-2"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_full_records().await;
    let gate = repo.gate_mutations();
    repo.fail_next_remove(1);

    let toggling = coordinator.clone();
    let toggle = tokio::spawn(async move { toggling.toggle_membership(&tool("tool-1")).await });
    gate.entered().await;

    let during = coordinator
        .fetch_full_records_with(FetchOptions::forced())
        .await;
    let during: Vec<ItemId> = during.value.into_iter().map(|t| t.item_id).collect();
    assert_eq!(during, vec![tool("tool-2")]);

    gate.release();
    assert!(matches!(
        toggle.await.unwrap(),
        Err(BookmarkError::MutationFailed(_))
    ));
    assert!(coordinator.is_member(&tool("tool-1")));

    let records = coordinator.fetch_full_records().await;
    let ids: Vec<ItemId> = records.value.into_iter().map(|t| t.item_id).collect();
    assert_eq!(ids, vec![tool("tool-1"), tool("tool-2")]);
    let shown: Vec<ItemId> = coordinator
        .displayed_records()
        .into_iter()
        .map(|t| t.item_id)
        .collect();
    assert_eq!(shown, vec![tool("tool-1"), tool("tool-2")]);
    assert_eq!(repo.list_calls(), 3);
}

#[tokio::test]
async fn toggle_without_a_user_is_rejected() {
    let repo = catalog();
    let gateway = Arc::new(FakeSessionGateway::new());
    let validator = Arc::new(SessionManager::new(gateway, SessionConfig::default()));
    let coordinator = BookmarkCoordinator::new(repo.clone(), validator, CacheConfig::default());

    let result = coordinator.toggle_membership(&tool("tool-42")).await;

    assert_eq!(result, Err(BookmarkError::AuthRequired));
    assert_eq!(repo.add_calls(), 0);
}

#[tokio::test]
async fn toggle_without_a_session_is_rejected() {
    let repo = catalog();
    let user_id = UserId::new("alice");
    let gateway = Arc::new(FakeSessionGateway::new());
    let validator = Arc::new(SessionManager::new(gateway, SessionConfig::default()));
    let coordinator = BookmarkCoordinator::new(repo.clone(), validator, CacheConfig::default());
    coordinator.init(user_id);

    let result = coordinator.toggle_membership(&tool("tool-42")).await;

    assert_eq!(result, Err(BookmarkError::AuthRequired));
    assert!(!coordinator.is_member(&tool("tool-42")));
    assert_eq!(repo.add_calls(), 0);
}

#[tokio::test]
async fn pending_toggle_survives_a_concurrent_fetch() {
    let repo = catalog();
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_membership(false).await;
    let gate = repo.gate_mutations();

    let toggling = coordinator.clone();
    let toggle = tokio::spawn(async move { toggling.toggle_membership(&tool("tool-42")).await });
    gate.entered().await;

    let fetched = coordinator.fetch_membership(true).await;
    assert_eq!(fetched.value, vec![tool("tool-42")]);
    assert!(coordinator.is_member(&tool("tool-42")));

    gate.release();
    assert_eq!(toggle.await.unwrap(), Ok(ToggleOutcome::Added));
    assert!(coordinator.is_member(&tool("tool-42")));
}

#[tokio::test]
async fn clear_requires_confirmation() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_membership(false).await;

    let result = coordinator.clear_all_membership(false).await;

    assert_eq!(result, Err(BookmarkError::ConfirmationRequired));
    assert_eq!(repo.clear_calls(), 0);
    assert!(coordinator.is_member(&tool("tool-1")));
}

#[tokio::test]
async fn confirmed_clear_empties_and_broadcasts() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1", "tool-2"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_full_records().await;
    let mut events = coordinator.subscribe();

    coordinator.clear_all_membership(true).await.unwrap();

    assert!(coordinator.snapshot().membership.is_empty());
    assert!(coordinator.displayed_records().is_empty());
    assert!(repo.bookmarks_of(&UserId::new("alice")).is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        MembershipEvent::MembershipCleared {}
    );
}

#[tokio::test]
async fn failed_clear_keeps_membership() {
    let repo = catalog();
    repo.seed(&UserId::new("alice"), &["tool-1"]);
    let coordinator = coordinator_for(&repo, "alice");
    coordinator.fetch_membership(false).await;
    let mut events = coordinator.subscribe();
    repo.fail_next_clear(1);

    let result = coordinator.clear_all_membership(true).await;

    assert!(matches!(result, Err(BookmarkError::MutationFailed(_))));
    assert!(coordinator.is_member(&tool("tool-1")));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}
