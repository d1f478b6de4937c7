use crate::application_impl::optimistic::{self, MembershipDelta};
use crate::application_impl::{CacheEntry, Deadline, SingleFlight, with_deadline};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ids_ttl: Duration,
    pub records_ttl: Duration,
    pub page_size: PageSize,
    /// Default deadline for remote list calls; `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ids_ttl: Duration::from_secs(5 * 60),
            records_ttl: Duration::from_secs(15 * 60),
            page_size: PageSize::default(),
            fetch_timeout: None,
        }
    }
}

struct PendingToggle {
    token: u64,
    delta: MembershipDelta,
}

#[derive(Default)]
struct CoordinatorState {
    user_id: Option<UserId>,
    /// Bumped on every user change; results from an older generation are dropped.
    generation: u64,
    ids: Option<CacheEntry<Vec<ItemId>>>,
    records: Option<CacheEntry<Vec<BookmarkedTool>>>,
    membership: BTreeSet<ItemId>,
    pending: Vec<PendingToggle>,
    next_token: u64,
    displayed: usize,
    initialized: bool,
    loading: usize,
    error: Option<String>,
}

impl CoordinatorState {
    fn admit(&mut self, user_id: Option<UserId>) {
        let generation = self.generation + 1;
        let next_token = self.next_token;
        *self = CoordinatorState {
            user_id,
            generation,
            next_token,
            ..CoordinatorState::default()
        };
    }

    fn is_current(&self, user_id: &UserId, generation: u64) -> bool {
        self.generation == generation && self.user_id.as_ref() == Some(user_id)
    }

    fn pending_deltas(&self) -> Vec<MembershipDelta> {
        self.pending.iter().map(|p| p.delta.clone()).collect()
    }
}

/// One of the two cached collections.
trait CachedCollection: Clone + Default + Send + Sync + 'static {
    const KIND: CollectionKind;

    fn slot(state: &mut CoordinatorState) -> &mut Option<CacheEntry<Self>>;
    fn flights(inner: &Inner) -> &SingleFlight<CacheKey, Result<Self, String>>;
    fn ttl(config: &CacheConfig) -> Duration;
    fn from_entries(entries: Vec<BookmarkEntry>) -> Self;
    fn apply_delta(&mut self, delta: &MembershipDelta);
}

impl CachedCollection for Vec<ItemId> {
    const KIND: CollectionKind = CollectionKind::Ids;

    fn slot(state: &mut CoordinatorState) -> &mut Option<CacheEntry<Self>> {
        &mut state.ids
    }

    fn flights(inner: &Inner) -> &SingleFlight<CacheKey, Result<Self, String>> {
        &inner.ids_flights
    }

    fn ttl(config: &CacheConfig) -> Duration {
        config.ids_ttl
    }

    fn from_entries(entries: Vec<BookmarkEntry>) -> Self {
        entries.into_iter().map(|e| e.item_id).collect()
    }

    fn apply_delta(&mut self, delta: &MembershipDelta) {
        optimistic::apply_to_list(self, delta);
    }
}

impl CachedCollection for Vec<BookmarkedTool> {
    const KIND: CollectionKind = CollectionKind::Records;

    fn slot(state: &mut CoordinatorState) -> &mut Option<CacheEntry<Self>> {
        &mut state.records
    }

    fn flights(inner: &Inner) -> &SingleFlight<CacheKey, Result<Self, String>> {
        &inner.records_flights
    }

    fn ttl(config: &CacheConfig) -> Duration {
        config.records_ttl
    }

    fn from_entries(entries: Vec<BookmarkEntry>) -> Self {
        entries
            .into_iter()
            .filter_map(|entry| {
                let item_id = entry.item_id.clone();
                let joined = entry.into_joined();
                if joined.is_none() {
                    warn!(%item_id, "bookmark has no catalog record, skipping");
                }
                joined
            })
            .collect()
    }

    // An in-flight add has no record to show yet; only removals apply.
    fn apply_delta(&mut self, delta: &MembershipDelta) {
        if delta.action == MembershipAction::Removed {
            self.retain(|t| t.item_id != delta.item_id);
        }
    }
}

struct Inner {
    repo: Arc<dyn MembershipRepo>,
    validator: Arc<dyn SessionValidator>,
    config: CacheConfig,
    state: Mutex<CoordinatorState>,
    ids_flights: SingleFlight<CacheKey, Result<Vec<ItemId>, String>>,
    records_flights: SingleFlight<CacheKey, Result<Vec<BookmarkedTool>, String>>,
    events: broadcast::Sender<MembershipEvent>,
    cancel: Mutex<CancellationToken>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn renew_cancel_token(&self) {
        let mut cancel = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        cancel.cancel();
        *cancel = CancellationToken::new();
    }

    fn publish(&self, event: MembershipEvent) {
        debug!(event = event.name(), "publishing membership event");
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn record_error(&self, user_id: &UserId, generation: u64, message: &str) {
        let mut st = self.lock_state();
        if st.is_current(user_id, generation) {
            st.error = Some(message.to_string());
        }
    }

    async fn load<C: CachedCollection>(
        self: Arc<Self>,
        user_id: UserId,
        generation: u64,
        limit: Option<Duration>,
    ) -> Result<C, String> {
        let cancel = self.cancel_token();
        {
            let mut st = self.lock_state();
            if st.is_current(&user_id, generation) {
                st.loading += 1;
            }
        }

        debug!(%user_id, kind = %C::KIND, "fetching bookmarks");
        let join_records = C::KIND == CollectionKind::Records;
        let outcome = with_deadline(
            self.repo.list_membership(&user_id, join_records),
            limit,
            &cancel,
        )
        .await;

        let result = match outcome {
            // ids come from every entry, joined or not
            Deadline::Ok(entries) => {
                let ids: Vec<ItemId> = entries.iter().map(|e| e.item_id.clone()).collect();
                Ok((C::from_entries(entries), ids))
            }
            Deadline::Err(e) => Err(BookmarkError::FetchFailed(e.to_string()).to_string()),
            Deadline::Timeout => Err(BookmarkError::FetchFailed(format!(
                "timed out after {} ms",
                limit.map(|l| l.as_millis()).unwrap_or_default()
            ))
            .to_string()),
            Deadline::Cancelled => {
                Err(BookmarkError::FetchFailed("cancelled".to_string()).to_string())
            }
        };

        self.store::<C>(&user_id, generation, result)
    }

    fn store<C: CachedCollection>(
        &self,
        user_id: &UserId,
        generation: u64,
        result: Result<(C, Vec<ItemId>), String>,
    ) -> Result<C, String> {
        let mut st = self.lock_state();
        if !st.is_current(user_id, generation) {
            debug!(%user_id, kind = %C::KIND, "discarding result for a previous session");
            return result.map(|(value, _)| value);
        }
        st.loading = st.loading.saturating_sub(1);
        st.initialized = true;

        match result {
            Ok((mut value, mut ids)) => {
                // toggles still in flight stay visible over fresher remote data
                let pending = st.pending_deltas();
                for delta in &pending {
                    value.apply_delta(delta);
                    optimistic::apply_to_list(&mut ids, delta);
                }

                st.membership = ids.iter().cloned().collect();
                st.error = None;
                *C::slot(&mut st) =
                    Some(CacheEntry::new(user_id.clone(), value.clone(), C::ttl(&self.config)));

                if C::KIND == CollectionKind::Records {
                    st.ids = Some(CacheEntry::new(user_id.clone(), ids, self.config.ids_ttl));
                    let total = st.records.as_ref().map(|e| e.value.len()).unwrap_or(0);
                    let page = self.config.page_size.get();
                    st.displayed = st.displayed.max(page).min(total);
                }

                info!(%user_id, kind = %C::KIND, count = st.membership.len(), "bookmarks cached");
                Ok(value)
            }
            Err(message) => {
                warn!(%user_id, kind = %C::KIND, "fetch failed: {}", message);
                *C::slot(&mut st) = None;
                st.error = Some(message.clone());
                Err(message)
            }
        }
    }
}

/// Cache coordinator for the signed-in user's bookmarks.
#[derive(Clone)]
pub struct BookmarkCoordinator {
    inner: Arc<Inner>,
}

impl BookmarkCoordinator {
    pub fn new(
        repo: Arc<dyn MembershipRepo>,
        validator: Arc<dyn SessionValidator>,
        config: CacheConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                repo,
                validator,
                config,
                state: Mutex::new(CoordinatorState::default()),
                ids_flights: SingleFlight::new(),
                records_flights: SingleFlight::new(),
                events,
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Admit `user_id`. Anything cached for a different user is dropped
    /// before the new user can read or write.
    pub fn init(&self, user_id: UserId) {
        let previous = {
            let mut st = self.inner.lock_state();
            if st.user_id.as_ref() == Some(&user_id) {
                return;
            }
            let previous = st.user_id.take();
            st.admit(Some(user_id.clone()));
            previous
        };
        self.inner.renew_cancel_token();
        match previous {
            Some(previous) => info!(%previous, %user_id, "bookmark user switched"),
            None => info!(%user_id, "bookmark user admitted"),
        }
    }

    pub fn switch_user(&self, user_id: UserId) {
        self.init(user_id);
    }

    /// Drop all state; in-flight fetches resolve as cancelled and their
    /// results are discarded.
    pub fn teardown(&self) {
        {
            let mut st = self.inner.lock_state();
            st.admit(None);
        }
        self.inner.renew_cancel_token();
        self.inner.ids_flights.clear();
        self.inner.records_flights.clear();
        info!("bookmark state torn down");
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.inner.lock_state().user_id.clone()
    }

    /// Reconcile the id list in the background; callers render `snapshot()`
    /// meanwhile.
    pub fn spawn_reconcile(&self) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let this = self.clone();
        Some(handle.spawn(async move {
            let result = this.fetch_membership_with(FetchOptions::default()).await;
            if let Some(e) = result.error {
                warn!("background reconcile failed: {}", e);
            }
        }))
    }

    async fn fetch<C: CachedCollection>(&self, options: FetchOptions) -> FetchResult<C> {
        let (user_id, generation, stale) = {
            let mut st = self.inner.lock_state();
            let user_id = match st.user_id.clone() {
                Some(user_id) => user_id,
                None => return FetchResult::fresh(C::default()),
            };
            let slot = C::slot(&mut st);
            if !options.force {
                if let Some(entry) = slot.as_ref().filter(|e| e.is_valid_for(&user_id)) {
                    trace!(%user_id, kind = %C::KIND, "cache hit");
                    return FetchResult::fresh(entry.value.clone());
                }
            }
            let stale = slot
                .as_ref()
                .filter(|e| e.belongs_to(&user_id))
                .map(|e| e.value.clone());
            (user_id, st.generation, stale)
        };

        if !self.inner.validator.ensure_valid_session().await {
            let message = BookmarkError::AuthRequired.to_string();
            self.inner.record_error(&user_id, generation, &message);
            let is_stale = stale.is_some();
            return FetchResult::degraded(stale.unwrap_or_default(), is_stale, message);
        }

        let key = CacheKey::new(user_id.clone(), C::KIND);
        let limit = options.timeout.or(self.inner.config.fetch_timeout);
        let inner = self.inner.clone();
        let make = move || inner.load::<C>(user_id, generation, limit);

        let flights = C::flights(&self.inner);
        let outcome = if options.force {
            flights.run_fresh(key, make()).await
        } else {
            flights.run(key, make).await
        };

        match outcome {
            Ok(value) => FetchResult::fresh(value),
            Err(message) => {
                let is_stale = stale.is_some();
                FetchResult::degraded(stale.unwrap_or_default(), is_stale, message)
            }
        }
    }
}

#[async_trait::async_trait]
impl BookmarkService for BookmarkCoordinator {
    async fn fetch_membership_with(&self, options: FetchOptions) -> FetchResult<Vec<ItemId>> {
        self.fetch::<Vec<ItemId>>(options).await
    }

    async fn fetch_full_records_with(
        &self,
        options: FetchOptions,
    ) -> FetchResult<Vec<BookmarkedTool>> {
        self.fetch::<Vec<BookmarkedTool>>(options).await
    }

    async fn toggle_membership(&self, item_id: &ItemId) -> Result<ToggleOutcome, BookmarkError> {
        let (user_id, generation) = {
            let st = self.inner.lock_state();
            match st.user_id.clone() {
                Some(user_id) => (user_id, st.generation),
                None => return Err(BookmarkError::AuthRequired),
            }
        };

        if !self.inner.validator.ensure_valid_session().await {
            return Err(BookmarkError::AuthRequired);
        }

        let (delta, token) = {
            let mut st = self.inner.lock_state();
            if !st.is_current(&user_id, generation) {
                return Err(BookmarkError::AuthRequired);
            }
            let delta = MembershipDelta::toggle(&st.membership, item_id);
            st.membership = optimistic::apply(&st.membership, &delta).into_state();
            if let Some(entry) = st.ids.as_mut() {
                optimistic::apply_to_list(&mut entry.value, &delta);
            }
            let token = st.next_token;
            st.next_token += 1;
            st.pending.push(PendingToggle {
                token,
                delta: delta.clone(),
            });
            (delta, token)
        };
        debug!(%user_id, %item_id, action = ?delta.action, "optimistic toggle applied");

        let remote = match delta.action {
            MembershipAction::Added => self
                .inner
                .repo
                .add_membership(&user_id, item_id)
                .await
                .map(Some),
            MembershipAction::Removed => self
                .inner
                .repo
                .remove_membership(&user_id, item_id)
                .await
                .map(|_| None),
        };

        let outcome = {
            let mut st = self.inner.lock_state();
            let current = st.is_current(&user_id, generation);
            if current {
                st.pending.retain(|p| p.token != token);
            }

            match remote {
                Err(e) => {
                    if current {
                        st.membership = optimistic::revert(&st.membership, &delta);
                        if let Some(entry) = st.ids.as_mut() {
                            optimistic::apply_to_list(&mut entry.value, &delta.inverse());
                        }
                        // a fetch may have cached records without the item meanwhile
                        if delta.action == MembershipAction::Removed {
                            st.records = None;
                        }
                        st.error = Some(e.to_string());
                    }
                    warn!(%user_id, %item_id, "toggle failed, rolled back: {}", e);
                    return Err(BookmarkError::MutationFailed(e.to_string()));
                }
                Ok(Some(AddOutcome::AlreadyExists)) => {
                    if current {
                        st.records = None;
                    }
                    debug!(%user_id, %item_id, "already bookmarked remotely");
                    return Ok(ToggleOutcome::AlreadyExists);
                }
                Ok(_) => {
                    if current {
                        match delta.action {
                            // the new bookmark needs a join before it can be shown
                            MembershipAction::Added => st.records = None,
                            MembershipAction::Removed => {
                                if let Some(entry) = st.records.as_mut() {
                                    entry.value.retain(|t| t.item_id != *item_id);
                                    let total = entry.value.len();
                                    st.displayed = st.displayed.min(total);
                                }
                            }
                        }
                    }
                    match delta.action {
                        MembershipAction::Added => ToggleOutcome::Added,
                        MembershipAction::Removed => ToggleOutcome::Removed,
                    }
                }
            }
        };

        info!(%user_id, %item_id, ?outcome, "bookmark toggled");
        self.inner.publish(MembershipEvent::MembershipChanged {
            action: delta.action,
            item_id: item_id.clone(),
        });
        Ok(outcome)
    }

    async fn clear_all_membership(&self, confirmed: bool) -> Result<(), BookmarkError> {
        if !confirmed {
            return Err(BookmarkError::ConfirmationRequired);
        }

        let (user_id, generation) = {
            let st = self.inner.lock_state();
            match st.user_id.clone() {
                Some(user_id) => (user_id, st.generation),
                None => return Err(BookmarkError::AuthRequired),
            }
        };

        if !self.inner.validator.ensure_valid_session().await {
            return Err(BookmarkError::AuthRequired);
        }

        if let Err(e) = self.inner.repo.clear_membership(&user_id).await {
            warn!(%user_id, "clear bookmarks failed: {}", e);
            self.inner.record_error(&user_id, generation, &e.to_string());
            return Err(BookmarkError::MutationFailed(e.to_string()));
        }

        {
            let mut st = self.inner.lock_state();
            if st.is_current(&user_id, generation) {
                st.membership.clear();
                st.ids = None;
                st.records = None;
                st.displayed = 0;
                st.error = None;
            }
        }

        info!(%user_id, "bookmarks cleared");
        self.inner.publish(MembershipEvent::MembershipCleared {});
        Ok(())
    }

    async fn refresh_membership(&self) -> FetchResult<Vec<BookmarkedTool>> {
        {
            let mut st = self.inner.lock_state();
            st.displayed = 0;
        }
        self.fetch_full_records_with(FetchOptions::forced()).await
    }

    fn load_more(&self) -> LoadMore {
        let page = self.inner.config.page_size.get();
        let mut st = self.inner.lock_state();
        let (items, end, total) = match (st.user_id.as_ref(), st.records.as_ref()) {
            (Some(user_id), Some(entry)) if entry.belongs_to(user_id) => {
                let total = entry.value.len();
                let start = st.displayed.min(total);
                let end = (start + page).min(total);
                (entry.value[start..end].to_vec(), end, total)
            }
            _ => {
                return LoadMore {
                    items: Vec::new(),
                    has_more: false,
                };
            }
        };
        st.displayed = end;
        LoadMore {
            items,
            has_more: end < total,
        }
    }

    fn displayed_records(&self) -> Vec<BookmarkedTool> {
        let st = self.inner.lock_state();
        match st.records.as_ref() {
            Some(entry) => entry.value.iter().take(st.displayed).cloned().collect(),
            None => Vec::new(),
        }
    }

    fn is_member(&self, item_id: &ItemId) -> bool {
        self.inner.lock_state().membership.contains(item_id)
    }

    fn snapshot(&self) -> BookmarkSnapshot {
        let st = self.inner.lock_state();
        BookmarkSnapshot {
            user_id: st.user_id.clone(),
            membership: st.membership.iter().cloned().collect(),
            initialized: st.initialized,
            loading: st.loading > 0,
            error: st.error.clone(),
            displayed: st.displayed,
            total_records: st.records.as_ref().map(|e| e.value.len()).unwrap_or(0),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.inner.events.subscribe()
    }
}
