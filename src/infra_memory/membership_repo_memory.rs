use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};

/// Holds every add/remove/clear until released, one release per call.
pub struct MutationGate {
    parked: watch::Sender<usize>,
    release: Semaphore,
}

impl Default for MutationGate {
    fn default() -> Self {
        Self {
            parked: watch::Sender::new(0),
            release: Semaphore::new(0),
        }
    }
}

impl MutationGate {
    /// Resolves once a mutation is parked at the gate.
    pub async fn entered(&self) {
        self.parked_at_least(1).await;
    }

    /// Resolves once `count` mutations in total have reached the gate.
    pub async fn parked_at_least(&self, count: usize) {
        let mut rx = self.parked.subscribe();
        // the sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|parked| *parked >= count).await;
    }

    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.parked.send_modify(|parked| *parked += 1);
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Default)]
struct Failures {
    list: usize,
    add: usize,
    remove: usize,
    clear: usize,
}

fn take_failure(counter: &mut usize, op: &str) -> Result<(), DataServiceError> {
    if *counter > 0 {
        *counter -= 1;
        return Err(DataServiceError::Store(format!("simulated {} failure", op)));
    }
    Ok(())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-process data service: a tool catalog plus per-user bookmark lists.
/// Counts remote calls and can inject latency and failures.
#[derive(Default)]
pub struct InMemoryMembershipRepo {
    catalog: Mutex<HashMap<ItemId, ToolRecord>>,
    bookmarks: Mutex<HashMap<UserId, Vec<(ItemId, DateTime<Utc>)>>>,
    latency: Mutex<Duration>,
    failures: Mutex<Failures>,
    gate: Mutex<Option<Arc<MutationGate>>>,
    list_calls: AtomicUsize,
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl InMemoryMembershipRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tool(&self, record: ToolRecord) {
        lock(&self.catalog).insert(record.id.clone(), record);
    }

    /// Catalog entry with placeholder text, handy for demos and tests.
    pub fn insert_named_tool(&self, id: &str, name: &str) {
        self.insert_tool(ToolRecord {
            id: ItemId::from(id),
            name: name.to_string(),
            description: format!("{} tool", name),
            category: "general".to_string(),
            url: None,
            created_at: Utc::now(),
        });
    }

    pub fn seed(&self, user_id: &UserId, items: &[&str]) {
        let mut bookmarks = lock(&self.bookmarks);
        let list = bookmarks.entry(user_id.clone()).or_default();
        for item in items {
            let item_id = ItemId::from(*item);
            if !list.iter().any(|(id, _)| *id == item_id) {
                list.push((item_id, Utc::now()));
            }
        }
    }

    pub fn bookmarks_of(&self, user_id: &UserId) -> Vec<ItemId> {
        lock(&self.bookmarks)
            .get(user_id)
            .map(|list| list.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn fail_next_list(&self, times: usize) {
        lock(&self.failures).list = times;
    }

    pub fn fail_next_add(&self, times: usize) {
        lock(&self.failures).add = times;
    }

    pub fn fail_next_remove(&self, times: usize) {
        lock(&self.failures).remove = times;
    }

    pub fn fail_next_clear(&self, times: usize) {
        lock(&self.failures).clear = times;
    }

    pub fn gate_mutations(&self) -> Arc<MutationGate> {
        let gate = Arc::new(MutationGate::default());
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn mutation_gate(&self) {
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
    }
}

#[async_trait::async_trait]
impl MembershipRepo for InMemoryMembershipRepo {
    async fn list_membership(
        &self,
        user_id: &UserId,
        join_records: bool,
    ) -> Result<Vec<BookmarkEntry>, DataServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        take_failure(&mut lock(&self.failures).list, "list")?;

        let list = lock(&self.bookmarks)
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        let catalog = lock(&self.catalog);
        Ok(list
            .into_iter()
            .map(|(item_id, bookmarked_at)| {
                let record = if join_records {
                    catalog.get(&item_id).cloned()
                } else {
                    None
                };
                BookmarkEntry {
                    item_id,
                    bookmarked_at,
                    record,
                }
            })
            .collect())
    }

    async fn add_membership(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<AddOutcome, DataServiceError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.mutation_gate().await;
        take_failure(&mut lock(&self.failures).add, "add")?;

        let mut bookmarks = lock(&self.bookmarks);
        let list = bookmarks.entry(user_id.clone()).or_default();
        if list.iter().any(|(id, _)| id == item_id) {
            return Ok(AddOutcome::AlreadyExists);
        }
        list.push((item_id.clone(), Utc::now()));
        Ok(AddOutcome::Added)
    }

    async fn remove_membership(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<(), DataServiceError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.mutation_gate().await;
        take_failure(&mut lock(&self.failures).remove, "remove")?;

        if let Some(list) = lock(&self.bookmarks).get_mut(user_id) {
            list.retain(|(id, _)| id != item_id);
        }
        Ok(())
    }

    async fn clear_membership(&self, user_id: &UserId) -> Result<(), DataServiceError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.mutation_gate().await;
        take_failure(&mut lock(&self.failures).clear, "clear")?;

        lock(&self.bookmarks).remove(user_id);
        Ok(())
    }
}
