//! Optimistic entry store.
//!
//! One [`EntryStore`] holds one record type's collection for one signed-in
//! owner. The UI reads snapshots and calls `create`/`delete`; the store applies
//! each mutation locally first, then reconciles with the remote store.
//!
//! ## Protocols
//!
//! - **create**: a `Pending` entry with a transient id is prepended before any
//!   network activity. On success it is replaced in place by the confirmed
//!   entry; on failure it is removed and the error is returned.
//! - **delete**: the entry is removed immediately. On failure the collection is
//!   restored according to the [`RollbackPolicy`].
//! - **load**: replaces the whole collection with what the gateway returned.
//!   Whichever load or mutation settles last wins.
//!
//! The collection lives in a single `watch` cell. Every mutation is one
//! synchronous update; no lock is held across an await.
//!
//! The network half of a mutation runs on its own task, so dropping the
//! future returned by `create` or `delete` never strands a half-applied
//! change. A cancelled `load` leaves the collection as it was.

mod adapters;
mod invalidator;
mod live;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gateway::{GatewayError, RemoteGateway};
use crate::models::{now_millis, Draft, Entry, EntryId, NewEntry, OwnerId, Payload};

pub use adapters::{BathroomStore, FoodStore, TherapyStore, WaterStore};
pub use invalidator::RealtimeInvalidator;
pub use live::LiveStore;

/// Errors returned by store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("No owner loaded; call load first")]
    NotSignedIn,

    #[error("Entry {0} is still pending and cannot be deleted yet")]
    PendingEntry(EntryId),

    #[error("Store has been closed")]
    Closed,

    #[error("Background sync task failed: {0}")]
    Task(String),
}

/// How a failed delete puts the collection back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackPolicy {
    /// Restore the whole collection captured before the delete. Undoes any
    /// other change that landed while the delete was in flight.
    #[default]
    Snapshot,
    /// Re-insert only the deleted entry at its old position.
    Entry,
}

impl fmt::Display for RollbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackPolicy::Snapshot => write!(f, "snapshot"),
            RollbackPolicy::Entry => write!(f, "entry"),
        }
    }
}

impl FromStr for RollbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snapshot" => Ok(RollbackPolicy::Snapshot),
            "entry" => Ok(RollbackPolicy::Entry),
            _ => Err(format!(
                "Invalid rollback policy '{}'. Valid options: snapshot, entry",
                s
            )),
        }
    }
}

/// Observable state of a store.
#[derive(Debug, Clone)]
pub struct StoreState<P> {
    /// Owner the collection belongs to, once loaded.
    pub owner: Option<OwnerId>,
    /// Newest-first by insertion; pending entries sit at the head.
    pub entries: Vec<Entry<P>>,
    pub loading: bool,
    /// Last load failure. Cleared by the next successful load.
    pub error: Option<StoreError>,
}

impl<P> Default for StoreState<P> {
    fn default() -> Self {
        Self {
            owner: None,
            entries: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// What a failed delete needs to undo itself.
struct DeleteRollback<P> {
    epoch: u64,
    snapshot: Vec<Entry<P>>,
    removed: Option<(usize, Entry<P>)>,
}

struct Shared<P, G> {
    gateway: G,
    state: watch::Sender<StoreState<P>>,
    /// Bumped on owner change and on close; stale continuations compare against it.
    epoch: AtomicU64,
    loads_in_flight: AtomicUsize,
    closed: AtomicBool,
    rollback: RollbackPolicy,
}

/// Optimistic store for one record type.
///
/// Cloning is cheap and yields a handle to the same collection.
pub struct EntryStore<P, G> {
    shared: Arc<Shared<P, G>>,
}

impl<P, G> Clone for EntryStore<P, G> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Payload, G: RemoteGateway<P>> EntryStore<P, G> {
    pub fn new(gateway: G) -> Self {
        Self::with_policy(gateway, RollbackPolicy::default())
    }

    pub fn with_policy(gateway: G, rollback: RollbackPolicy) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            shared: Arc::new(Shared {
                gateway,
                state,
                epoch: AtomicU64::new(0),
                loads_in_flight: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                rollback,
            }),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.shared.gateway
    }

    pub fn rollback_policy(&self) -> RollbackPolicy {
        self.shared.rollback
    }

    /// Copy of the current collection.
    pub fn entries(&self) -> Vec<Entry<P>> {
        self.shared.state.borrow().entries.clone()
    }

    /// Runs `f` against the current collection without copying it.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[Entry<P>]) -> R) -> R {
        f(&self.shared.state.borrow().entries)
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.shared.state.borrow().owner.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn error(&self) -> Option<StoreError> {
        self.shared.state.borrow().error.clone()
    }

    /// Receiver that wakes on every state change.
    pub fn watch(&self) -> watch::Receiver<StoreState<P>> {
        self.shared.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Tears the store down. Outstanding mutations still run to completion but
    /// no longer touch the collection. Idempotent.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Closed {} store", P::RECORD_TYPE);
        }
    }

    /// Fetches the owner's whole collection and replaces local state with it.
    ///
    /// Loading a different owner than the current one clears the collection
    /// first and detaches every in-flight mutation of the previous owner. On
    /// failure the previous collection stays and the error is published.
    pub async fn load(&self, owner: &OwnerId) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let epoch = self.shared.bind_owner(owner);
        let mut in_flight = LoadInFlight::begin(&self.shared);

        let result = self.shared.gateway.fetch_all(owner).await;

        let still_loading = in_flight.finish();
        if !self.shared.is_current(epoch) {
            self.shared
                .state
                .send_modify(|state| state.loading = still_loading);
            tracing::debug!("Dropped stale {} load for {}", P::RECORD_TYPE, owner);
            return if self.is_closed() {
                Err(StoreError::Closed)
            } else {
                Ok(())
            };
        }

        match result {
            Ok(entries) => {
                tracing::debug!(
                    "Loaded {} {} entries for {}",
                    entries.len(),
                    P::RECORD_TYPE,
                    owner
                );
                self.shared.state.send_modify(|state| {
                    state.entries = entries;
                    state.loading = still_loading;
                    state.error = None;
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load {} for {}: {}", P::RECORD_TYPE, owner, e);
                let error = StoreError::from(e);
                self.shared.state.send_modify(|state| {
                    state.loading = still_loading;
                    state.error = Some(error.clone());
                });
                Err(error)
            }
        }
    }

    /// Optimistically creates an entry.
    ///
    /// The pending entry is visible as soon as this returns, before the
    /// returned future is first polled. The remote call is already running on
    /// a spawned task; the future only reports its outcome, and dropping it
    /// does not stop reconciliation. Must be called within a Tokio runtime.
    pub fn create(
        &self,
        draft: Draft<P>,
    ) -> impl Future<Output = Result<Entry<P>, StoreError>> + Send + 'static {
        let task = self.begin_create(draft).map(|(transient_id, request, epoch)| {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                match shared.gateway.create(request).await {
                    Ok(confirmed) => {
                        shared.confirm_create(&transient_id, &confirmed, epoch);
                        Ok(confirmed)
                    }
                    Err(e) => {
                        tracing::debug!("Create of {} failed: {}", transient_id, e);
                        shared.discard_create(&transient_id, epoch);
                        Err(StoreError::from(e))
                    }
                }
            })
        });

        async move { join(task?).await }
    }

    /// Optimistically deletes a confirmed entry.
    ///
    /// The entry disappears as soon as this returns. If the remote delete
    /// fails the collection is restored before the error is returned. As with
    /// `create`, the remote call runs on a spawned task.
    pub fn delete(
        &self,
        id: &EntryId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send + 'static {
        let task = self.begin_delete(id).map(|rollback| {
            let shared = Arc::clone(&self.shared);
            let id = id.clone();
            tokio::spawn(async move {
                match shared.gateway.delete(&id).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        tracing::debug!("Delete of {} failed: {}", id, e);
                        shared.rollback_delete(rollback);
                        Err(StoreError::from(e))
                    }
                }
            })
        });

        async move { join(task?).await }
    }

    fn begin_create(&self, draft: Draft<P>) -> Result<(EntryId, NewEntry<P>, u64), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let owner = self.owner().ok_or(StoreError::NotSignedIn)?;

        let now = now_millis();
        let transient_id = EntryId::transient(now);
        let timestamp = draft.timestamp.unwrap_or(now);
        let pending = Entry::pending(
            transient_id.clone(),
            owner.clone(),
            timestamp,
            draft.payload.clone(),
        );

        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        // Head insertion even for backdated timestamps; the next load re-orders
        self.shared
            .state
            .send_modify(|state| state.entries.insert(0, pending));

        let request = NewEntry {
            owner_id: owner,
            timestamp,
            payload: draft.payload,
        };
        Ok((transient_id, request, epoch))
    }

    fn begin_delete(&self, id: &EntryId) -> Result<DeleteRollback<P>, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        if self.owner().is_none() {
            return Err(StoreError::NotSignedIn);
        }
        if id.is_transient() {
            return Err(StoreError::PendingEntry(id.clone()));
        }

        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        let mut captured = None;
        self.shared.state.send_if_modified(|state| {
            let snapshot = state.entries.clone();
            let removed = state
                .entries
                .iter()
                .position(|entry| &entry.id == id)
                .map(|position| (position, state.entries.remove(position)));
            let modified = removed.is_some();
            captured = Some((snapshot, removed));
            modified
        });

        let (snapshot, removed) = captured.unwrap_or_default();
        if removed.is_none() {
            tracing::debug!("Deleting {} which is not in the local collection", id);
        }

        Ok(DeleteRollback {
            epoch,
            snapshot,
            removed,
        })
    }
}

/// Waits for a mutation's network task.
async fn join<T>(task: JoinHandle<Result<T, StoreError>>) -> Result<T, StoreError> {
    task.await.unwrap_or_else(|e| Err(StoreError::Task(e.to_string())))
}

/// Counts one load as in flight until finished or dropped.
struct LoadInFlight<'a, P, G> {
    shared: &'a Shared<P, G>,
    finished: bool,
}

impl<'a, P, G> LoadInFlight<'a, P, G> {
    fn begin(shared: &'a Shared<P, G>) -> Self {
        shared.loads_in_flight.fetch_add(1, Ordering::SeqCst);
        shared.state.send_modify(|state| state.loading = true);
        Self {
            shared,
            finished: false,
        }
    }

    /// Returns whether other loads are still running.
    fn finish(&mut self) -> bool {
        self.finished = true;
        self.shared.loads_in_flight.fetch_sub(1, Ordering::SeqCst) > 1
    }
}

impl<P, G> Drop for LoadInFlight<'_, P, G> {
    fn drop(&mut self) {
        if !self.finished {
            // Cancelled mid-fetch
            let still_loading = self.finish();
            self.shared
                .state
                .send_modify(|state| state.loading = still_loading);
        }
    }
}

impl<P: Payload, G> Shared<P, G> {
    fn is_current(&self, epoch: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Makes `owner` the current owner, resetting the collection on a switch.
    fn bind_owner(&self, owner: &OwnerId) -> u64 {
        self.state.send_if_modified(|state| {
            if state.owner.as_ref() == Some(owner) {
                return false;
            }
            if let Some(previous) = &state.owner {
                tracing::info!(
                    "Switching {} store from {} to {}",
                    P::RECORD_TYPE,
                    previous,
                    owner
                );
            }
            state.owner = Some(owner.clone());
            state.entries.clear();
            state.error = None;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            true
        });
        self.epoch.load(Ordering::SeqCst)
    }

    /// Swaps the pending entry for the confirmed one, in place.
    fn confirm_create(&self, transient_id: &EntryId, confirmed: &Entry<P>, epoch: u64) {
        if !self.is_current(epoch) {
            tracing::debug!("Ignoring confirmation of {} after teardown", transient_id);
            return;
        }

        let reconciled = self.state.send_if_modified(|state| {
            let Some(position) = state.entries.iter().position(|e| &e.id == transient_id) else {
                return false;
            };
            if state.entries.iter().any(|e| e.id == confirmed.id) {
                // A reload already brought the durable entry in
                state.entries.remove(position);
            } else {
                state.entries[position] = confirmed.clone();
            }
            true
        });

        if !reconciled {
            tracing::debug!(
                "Pending entry {} was replaced by a reload; {} arrives with the next one",
                transient_id,
                confirmed.id
            );
        }
    }

    fn discard_create(&self, transient_id: &EntryId, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        self.state.send_if_modified(|state| {
            let before = state.entries.len();
            state.entries.retain(|e| &e.id != transient_id);
            state.entries.len() != before
        });
    }

    fn rollback_delete(&self, rollback: DeleteRollback<P>) {
        if !self.is_current(rollback.epoch) {
            tracing::debug!("Skipping delete rollback after teardown");
            return;
        }

        match self.rollback {
            RollbackPolicy::Snapshot => {
                self.state
                    .send_modify(|state| state.entries = rollback.snapshot);
            }
            RollbackPolicy::Entry => {
                let Some((position, entry)) = rollback.removed else {
                    return;
                };
                self.state.send_if_modified(|state| {
                    if state.entries.iter().any(|e| e.id == entry.id) {
                        return false;
                    }
                    let position = position.min(state.entries.len());
                    state.entries.insert(position, entry);
                    true
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{settle, ScriptedGateway};
    use crate::gateway::MemoryGateway;
    use crate::models::{VolumeUnit, WaterIntake};
    use futures::FutureExt;

    type Store = EntryStore<WaterIntake, Arc<ScriptedGateway<WaterIntake>>>;

    fn owner() -> OwnerId {
        OwnerId::new("user1")
    }

    fn water(oz: f64) -> Draft<WaterIntake> {
        Draft::new(WaterIntake::new(oz, VolumeUnit::FlOz))
    }

    fn ids(store: &Store) -> Vec<EntryId> {
        store.entries().into_iter().map(|e| e.id).collect()
    }

    /// Store loaded with three remote entries, newest first.
    async fn loaded_store(
        policy: RollbackPolicy,
    ) -> (Store, Arc<ScriptedGateway<WaterIntake>>) {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.seed(&owner(), 3_000, WaterIntake::new(8.0, VolumeUnit::FlOz));
        gateway.seed(&owner(), 2_000, WaterIntake::new(12.0, VolumeUnit::FlOz));
        gateway.seed(&owner(), 1_000, WaterIntake::new(250.0, VolumeUnit::Ml));

        let store = EntryStore::with_policy(Arc::clone(&gateway), policy);
        store.load(&owner()).await.unwrap();
        (store, gateway)
    }

    #[tokio::test]
    async fn test_load_replaces_collection_in_gateway_order() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;

        assert_eq!(store.entries(), gateway.remote(&owner()));
        assert_eq!(store.owner(), Some(owner()));
        assert!(!store.is_loading());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_stale_collection() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = store.entries();

        gateway.fail_fetch(true);
        let result = store.load(&owner()).await;

        assert!(matches!(result, Err(StoreError::Gateway(_))));
        assert_eq!(store.entries(), before);
        assert!(store.error().is_some());
        assert!(!store.is_loading());

        gateway.fail_fetch(false);
        store.load(&owner()).await.unwrap();
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_create_is_visible_before_network() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_creates(true);

        let pending = store.create(water(16.0));

        let entries = store.entries();
        assert_eq!(entries.len(), 4);
        assert!(entries[0].id.is_transient());
        assert_eq!(entries[0].state(), crate::models::EntryState::Pending);
        assert_eq!(gateway.create_calls(), 0);

        let handle = tokio::spawn(pending);
        settle(|| gateway.held_creates() == 1).await;
        gateway.release_create(0);
        let confirmed = handle.await.unwrap().unwrap();

        assert!(!confirmed.id.is_transient());
        assert_eq!(store.entries()[0].id, confirmed.id);
    }

    #[tokio::test]
    async fn test_create_success_replaces_transient_in_place() {
        let (store, _gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = ids(&store);

        let confirmed = store.create(water(16.0)).await.unwrap();

        let after = ids(&store);
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after[0], confirmed.id);
        assert_eq!(&after[1..], &before[..]);
        assert_eq!(after.iter().filter(|id| **id == confirmed.id).count(), 1);
        assert!(after.iter().all(|id| !id.is_transient()));
    }

    #[tokio::test]
    async fn test_create_failure_restores_collection() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = ids(&store);
        gateway.fail_create(true);

        let result = store.create(water(16.0)).await;

        assert!(matches!(result, Err(StoreError::Gateway(_))));
        assert_eq!(ids(&store), before);
        assert!(ids(&store).iter().all(|id| !id.is_transient()));
    }

    #[tokio::test]
    async fn test_create_requires_owner() {
        let store = EntryStore::new(Arc::new(ScriptedGateway::<WaterIntake>::new()));
        let result = store.create(water(8.0)).await;
        assert_eq!(result, Err(StoreError::NotSignedIn));
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_backdated_create_still_goes_to_head() {
        let (store, _gateway) = loaded_store(RollbackPolicy::Snapshot).await;

        let confirmed = store.create(water(4.0).at(500)).await.unwrap();

        let entries = store.entries();
        assert_eq!(entries[0].id, confirmed.id);
        assert_eq!(entries[0].timestamp, 500);
    }

    #[tokio::test]
    async fn test_concurrent_creates_reconcile_independently() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_creates(true);

        let first = store.create(water(8.0));
        settle(|| gateway.held_creates() == 1).await;
        let second = store.create(water(16.0));
        settle(|| gateway.held_creates() == 2).await;

        let pending: Vec<EntryId> = store
            .entries()
            .iter()
            .filter(|e| e.id.is_transient())
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(pending.len(), 2);
        assert_ne!(pending[0], pending[1]);

        // Second call settles first
        gateway.release_create(1);
        let second = second.await.unwrap();
        assert_eq!(store.entries()[0].id, second.id);
        assert!(store.entries()[1].id.is_transient());

        gateway.release_create(0);
        let first = first.await.unwrap();

        let entries = store.entries();
        assert_eq!(entries[0].id, second.id);
        assert_eq!(entries[1].id, first.id);
        assert_eq!(entries[0].payload.amount, 16.0);
        assert_eq!(entries[1].payload.amount, 8.0);
        assert!(entries.iter().all(|e| !e.id.is_transient()));
    }

    #[tokio::test]
    async fn test_dropped_create_still_reconciles() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;

        drop(store.create(water(16.0)));
        assert!(store.entries()[0].id.is_transient());

        settle(|| store.entries().iter().all(|e| !e.id.is_transient())).await;
        assert_eq!(gateway.create_calls(), 1);
        assert_eq!(store.entries().len(), 4);
        assert_eq!(store.entries(), gateway.remote(&owner()));
    }

    #[tokio::test]
    async fn test_dropped_create_failure_still_rolls_back() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = ids(&store);
        gateway.fail_create(true);

        drop(store.create(water(16.0)));

        settle(|| gateway.create_calls() == 1 && ids(&store) == before).await;
    }

    #[tokio::test]
    async fn test_dropped_delete_still_reaches_remote() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let target = store.entries()[1].id.clone();

        drop(store.delete(&target));

        settle(|| gateway.remote(&owner()).len() == 2).await;
        assert_eq!(gateway.delete_calls(), 1);
        assert_eq!(store.entries(), gateway.remote(&owner()));
    }

    #[tokio::test]
    async fn test_dropped_delete_failure_still_restores() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = ids(&store);
        gateway.fail_delete(true);

        drop(store.delete(&before[0]));
        assert_eq!(store.entries().len(), 2);

        settle(|| ids(&store) == before).await;
        assert_eq!(gateway.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_load_clears_loading() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = store.entries();
        gateway.hold_fetches(true);

        // Polled once, parked on the held fetch, then dropped
        assert!(store.load(&owner()).now_or_never().is_none());
        assert_eq!(gateway.held_fetches(), 1);
        assert!(!store.is_loading());
        assert_eq!(store.entries(), before);

        gateway.hold_fetches(false);
        store.load(&owner()).await.unwrap();
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_cancelled_load_keeps_other_load_in_flight() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_fetches(true);

        let background = {
            let store = store.clone();
            tokio::spawn(async move { store.load(&owner()).await })
        };
        settle(|| gateway.held_fetches() == 1).await;

        assert!(store.load(&owner()).now_or_never().is_none());
        assert!(store.is_loading());

        gateway.release_fetch(0);
        background.await.unwrap().unwrap();
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_reload_during_create_drops_pending_then_miss_is_silent() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_creates(true);

        let handle = tokio::spawn(store.create(water(16.0)));
        settle(|| gateway.held_creates() == 1).await;

        // Invalidation lands before the create resolves
        store.load(&owner()).await.unwrap();
        assert!(store.entries().iter().all(|e| !e.id.is_transient()));

        gateway.release_create(0);
        let confirmed = handle.await.unwrap().unwrap();

        // Reconciliation miss: not inserted until the next load
        assert!(store.entries().iter().all(|e| e.id != confirmed.id));
        store.load(&owner()).await.unwrap();
        assert_eq!(store.entries()[0].id, confirmed.id);
        assert_eq!(store.entries(), gateway.remote(&owner()));
    }

    #[tokio::test]
    async fn test_delete_success() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let target = store.entries()[1].id.clone();

        store.delete(&target).await.unwrap();
        assert!(store.entries().iter().all(|e| e.id != target));

        store.load(&owner()).await.unwrap();
        assert!(store.entries().iter().all(|e| e.id != target));
        assert_eq!(store.entries(), gateway.remote(&owner()));
    }

    #[tokio::test]
    async fn test_delete_is_optimistic() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let target = store.entries()[0].id.clone();
        gateway.fail_delete(true);

        let pending = store.delete(&target);
        assert!(store.entries().iter().all(|e| e.id != target));

        assert!(pending.await.is_err());
        assert_eq!(store.entries()[0].id, target);
    }

    #[tokio::test]
    async fn test_delete_failure_restores_snapshot_even_over_other_changes() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        let before = ids(&store);
        let target = before[1].clone();
        gateway.fail_delete(true);
        gateway.hold_deletes(true);

        let handle = tokio::spawn(store.delete(&target));
        settle(|| gateway.held_deletes() == 1).await;

        // An unrelated create completes while the delete is in flight
        let created = store.create(water(20.0)).await.unwrap();
        assert!(ids(&store).contains(&created.id));

        gateway.release_delete(0);
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(StoreError::Gateway(_))));
        assert_eq!(ids(&store), before);
    }

    #[tokio::test]
    async fn test_delete_failure_with_entry_policy_keeps_other_changes() {
        let (store, gateway) = loaded_store(RollbackPolicy::Entry).await;
        let before = ids(&store);
        let target = before[1].clone();
        gateway.fail_delete(true);
        gateway.hold_deletes(true);

        let handle = tokio::spawn(store.delete(&target));
        settle(|| gateway.held_deletes() == 1).await;
        let created = store.create(water(20.0)).await.unwrap();

        gateway.release_delete(0);
        assert!(handle.await.unwrap().is_err());

        let after = ids(&store);
        assert_eq!(after.len(), 4);
        assert_eq!(after[0], created.id);
        assert_eq!(&after[1..], &before[..]);
    }

    #[tokio::test]
    async fn test_delete_pending_entry_rejected() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_creates(true);

        let _create = store.create(water(8.0));
        let transient = store.entries()[0].id.clone();
        let before = ids(&store);

        let result = store.delete(&transient).await;

        assert_eq!(result, Err(StoreError::PendingEntry(transient)));
        assert_eq!(ids(&store), before);
        assert_eq!(gateway.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_owner_switch_clears_and_detaches_mutations() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_deletes(true);
        gateway.fail_delete(true);
        let target = store.entries()[0].id.clone();

        let handle = tokio::spawn(store.delete(&target));
        settle(|| gateway.held_deletes() == 1).await;

        let other = OwnerId::new("user2");
        gateway.seed(&other, 5_000, WaterIntake::new(1.0, VolumeUnit::Cup));
        store.load(&other).await.unwrap();
        assert_eq!(store.entries(), gateway.remote(&other));

        gateway.release_delete(0);
        assert!(handle.await.unwrap().is_err());

        // The first owner's snapshot must not leak into the second owner's view
        assert_eq!(store.entries(), gateway.remote(&other));
    }

    #[tokio::test]
    async fn test_close_makes_late_settlement_a_no_op() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_creates(true);
        gateway.fail_create(true);

        let handle = tokio::spawn(store.create(water(8.0)));
        settle(|| gateway.held_creates() == 1).await;
        let frozen = store.entries();

        store.close();
        store.close();
        gateway.release_create(0);
        assert!(handle.await.unwrap().is_err());

        assert_eq!(store.entries(), frozen);
        assert_eq!(store.create(water(1.0)).await, Err(StoreError::Closed));
        assert_eq!(store.load(&owner()).await, Err(StoreError::Closed));
    }

    #[tokio::test]
    async fn test_watch_sees_optimistic_insert() {
        let (store, gateway) = loaded_store(RollbackPolicy::Snapshot).await;
        gateway.hold_creates(true);
        let mut rx = store.watch();
        assert!(!rx.has_changed().unwrap());

        let _create = store.create(water(8.0));

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().entries[0].id.is_transient());
    }

    #[tokio::test]
    async fn test_against_memory_gateway() {
        let gateway = MemoryGateway::<WaterIntake>::new();
        let store = EntryStore::new(gateway.clone());
        store.load(&owner()).await.unwrap();

        let a = store.create(water(8.0)).await.unwrap();
        let b = store.create(water(16.0).at(now_millis() + 1_000)).await.unwrap();
        store.delete(&a.id).await.unwrap();

        store.load(&owner()).await.unwrap();
        let remote = gateway.list(&owner()).await;
        assert_eq!(store.entries(), remote);
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].id, b.id);
    }

    #[test]
    fn test_rollback_policy_parse() {
        assert_eq!(
            RollbackPolicy::from_str("Snapshot").unwrap(),
            RollbackPolicy::Snapshot
        );
        assert_eq!(
            RollbackPolicy::from_str("entry").unwrap(),
            RollbackPolicy::Entry
        );
        assert!(RollbackPolicy::from_str("merge").is_err());
    }
}
