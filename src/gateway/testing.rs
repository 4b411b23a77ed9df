//! Scripted gateway for exercising the store's interleavings.
//!
//! Calls can be made to fail, and fetches, creates and deletes can be held
//! until a test releases them in whatever order it needs.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use super::memory::feed_from_receiver;
use super::{ChangeFeed, ChangeNotice, GatewayError, RemoteGateway};
use crate::models::{Entry, EntryId, NewEntry, OwnerId, Payload};

pub(crate) struct ScriptedGateway<P> {
    remote: Mutex<Vec<Entry<P>>>,
    notices: broadcast::Sender<ChangeNotice>,

    fail_fetch: AtomicBool,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    fail_subscribe: AtomicBool,

    hold_fetches: AtomicBool,
    hold_creates: AtomicBool,
    hold_deletes: AtomicBool,
    held_fetches: Mutex<Vec<oneshot::Sender<()>>>,
    held_creates: Mutex<Vec<oneshot::Sender<()>>>,
    held_deletes: Mutex<Vec<oneshot::Sender<()>>>,

    fetch_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl<P: Payload> ScriptedGateway<P> {
    pub(crate) fn new() -> Self {
        let (notices, _) = broadcast::channel(16);
        Self {
            remote: Mutex::new(Vec::new()),
            notices,
            fail_fetch: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            hold_fetches: AtomicBool::new(false),
            hold_creates: AtomicBool::new(false),
            hold_deletes: AtomicBool::new(false),
            held_fetches: Mutex::new(Vec::new()),
            held_creates: Mutex::new(Vec::new()),
            held_deletes: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Puts an entry straight into the remote collection.
    pub(crate) fn seed(&self, owner: &OwnerId, timestamp: i64, payload: P) -> Entry<P> {
        let entry = Entry {
            id: EntryId::durable(Uuid::new_v4().to_string()),
            owner_id: owner.clone(),
            timestamp,
            record_type: P::RECORD_TYPE,
            payload,
        };
        self.remote.lock().unwrap().push(entry.clone());
        entry
    }

    /// What `fetch_all` would return right now.
    pub(crate) fn remote(&self, owner: &OwnerId) -> Vec<Entry<P>> {
        let mut entries: Vec<Entry<P>> = self
            .remote
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| &entry.owner_id == owner)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub(crate) fn notify(&self) {
        let _ = self.notices.send(ChangeNotice);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.notices.receiver_count()
    }

    pub(crate) fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn hold_fetches(&self, hold: bool) {
        self.hold_fetches.store(hold, Ordering::SeqCst);
    }

    pub(crate) fn hold_creates(&self, hold: bool) {
        self.hold_creates.store(hold, Ordering::SeqCst);
    }

    pub(crate) fn hold_deletes(&self, hold: bool) {
        self.hold_deletes.store(hold, Ordering::SeqCst);
    }

    pub(crate) fn held_fetches(&self) -> usize {
        self.held_fetches.lock().unwrap().len()
    }

    pub(crate) fn held_creates(&self) -> usize {
        self.held_creates.lock().unwrap().len()
    }

    pub(crate) fn held_deletes(&self) -> usize {
        self.held_deletes.lock().unwrap().len()
    }

    /// Lets the `index`-th still-held fetch proceed, counted in call order.
    pub(crate) fn release_fetch(&self, index: usize) {
        let sender = self.held_fetches.lock().unwrap().remove(index);
        let _ = sender.send(());
    }

    /// Lets the `index`-th still-held create proceed, counted in call order.
    pub(crate) fn release_create(&self, index: usize) {
        let sender = self.held_creates.lock().unwrap().remove(index);
        let _ = sender.send(());
    }

    pub(crate) fn release_delete(&self, index: usize) {
        let sender = self.held_deletes.lock().unwrap().remove(index);
        let _ = sender.send(());
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn gate(
        &self,
        hold: &AtomicBool,
        held: &Mutex<Vec<oneshot::Sender<()>>>,
    ) -> Option<oneshot::Receiver<()>> {
        if !hold.load(Ordering::SeqCst) {
            return None;
        }
        let (sender, receiver) = oneshot::channel();
        held.lock().unwrap().push(sender);
        Some(receiver)
    }
}

impl<P: Payload> RemoteGateway<P> for ScriptedGateway<P> {
    fn fetch_all<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<Entry<P>>, GatewayError>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate(&self.hold_fetches, &self.held_fetches);
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(GatewayError::Connection("fetch failed".to_string()));
            }
            Ok(self.remote(owner))
        })
    }

    fn create(&self, entry: NewEntry<P>) -> BoxFuture<'_, Result<Entry<P>, GatewayError>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate(&self.hold_creates, &self.held_creates);
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(GatewayError::Status {
                    status: 500,
                    message: "create rejected".to_string(),
                });
            }
            Ok(self.seed(&entry.owner_id, entry.timestamp, entry.payload))
        })
    }

    fn delete<'a>(&'a self, id: &'a EntryId) -> BoxFuture<'a, Result<(), GatewayError>> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate(&self.hold_deletes, &self.held_deletes);
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(GatewayError::Connection("delete failed".to_string()));
            }
            self.remote.lock().unwrap().retain(|entry| &entry.id != id);
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        _owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<ChangeFeed, GatewayError>> {
        Box::pin(async move {
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(GatewayError::Subscription("subscribe refused".to_string()));
            }
            Ok(feed_from_receiver(self.notices.subscribe()))
        })
    }
}

/// Yields to the runtime until `done` holds. Panics if it never does.
pub(crate) async fn settle(done: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached after yielding");
}
