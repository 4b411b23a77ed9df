//! In-process authoritative store.
//!
//! Backs the reference server and doubles as a real gateway in tests and demos.
//! Every successful write is broadcast to the owner's subscribers.

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChangeFeed, ChangeNotice, GatewayError, RemoteGateway};
use crate::models::{Entry, EntryId, NewEntry, OwnerId, Payload};

/// Buffered notices per owner before slow subscribers start lagging.
const HUB_CAPACITY: usize = 16;

/// Tracks change subscribers per owner.
#[derive(Default)]
pub struct ChangeHub {
    channels: RwLock<HashMap<OwnerId, broadcast::Sender<ChangeNotice>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to change notices for an owner.
    ///
    /// Channels whose subscribers have all gone away are dropped here.
    pub async fn subscribe(&self, owner: &OwnerId) -> broadcast::Receiver<ChangeNotice> {
        let mut channels = self.channels.write().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);

        if let Some(sender) = channels.get(owner) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(HUB_CAPACITY);
            channels.insert(owner.clone(), sender);
            receiver
        }
    }

    /// Notifies every subscriber of an owner.
    pub async fn notify(&self, owner: &OwnerId) {
        let mut channels = self.channels.write().await;

        let abandoned = channels
            .get(owner)
            .is_some_and(|sender| sender.send(ChangeNotice).is_err());
        if abandoned {
            channels.remove(owner);
        }
    }

    /// Number of owners with an open channel.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of live subscribers for an owner.
    pub async fn subscriber_count(&self, owner: &OwnerId) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(owner)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

/// Turns a broadcast receiver into a change feed.
///
/// A lagged receiver still yields one notice: it missed changes, so it must reload.
pub(crate) fn feed_from_receiver(receiver: broadcast::Receiver<ChangeNotice>) -> ChangeFeed {
    stream::unfold(receiver, |mut receiver| async move {
        match receiver.recv().await {
            Ok(notice) => Some((Ok(notice), receiver)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Change feed lagged by {} notice(s)", skipped);
                Some((Ok(ChangeNotice), receiver))
            }
            Err(RecvError::Closed) => None,
        }
    })
    .boxed()
}

/// In-memory remote store for one record type.
pub struct MemoryGateway<P> {
    collections: Arc<RwLock<HashMap<OwnerId, Vec<Entry<P>>>>>,
    hub: Arc<ChangeHub>,
}

impl<P> Clone for MemoryGateway<P> {
    fn clone(&self) -> Self {
        Self {
            collections: Arc::clone(&self.collections),
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<P> Default for MemoryGateway<P> {
    fn default() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            hub: Arc::new(ChangeHub::new()),
        }
    }
}

impl<P: Payload> MemoryGateway<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    /// Owner's collection, newest first.
    pub async fn list(&self, owner: &OwnerId) -> Vec<Entry<P>> {
        let collections = self.collections.read().await;
        collections.get(owner).cloned().unwrap_or_default()
    }

    /// Stores a new entry under a fresh durable id.
    pub async fn insert(&self, new_entry: NewEntry<P>) -> Result<Entry<P>, GatewayError> {
        if new_entry.owner_id.as_str().is_empty() {
            return Err(GatewayError::Rejected("owner_id must not be empty".to_string()));
        }

        let entry = Entry {
            id: EntryId::durable(Uuid::new_v4().to_string()),
            owner_id: new_entry.owner_id,
            timestamp: new_entry.timestamp,
            record_type: P::RECORD_TYPE,
            payload: new_entry.payload,
        };

        {
            let mut collections = self.collections.write().await;
            let collection = collections.entry(entry.owner_id.clone()).or_default();
            let position = collection
                .iter()
                .position(|existing| existing.timestamp <= entry.timestamp)
                .unwrap_or(collection.len());
            collection.insert(position, entry.clone());
        }

        tracing::debug!(
            "Stored {} {} for {}",
            P::RECORD_TYPE,
            entry.id,
            entry.owner_id
        );
        self.hub.notify(&entry.owner_id).await;

        Ok(entry)
    }

    /// Removes an entry from one owner's collection.
    ///
    /// Returns whether anything was removed; a missing id is not an error.
    pub async fn remove_for(&self, owner: &OwnerId, id: &EntryId) -> bool {
        let removed = {
            let mut collections = self.collections.write().await;
            match collections.get_mut(owner) {
                Some(collection) => {
                    let before = collection.len();
                    collection.retain(|entry| &entry.id != id);
                    collection.len() != before
                }
                None => false,
            }
        };

        if removed {
            self.hub.notify(owner).await;
        } else {
            tracing::debug!("Delete of unknown {} {} ignored", P::RECORD_TYPE, id);
        }
        removed
    }

    async fn owner_of(&self, id: &EntryId) -> Option<OwnerId> {
        let collections = self.collections.read().await;
        collections
            .iter()
            .find(|(_, collection)| collection.iter().any(|entry| &entry.id == id))
            .map(|(owner, _)| owner.clone())
    }
}

impl<P: Payload> RemoteGateway<P> for MemoryGateway<P> {
    fn fetch_all<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<Entry<P>>, GatewayError>> {
        Box::pin(async move { Ok(self.list(owner).await) })
    }

    fn create(&self, entry: NewEntry<P>) -> BoxFuture<'_, Result<Entry<P>, GatewayError>> {
        Box::pin(self.insert(entry))
    }

    fn delete<'a>(&'a self, id: &'a EntryId) -> BoxFuture<'a, Result<(), GatewayError>> {
        Box::pin(async move {
            if let Some(owner) = self.owner_of(id).await {
                self.remove_for(&owner, id).await;
            }
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<ChangeFeed, GatewayError>> {
        Box::pin(async move { Ok(feed_from_receiver(self.hub.subscribe(owner).await)) })
    }
}
