use super::{EntryStore, RealtimeInvalidator};
use crate::gateway::RemoteGateway;
use crate::models::{OwnerId, Payload};

/// A store bound to one owner with live invalidation attached.
///
/// This is what a screen mounts: it subscribes, loads, and on drop tears both
/// down so late completions can no longer touch the collection.
pub struct LiveStore<P: Payload, G: RemoteGateway<P>> {
    store: EntryStore<P, G>,
    invalidator: RealtimeInvalidator,
}

impl<P: Payload, G: RemoteGateway<P>> LiveStore<P, G> {
    /// Subscribes before the initial load so no change between the two is missed.
    ///
    /// A failed initial load is published on the store rather than returned.
    pub async fn open(store: EntryStore<P, G>, owner: OwnerId) -> Self {
        let invalidator = RealtimeInvalidator::start(store.clone(), owner.clone()).await;

        if let Err(e) = store.load(&owner).await {
            tracing::warn!("Initial {} load for {} failed: {}", P::RECORD_TYPE, owner, e);
        }

        Self { store, invalidator }
    }

    pub fn store(&self) -> &EntryStore<P, G> {
        &self.store
    }

    pub fn owner(&self) -> &OwnerId {
        self.invalidator.owner()
    }

    pub fn is_live(&self) -> bool {
        self.invalidator.is_active()
    }

    /// Stops live updates and closes the store. Idempotent.
    pub fn close(&self) {
        self.invalidator.stop();
        self.store.close();
    }
}

impl<P: Payload, G: RemoteGateway<P>> Drop for LiveStore<P, G> {
    fn drop(&mut self) {
        self.close();
    }
}
