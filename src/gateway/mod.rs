//! Boundary to the authoritative remote store.
//!
//! The sync core only ever talks to a [`RemoteGateway`]. Three implementations
//! ship with the crate:
//! - [`MemoryGateway`]: in-process store with a broadcast change hub
//! - [`HttpGateway`]: JSON over HTTP plus a websocket change feed
//! - `testing::ScriptedGateway` (tests only): holdable, failable calls
//!
//! ## Change feed
//!
//! `subscribe` yields a stream of [`ChangeNotice`]s that carry no payload.
//! The only correct reaction to a notice is a full `fetch_all`. Dropping the
//! stream is how a subscriber unsubscribes.

mod error;
mod http;
mod memory;
#[cfg(test)]
pub(crate) mod testing;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::models::{Entry, EntryId, NewEntry, OwnerId, Payload};

pub use error::GatewayError;
pub use http::{check_server, HttpGateway};
pub use memory::{ChangeHub, MemoryGateway};

/// "Something changed" signal from the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice;

/// Push channel of change notices. Dropping it unsubscribes.
pub type ChangeFeed = BoxStream<'static, Result<ChangeNotice, GatewayError>>;

/// Contract of the remote store for one record type.
pub trait RemoteGateway<P: Payload>: Send + Sync + 'static {
    /// Returns the owner's whole collection, newest first.
    fn fetch_all<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<Entry<P>>, GatewayError>>;

    /// Persists a new entry and returns it with its durable id.
    fn create(&self, entry: NewEntry<P>) -> BoxFuture<'_, Result<Entry<P>, GatewayError>>;

    /// Removes an entry by durable id.
    fn delete<'a>(&'a self, id: &'a EntryId) -> BoxFuture<'a, Result<(), GatewayError>>;

    /// Opens the change feed for an owner's collection.
    fn subscribe<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<ChangeFeed, GatewayError>>;
}

impl<P: Payload, G: RemoteGateway<P>> RemoteGateway<P> for std::sync::Arc<G> {
    fn fetch_all<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<Entry<P>>, GatewayError>> {
        (**self).fetch_all(owner)
    }

    fn create(&self, entry: NewEntry<P>) -> BoxFuture<'_, Result<Entry<P>, GatewayError>> {
        (**self).create(entry)
    }

    fn delete<'a>(&'a self, id: &'a EntryId) -> BoxFuture<'a, Result<(), GatewayError>> {
        (**self).delete(id)
    }

    fn subscribe<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> BoxFuture<'a, Result<ChangeFeed, GatewayError>> {
        (**self).subscribe(owner)
    }
}
