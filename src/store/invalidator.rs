use futures::future;
use futures::StreamExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;
use tokio::task::JoinHandle;

use super::EntryStore;
use crate::gateway::{ChangeFeed, ChangeNotice, GatewayError, RemoteGateway};
use crate::models::{OwnerId, Payload};

/// The feed is shared with the reload task so `stop` can drop it directly.
type Subscription = Arc<Mutex<Option<ChangeFeed>>>;

/// Reloads a store whenever the remote store reports a change.
///
/// Notices carry no payload, so every notice triggers a full `load`. Reloads
/// are not coalesced; the last one to finish wins. The subscription ends when
/// the invalidator is stopped or dropped.
pub struct RealtimeInvalidator {
    owner: OwnerId,
    subscription: Subscription,
    task: Option<JoinHandle<()>>,
}

impl RealtimeInvalidator {
    /// Subscribes to the owner's change feed and starts reloading on notices.
    ///
    /// A refused subscription is not fatal: the store keeps working without
    /// live updates and the returned invalidator is inactive.
    pub async fn start<P, G>(store: EntryStore<P, G>, owner: OwnerId) -> Self
    where
        P: Payload,
        G: RemoteGateway<P>,
    {
        match store.gateway().subscribe(&owner).await {
            Ok(feed) => {
                tracing::debug!("Subscribed to {} changes for {}", P::RECORD_TYPE, owner);
                let subscription = Arc::new(Mutex::new(Some(feed)));
                let task = tokio::spawn(run_feed(store, owner.clone(), Arc::clone(&subscription)));
                Self {
                    owner,
                    subscription,
                    task: Some(task),
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Live updates unavailable for {} ({}): {}",
                    owner,
                    P::RECORD_TYPE,
                    e
                );
                Self {
                    owner,
                    subscription: Arc::new(Mutex::new(None)),
                    task: None,
                }
            }
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Whether the feed is still being consumed.
    pub fn is_active(&self) -> bool {
        lock(&self.subscription).is_some()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the subscription. The feed is dropped before this returns and
    /// no further reload starts. Safe to call more than once.
    pub fn stop(&self) {
        let feed = lock(&self.subscription).take();
        if let Some(task) = &self.task {
            task.abort();
        }
        if feed.is_some() {
            tracing::debug!("Unsubscribed from changes for {}", self.owner);
        }
    }
}

impl Drop for RealtimeInvalidator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(subscription: &Subscription) -> MutexGuard<'_, Option<ChangeFeed>> {
    subscription.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Next notice, or `None` once the feed ends or has been taken by `stop`.
fn next_notice(
    subscription: &Subscription,
) -> impl Future<Output = Option<Result<ChangeNotice, GatewayError>>> + '_ {
    future::poll_fn(move |cx| match lock(subscription).as_mut() {
        Some(feed) => feed.poll_next_unpin(cx),
        None => Poll::Ready(None),
    })
}

async fn run_feed<P, G>(store: EntryStore<P, G>, owner: OwnerId, subscription: Subscription)
where
    P: Payload,
    G: RemoteGateway<P>,
{
    while let Some(notice) = next_notice(&subscription).await {
        match notice {
            Ok(_) => {
                if store.is_closed() || lock(&subscription).is_none() {
                    break;
                }
                // Failures are already published on the store
                let _ = store.load(&owner).await;
            }
            Err(e) => {
                tracing::warn!("Change feed error for {}: {}", owner, e);
            }
        }
    }
    lock(&subscription).take();
    tracing::debug!("Change feed for {} ended", owner);
}
