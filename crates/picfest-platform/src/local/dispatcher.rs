use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use picfest_types::events::MediaChange;

use crate::{ChangeFeed, MediaSubscription, PlatformResult};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const SUBSCRIBER_BUFFER: usize = 64;

/// In-process change feed: one broadcast channel per event.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// event_id -> sender; created on first subscribe
    channels: RwLock<HashMap<Uuid, broadcast::Sender<MediaChange>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&self, event_id: Uuid) -> broadcast::Sender<MediaChange> {
        if let Some(tx) = self.inner.channels.read().await.get(&event_id) {
            return tx.clone();
        }
        self.inner
            .channels
            .write()
            .await
            .entry(event_id)
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Fan a change out to every display watching the event.
    pub async fn publish(&self, event_id: Uuid, change: MediaChange) {
        let mut channels = self.inner.channels.write().await;
        let Some(tx) = channels.get(&event_id) else {
            return;
        };
        if tx.send(change).is_err() {
            // Nobody listening anymore.
            channels.remove(&event_id);
            debug!("Dropped idle channel for event {}", event_id);
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.inner.channels.read().await.len()
    }
}

#[async_trait]
impl ChangeFeed for Dispatcher {
    async fn subscribe_media(&self, event_id: Uuid) -> PlatformResult<MediaSubscription> {
        let mut events = self.sender_for(event_id).await.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(change) => {
                        if tx.send(change).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Media subscriber for event {} lagged by {} changes", event_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(MediaSubscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn changes_reach_only_their_event() {
        let dispatcher = Dispatcher::new();
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut sub = dispatcher.subscribe_media(watched).await.unwrap();

        let id = Uuid::new_v4();
        dispatcher.publish(other, MediaChange::Delete { id: Uuid::new_v4() }).await;
        dispatcher.publish(watched, MediaChange::Delete { id }).await;

        assert_eq!(sub.recv().await, Some(MediaChange::Delete { id }));
    }

    #[tokio::test]
    async fn dropping_subscription_frees_channel() {
        let dispatcher = Dispatcher::new();
        let event = Uuid::new_v4();

        let sub = dispatcher.subscribe_media(event).await.unwrap();
        assert_eq!(dispatcher.channel_count().await, 1);
        drop(sub);

        // let the aborted forwarder release its receiver
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        dispatcher.publish(event, MediaChange::Delete { id: Uuid::new_v4() }).await;
        assert_eq!(dispatcher.channel_count().await, 0);
    }
}
