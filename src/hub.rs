//! Chat fan-out hub.
//!
//! Every subscriber owns a small bounded queue. `publish` only ever does a
//! `try_send`, so a subscriber whose queue is full simply misses that message;
//! delivery is lossy for slow readers but never stalls the publisher or the
//! other subscribers. Within one subscriber messages arrive in publish order.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub user:  String,
    pub text:  String,
    pub color: String,
    pub time:  String,
}

pub type SubscriberId = u64;

struct HubInner {
    limit:   usize,
    history: VecDeque<ChatMessage>,
    subs:    HashMap<SubscriberId, mpsc::Sender<ChatMessage>>,
    next_id: SubscriberId,
    closed:  bool,
}

#[derive(Clone)]
pub struct ChatHub {
    inner:    Arc<Mutex<HubInner>>,
    queue_cap: usize,
}

impl ChatHub {
    pub fn new(history_limit: usize, queue_cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                limit:   history_limit,
                history: VecDeque::with_capacity(history_limit),
                subs:    HashMap::new(),
                next_id: 0,
                closed:  false,
            })),
            queue_cap: queue_cap.max(1),
        }
    }

    // 持鎖期間沒有 await / I/O，poison 了也照用
    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns how many subscribers got the message queued.
    pub fn publish(&self, msg: ChatMessage) -> usize {
        let mut h = self.lock();
        h.history.push_back(msg.clone());
        while h.history.len() > h.limit {
            h.history.pop_front();
        }

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, tx) in &h.subs {
            match tx.try_send(msg.clone()) {
                Ok(())                       => delivered += 1,
                Err(TrySendError::Full(_))   => debug!(subscriber = id, "queue full, message dropped"),
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            h.subs.remove(&id);
        }
        delivered
    }

    /// Registers a new subscriber. The history snapshot is taken under the
    /// same lock, so nothing published afterwards is missing from the queue
    /// and nothing in the snapshot is queued again.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_cap);
        let mut h = self.lock();
        let id = h.next_id;
        h.next_id += 1;
        if !h.closed {
            h.subs.insert(id, tx);
        }
        Subscription {
            id,
            rx,
            history: h.history.iter().cloned().collect(),
            hub: self.clone(),
        }
    }

    /// Idempotent; returns whether the subscriber was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.lock().subs.remove(&id).is_some()
    }

    /// Drops every queue so all live streams finish.
    pub fn close(&self) {
        let mut h = self.lock();
        h.closed = true;
        h.subs.clear();
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subs.len()
    }
}

/* ------------ 單一訂閱者 ------------ */
/// Dropping the subscription unregisters it from the hub.
pub struct Subscription {
    id:      SubscriberId,
    rx:      mpsc::Receiver<ChatMessage>,
    history: Vec<ChatMessage>,
    hub:     ChatHub,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId { self.id }

    pub fn take_history(&mut self) -> Vec<ChatMessage> {
        std::mem::take(&mut self.history)
    }

    /// `None` once the hub has dropped this queue.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.hub.unsubscribe(self.id) {
            debug!(subscriber = self.id, "chat subscriber left");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn msg(n: usize) -> ChatMessage {
        ChatMessage {
            user:  "alice".into(),
            text:  format!("hello {n}"),
            color: "#fb7185".into(),
            time:  "12:00".into(),
        }
    }

    #[test]
    fn history_is_bounded_and_keeps_latest() {
        let hub = ChatHub::new(3, 10);
        for n in 0..7 {
            hub.publish(msg(n));
            let h = hub.history();
            assert!(h.len() <= 3);
            let first = (n + 1).saturating_sub(3);
            let expect: Vec<_> = (first..=n).map(msg).collect();
            assert_eq!(h, expect);
        }
    }

    #[tokio::test]
    async fn subscriber_gets_snapshot_then_only_newer_messages() {
        let hub = ChatHub::new(50, 10);
        hub.publish(msg(0));
        hub.publish(msg(1));

        let mut sub = hub.subscribe();
        assert_eq!(sub.take_history(), vec![msg(0), msg(1)]);

        hub.publish(msg(2));
        hub.publish(msg(3));
        assert_eq!(sub.recv().await, Some(msg(2)));
        assert_eq!(sub.recv().await, Some(msg(3)));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn saturated_subscriber_does_not_block_publish() {
        let hub = ChatHub::new(50, 2);
        let _stalled = hub.subscribe();
        let mut healthy = hub.subscribe();

        // stalled 的 queue 塞滿後還繼續 publish
        for n in 0..5 {
            hub.publish(msg(n));
            assert_eq!(healthy.recv().await, Some(msg(n)));
        }

        let delivered = timeout(Duration::from_millis(100), async { hub.publish(msg(99)) })
            .await
            .expect("publish must not stall");
        assert_eq!(delivered, 1);
        assert_eq!(healthy.recv().await, Some(msg(99)));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = ChatHub::new(10, 4);
        let a = hub.subscribe();
        let _b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        assert!(hub.unsubscribe(a.id()));
        assert!(!hub.unsubscribe(a.id()));
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.publish(msg(1)), 1);

        drop(a);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let hub = ChatHub::new(10, 4);
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_ends_every_stream() {
        let hub = ChatHub::new(10, 4);
        hub.publish(msg(0));
        let mut sub = hub.subscribe();
        hub.close();
        assert_eq!(sub.recv().await, None);

        let mut late = hub.subscribe();
        assert_eq!(late.take_history(), vec![msg(0)]);
        assert_eq!(late.recv().await, None);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
