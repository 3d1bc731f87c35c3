//! Fan-out of filter notifications
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: when a
//! subscriber's queue is full its oldest pending notification is evicted to
//! make room, so a slow reader only ever loses stale history and the capture
//! thread never waits on a UI.

use crate::filter::state::{BlockedEvent, FilterStatus};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Per-subscriber queue length used when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Channel name for status changes
pub const STATUS_CHANGED_CHANNEL: &str = "filter_status_changed";

/// Channel name for blocked clicks
pub const CLICK_BLOCKED_CHANNEL: &str = "click_blocked";

/// Send attempts per subscriber before a notification is counted as dropped
const MAX_SEND_ATTEMPTS: usize = 3;

/// A message pushed to subscribers.
///
/// Serializes as `{"event": "<channel>", "payload": {...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum Notification {
    #[serde(rename = "filter_status_changed")]
    StatusChanged(FilterStatus),
    #[serde(rename = "click_blocked")]
    ClickBlocked(BlockedEvent),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::StatusChanged(_) => NotificationKind::StatusChanged,
            Notification::ClickBlocked(_) => NotificationKind::ClickBlocked,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.kind().channel()
    }
}

/// Notification channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    StatusChanged,
    ClickBlocked,
}

impl NotificationKind {
    pub fn channel(&self) -> &'static str {
        match self {
            NotificationKind::StatusChanged => STATUS_CHANGED_CHANNEL,
            NotificationKind::ClickBlocked => CLICK_BLOCKED_CHANNEL,
        }
    }

    /// Look up a kind by its channel name
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel {
            STATUS_CHANGED_CHANNEL => Some(NotificationKind::StatusChanged),
            CLICK_BLOCKED_CHANNEL => Some(NotificationKind::ClickBlocked),
            _ => None,
        }
    }
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct PublisherStats {
    /// Notifications handed to `publish`
    pub published: AtomicU64,
    /// Notifications placed on a subscriber queue
    pub delivered: AtomicU64,
    /// Notifications evicted or abandoned because a queue was full
    pub dropped: AtomicU64,
}

impl PublisherStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct SubscriberSlot {
    id: u64,
    filter: Option<NotificationKind>,
    tx: Sender<Notification>,
    /// Second handle on the subscriber's queue, used to evict the oldest entry
    evict: Receiver<Notification>,
    closed: Arc<AtomicBool>,
}

impl SubscriberSlot {
    fn wants(&self, kind: NotificationKind) -> bool {
        self.filter.map_or(true, |f| f == kind)
    }

    /// Returns true if the notification ended up on the queue.
    fn deliver(&self, notification: Notification, stats: &PublisherStats) -> bool {
        let mut pending = notification;
        for _ in 0..MAX_SEND_ATTEMPTS {
            match self.tx.try_send(pending) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    pending = returned;
                    if self.evict.try_recv().is_ok() {
                        stats.dropped.fetch_add(1, Ordering::Relaxed);
                        trace!("Subscriber {} queue full; evicted oldest notification", self.id);
                    }
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        stats.dropped.fetch_add(1, Ordering::Relaxed);
        false
    }
}

/// Non-blocking fan-out publisher
pub struct Publisher {
    subscribers: RwLock<Vec<SubscriberSlot>>,
    next_id: AtomicU64,
    capacity: usize,
    stats: Arc<PublisherStats>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Publisher {
    /// Create a publisher whose subscriber queues hold `capacity` notifications.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            stats: Arc::new(PublisherStats::default()),
        }
    }

    /// Subscribe to every notification
    pub fn subscribe(&self) -> Subscription {
        self.add_subscriber(None)
    }

    /// Subscribe to one channel only
    pub fn subscribe_to(&self, kind: NotificationKind) -> Subscription {
        self.add_subscriber(Some(kind))
    }

    fn add_subscriber(&self, filter: Option<NotificationKind>) -> Subscription {
        let (tx, rx) = bounded(self.capacity);
        let closed = Arc::new(AtomicBool::new(false));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers.write().push(SubscriberSlot {
            id,
            filter,
            tx,
            evict: rx.clone(),
            closed: Arc::clone(&closed),
        });
        debug!("Subscriber {} registered (filter: {:?})", id, filter);

        Subscription { id, rx, closed }
    }

    /// Push a notification to every interested subscriber. Never blocks on a
    /// reader.
    pub fn publish(&self, notification: Notification) {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        let kind = notification.kind();
        let mut saw_closed = false;

        {
            let subscribers = self.subscribers.read();
            for slot in subscribers.iter() {
                if slot.closed.load(Ordering::Acquire) {
                    saw_closed = true;
                    continue;
                }
                if !slot.wants(kind) {
                    continue;
                }
                if slot.deliver(notification, &self.stats) {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if saw_closed {
            self.prune();
        }
    }

    /// Convenience for [`Notification::StatusChanged`]
    pub fn publish_status(&self, status: FilterStatus) {
        self.publish(Notification::StatusChanged(status));
    }

    /// Convenience for [`Notification::ClickBlocked`]
    pub fn publish_blocked(&self, event: BlockedEvent) {
        self.publish(Notification::ClickBlocked(event));
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|slot| !slot.closed.load(Ordering::Acquire))
            .count()
    }

    pub fn stats(&self) -> Arc<PublisherStats> {
        Arc::clone(&self.stats)
    }

    fn prune(&self) {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|slot| !slot.closed.load(Ordering::Acquire));
        let removed = before - subscribers.len();
        if removed > 0 {
            debug!("Pruned {} closed subscriber(s)", removed);
        }
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: Receiver<Notification>,
    closed: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next notification, if one is waiting
    pub fn try_recv(&self) -> Option<Notification> {
        match self.rx.try_recv() {
            Ok(n) => Some(n),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next notification
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Notification> {
        match self.rx.recv_timeout(timeout) {
            Ok(n) => Some(n),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until the next notification; `None` once the publisher is gone
    pub fn recv(&self) -> Option<Notification> {
        self.rx.recv().ok()
    }

    /// Blocking iterator that ends when the publisher is dropped
    pub fn iter(&self) -> impl Iterator<Item = Notification> + '_ {
        self.rx.iter()
    }

    /// Take everything currently queued
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }

    /// Number of queued notifications
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(blocked_clicks: u64) -> FilterStatus {
        FilterStatus {
            running: true,
            threshold_ms: 100,
            blocked_clicks,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = Publisher::new(4);
        publisher.publish_status(status(0));
        assert_eq!(publisher.stats().published(), 1);
        assert_eq!(publisher.stats().delivered(), 0);
    }

    #[test]
    fn test_every_subscriber_receives() {
        let publisher = Publisher::new(4);
        let a = publisher.subscribe();
        let b = publisher.subscribe();

        publisher.publish_blocked(BlockedEvent { delta_ms: 12 });

        let expected = Notification::ClickBlocked(BlockedEvent { delta_ms: 12 });
        assert_eq!(a.try_recv(), Some(expected));
        assert_eq!(b.try_recv(), Some(expected));
        assert_eq!(publisher.stats().delivered(), 2);
    }

    #[test]
    fn test_filtered_subscription() {
        let publisher = Publisher::new(4);
        let blocked_only = publisher.subscribe_to(NotificationKind::ClickBlocked);

        publisher.publish_status(status(1));
        publisher.publish_blocked(BlockedEvent { delta_ms: 3 });

        assert_eq!(
            blocked_only.drain(),
            vec![Notification::ClickBlocked(BlockedEvent { delta_ms: 3 })]
        );
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let publisher = Publisher::new(2);
        let sub = publisher.subscribe();

        for i in 0..5 {
            publisher.publish_status(status(i));
        }

        let received: Vec<u64> = sub
            .drain()
            .into_iter()
            .map(|n| match n {
                Notification::StatusChanged(s) => s.blocked_clicks,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(received, vec![3, 4]);
        assert_eq!(publisher.stats().dropped(), 3);
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let publisher = Publisher::new(1);
        let slow = publisher.subscribe();
        let fast = publisher.subscribe();

        publisher.publish_status(status(0));
        assert!(fast.try_recv().is_some());
        publisher.publish_status(status(1));
        assert!(fast.try_recv().is_some());

        assert_eq!(slow.drain(), vec![Notification::StatusChanged(status(1))]);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let publisher = Publisher::new(4);
        let keep = publisher.subscribe();
        let gone = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        drop(gone);
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish_status(status(0));
        assert_eq!(publisher.subscribers.read().len(), 1);
        assert!(keep.try_recv().is_some());
    }

    #[test]
    fn test_recv_ends_when_publisher_dropped() {
        let publisher = Publisher::new(4);
        let sub = publisher.subscribe();
        publisher.publish_status(status(0));
        drop(publisher);

        assert!(sub.recv().is_some());
        assert!(sub.recv().is_none());
        assert_eq!(sub.iter().count(), 0);
    }

    #[test]
    fn test_recv_timeout_empty() {
        let publisher = Publisher::new(4);
        let sub = publisher.subscribe();
        assert!(sub.recv_timeout(Duration::from_millis(10)).is_none());
        assert!(sub.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let publisher = Publisher::new(0);
        let sub = publisher.subscribe();
        publisher.publish_status(status(0));
        publisher.publish_status(status(1));
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.try_recv(), Some(Notification::StatusChanged(status(1))));
    }

    #[test]
    fn test_notification_channels() {
        let status_n = Notification::StatusChanged(status(0));
        let blocked_n = Notification::ClickBlocked(BlockedEvent { delta_ms: 1 });
        assert_eq!(status_n.channel(), "filter_status_changed");
        assert_eq!(blocked_n.channel(), "click_blocked");
        assert_eq!(
            NotificationKind::from_channel("click_blocked"),
            Some(NotificationKind::ClickBlocked)
        );
        assert_eq!(NotificationKind::from_channel("nope"), None);
    }

    #[test]
    fn test_notification_serialization() {
        let n = Notification::ClickBlocked(BlockedEvent { delta_ms: 42 });
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, r#"{"event":"click_blocked","payload":{"delta_ms":42}}"#);

        let n = Notification::StatusChanged(FilterStatus {
            running: false,
            threshold_ms: 100,
            blocked_clicks: 2,
        });
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"event":"filter_status_changed","#,
                r#""payload":{"running":false,"threshold_ms":100,"blocked_clicks":2}}"#
            )
        );
    }
}
