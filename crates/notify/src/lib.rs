//! `notify` crate — live-progress fan-out.
//!
//! The execution coordinator publishes lifecycle and progress events per
//! pipeline id; subscribers (WebSocket sessions, tests) connect either to a
//! single pipeline or to the wildcard stream that sees everything.
//!
//! Publishing is synchronous and infallible: subscribers are unbounded mpsc
//! senders, sends happen under the registry lock so each subscriber observes
//! a pipeline's events in production order, and closed subscribers are
//! pruned as they are discovered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// One progress or lifecycle notification.
///
/// `status` is always present; everything else is situational and omitted
/// from the wire when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_scraped: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }
}

type Subscriber = mpsc::UnboundedSender<Event>;

/// A live subscription handle. Keep `events` and receive; drop it to let the
/// registry prune the subscription on the next publish.
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<Event>,
}

#[derive(Default)]
struct Inner {
    channels: HashMap<Uuid, Vec<(u64, Subscriber)>>,
    wildcard: Vec<(u64, Subscriber)>,
}

/// Subscriber registry: per-pipeline lists plus a wildcard list.
#[derive(Default)]
pub struct ChannelRegistry {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to one pipeline's events.
    pub fn connect(&self, pipeline_id: Uuid) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().channels.entry(pipeline_id).or_default().push((id, tx));
        debug!(%pipeline_id, subscription = id, "subscriber connected");
        Subscription { id, events: rx }
    }

    /// Subscribe to every pipeline's events.
    pub fn connect_all(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().wildcard.push((id, tx));
        Subscription { id, events: rx }
    }

    /// Remove a subscription created by [`connect`](Self::connect).
    pub fn disconnect(&self, pipeline_id: Uuid, subscription_id: u64) {
        let mut inner = self.lock();
        if let Some(subs) = inner.channels.get_mut(&pipeline_id) {
            subs.retain(|(id, _)| *id != subscription_id);
            if subs.is_empty() {
                inner.channels.remove(&pipeline_id);
            }
        }
    }

    /// Remove a subscription created by [`connect_all`](Self::connect_all).
    pub fn disconnect_all(&self, subscription_id: u64) {
        self.lock().wildcard.retain(|(id, _)| *id != subscription_id);
    }

    /// Deliver `event` to the pipeline's subscribers and every wildcard
    /// subscriber. Closed receivers are dropped from the registry.
    pub fn publish(&self, pipeline_id: Uuid, event: Event) {
        let mut inner = self.lock();
        if let Some(subs) = inner.channels.get_mut(&pipeline_id) {
            subs.retain(|(_, tx)| tx.send(event.clone()).is_ok());
            if subs.is_empty() {
                inner.channels.remove(&pipeline_id);
            }
        }
        inner.wildcard.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers for one pipeline (wildcard excluded).
    pub fn subscriber_count(&self, pipeline_id: Uuid) -> usize {
        self.lock().channels.get(&pipeline_id).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: &str, n: i32) -> Event {
        Event {
            items_scraped: Some(n),
            ..Event::with_status(status)
        }
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let registry = ChannelRegistry::new();
        let pipeline = Uuid::new_v4();
        let mut sub = registry.connect(pipeline);

        for n in 1..=3 {
            registry.publish(pipeline, event("running", n));
        }

        for n in 1..=3 {
            let got = sub.events.recv().await.unwrap();
            assert_eq!(got.items_scraped, Some(n));
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_pipeline() {
        let registry = ChannelRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut sub_a = registry.connect(a);

        registry.publish(b, Event::with_status("running"));
        registry.publish(a, Event::with_status("finished"));

        assert_eq!(sub_a.events.recv().await.unwrap().status, "finished");
        assert!(sub_a.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn wildcard_sees_every_pipeline() {
        let registry = ChannelRegistry::new();
        let mut all = registry.connect_all();

        registry.publish(Uuid::new_v4(), Event::with_status("running"));
        registry.publish(Uuid::new_v4(), Event::with_status("stopped"));

        assert_eq!(all.events.recv().await.unwrap().status, "running");
        assert_eq!(all.events.recv().await.unwrap().status, "stopped");
    }

    #[tokio::test]
    async fn disconnect_removes_the_subscription() {
        let registry = ChannelRegistry::new();
        let pipeline = Uuid::new_v4();
        let sub = registry.connect(pipeline);
        assert_eq!(registry.subscriber_count(pipeline), 1);

        registry.disconnect(pipeline, sub.id);
        assert_eq!(registry.subscriber_count(pipeline), 0);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let registry = ChannelRegistry::new();
        let pipeline = Uuid::new_v4();
        drop(registry.connect(pipeline));
        assert_eq!(registry.subscriber_count(pipeline), 1);

        registry.publish(pipeline, Event::with_status("running"));
        assert_eq!(registry.subscriber_count(pipeline), 0);
    }

    #[test]
    fn absent_fields_are_omitted_from_the_wire() {
        let json = serde_json::to_value(Event::with_status("running")).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "running" }));
    }
}
