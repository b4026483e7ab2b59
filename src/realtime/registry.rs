//! Subscription registry and notification fan-out
//!
//! Two maps kept consistent under one lock: observer id -> live connection
//! handle, and dog id -> subscribed observer ids. Fan-out iterates a
//! snapshot taken under the lock and sends outside it, so a disconnect
//! racing a broadcast cannot corrupt iteration. A failed send deregisters
//! that observer and never aborts delivery to the rest.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::scoring::policy::InterventionTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SensorUpdate,
    InterventionAlert,
    HealthAlert,
}

/// Message payload pushed to observers
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub dog_id: Uuid,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

type ConnectionHandle = UnboundedSender<Message>;

#[derive(Default)]
struct Inner {
    connections: HashMap<String, ConnectionHandle>,
    subscribers: HashMap<Uuid, HashSet<String>>,
}

/// Shared registry of live observer connections and their subscriptions
#[derive(Clone, Default)]
pub struct ConnectionManager {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection handle. A reconnect under the same observer id
    /// replaces the stale handle; existing subscriptions carry over.
    pub fn register(&self, client_id: &str, handle: ConnectionHandle) {
        let mut inner = self.inner.write();
        inner.connections.insert(client_id.to_string(), handle);
        let total = inner.connections.len();
        drop(inner);
        tracing::info!("Client {} connected. Total connections: {}", client_id, total);
    }

    /// Remove an observer from the connection table and every subscriber set
    pub fn deregister(&self, client_id: &str) {
        let mut inner = self.inner.write();
        if inner.connections.remove(client_id).is_none() {
            return;
        }
        inner.subscribers.retain(|_, clients| {
            clients.remove(client_id);
            !clients.is_empty()
        });
        let total = inner.connections.len();
        drop(inner);
        tracing::info!("Client {} disconnected. Total connections: {}", client_id, total);
    }

    /// Teardown guard for a socket task: only deregisters if the registered
    /// handle is still this task's channel, so a stale socket closing cannot
    /// evict a replacement connection.
    pub fn deregister_if_current(&self, client_id: &str, handle: &ConnectionHandle) {
        let is_current = self
            .inner
            .read()
            .connections
            .get(client_id)
            .map(|current| current.same_channel(handle))
            .unwrap_or(false);
        if is_current {
            self.deregister(client_id);
        }
    }

    pub fn subscribe(&self, client_id: &str, dog_id: Uuid) {
        let mut inner = self.inner.write();
        inner
            .subscribers
            .entry(dog_id)
            .or_default()
            .insert(client_id.to_string());
        drop(inner);
        tracing::debug!("Client {} subscribed to dog {}", client_id, dog_id);
    }

    pub fn unsubscribe(&self, client_id: &str, dog_id: Uuid) {
        let mut inner = self.inner.write();
        if let Some(clients) = inner.subscribers.get_mut(&dog_id) {
            clients.remove(client_id);
            if clients.is_empty() {
                inner.subscribers.remove(&dog_id);
            }
        }
        drop(inner);
        tracing::debug!("Client {} unsubscribed from dog {}", client_id, dog_id);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    pub fn subscriber_count(&self, dog_id: Uuid) -> usize {
        self.inner
            .read()
            .subscribers
            .get(&dog_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Deliver an event to the subject's subscribers
    pub fn send_to_subscribers(&self, dog_id: Uuid, kind: EventKind, data: Value) -> usize {
        let targets = {
            let inner = self.inner.read();
            match inner.subscribers.get(&dog_id) {
                Some(clients) => clients
                    .iter()
                    .filter_map(|id| {
                        inner.connections.get(id).map(|tx| (id.clone(), tx.clone()))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        self.deliver(targets, &event(kind, dog_id, data))
    }

    /// Deliver an event to every connected observer
    pub fn broadcast(&self, dog_id: Uuid, kind: EventKind, data: Value) -> usize {
        let targets: Vec<_> = {
            let inner = self.inner.read();
            inner
                .connections
                .iter()
                .map(|(id, tx)| (id.clone(), tx.clone()))
                .collect()
        };
        self.deliver(targets, &event(kind, dog_id, data))
    }

    /// Intervention alerts: HIGH and CRITICAL reach every connected
    /// observer, lower tiers reach subject subscribers only. Each observer
    /// receives the alert once.
    pub fn send_intervention_alert(&self, dog_id: Uuid, tier: InterventionTier, data: Value) -> usize {
        if tier.is_escalation() {
            self.broadcast(dog_id, EventKind::InterventionAlert, data)
        } else {
            self.send_to_subscribers(dog_id, EventKind::InterventionAlert, data)
        }
    }

    fn deliver(&self, targets: Vec<(String, ConnectionHandle)>, event: &OutboundEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode outbound event: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (client_id, handle) in targets {
            if handle.send(Message::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                dead.push(client_id);
            }
        }

        for client_id in dead {
            tracing::warn!("Dropping unreachable observer {}", client_id);
            self.deregister(&client_id);
        }
        delivered
    }
}

fn event(kind: EventKind, dog_id: Uuid, data: Value) -> OutboundEvent {
    OutboundEvent {
        kind,
        dog_id,
        data,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn connect(manager: &ConnectionManager, id: &str) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        manager.register(id, tx);
        rx
    }

    fn recv_event(rx: &mut UnboundedReceiver<Message>) -> Option<Value> {
        match rx.try_recv().ok()? {
            Message::Text(text) => serde_json::from_str(&text).ok(),
            _ => None,
        }
    }

    #[test]
    fn test_delivers_only_to_subject_subscribers() {
        let manager = ConnectionManager::new();
        let dog = Uuid::new_v4();
        let mut watcher = connect(&manager, "watcher");
        let mut bystander = connect(&manager, "bystander");
        manager.subscribe("watcher", dog);

        let delivered = manager.send_to_subscribers(dog, EventKind::SensorUpdate, json!({"hr": 120}));
        assert_eq!(delivered, 1);

        let event = recv_event(&mut watcher).unwrap();
        assert_eq!(event["type"], "sensor_update");
        assert_eq!(event["data"]["hr"], 120);
        assert!(recv_event(&mut bystander).is_none());
    }

    #[test]
    fn test_unsubscribed_observer_receives_nothing_further() {
        let manager = ConnectionManager::new();
        let dog = Uuid::new_v4();
        let mut rx = connect(&manager, "watcher");
        manager.subscribe("watcher", dog);

        manager.send_to_subscribers(dog, EventKind::SensorUpdate, json!(1));
        assert!(recv_event(&mut rx).is_some());

        manager.unsubscribe("watcher", dog);
        manager.send_to_subscribers(dog, EventKind::SensorUpdate, json!(2));
        assert!(recv_event(&mut rx).is_none());
        assert_eq!(manager.subscriber_count(dog), 0);
    }

    #[test]
    fn test_deregister_clears_every_subscriber_set() {
        let manager = ConnectionManager::new();
        let dog_a = Uuid::new_v4();
        let dog_b = Uuid::new_v4();
        let _rx = connect(&manager, "watcher");
        manager.subscribe("watcher", dog_a);
        manager.subscribe("watcher", dog_b);

        manager.deregister("watcher");
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.subscriber_count(dog_a), 0);
        assert_eq!(manager.subscriber_count(dog_b), 0);
    }

    #[test]
    fn test_dead_connection_is_pruned_without_aborting_fanout() {
        let manager = ConnectionManager::new();
        let dog = Uuid::new_v4();
        let dead_rx = connect(&manager, "dead");
        let mut live = connect(&manager, "live");
        manager.subscribe("dead", dog);
        manager.subscribe("live", dog);
        drop(dead_rx);

        let delivered = manager.send_to_subscribers(dog, EventKind::SensorUpdate, json!({}));
        assert_eq!(delivered, 1);
        assert!(recv_event(&mut live).is_some());

        // The failed observer is gone from both maps
        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.subscriber_count(dog), 1);
    }

    #[test]
    fn test_escalation_alert_reaches_every_connected_observer_once() {
        let manager = ConnectionManager::new();
        let dog = Uuid::new_v4();
        let mut watcher = connect(&manager, "watcher");
        let mut bystander = connect(&manager, "bystander");
        manager.subscribe("watcher", dog);

        manager.send_intervention_alert(dog, InterventionTier::Critical, json!({"tier": "CRITICAL"}));

        let event = recv_event(&mut watcher).unwrap();
        assert_eq!(event["type"], "intervention_alert");
        // Exactly one delivery to the subscriber, none queued behind it
        assert!(recv_event(&mut watcher).is_none());
        assert!(recv_event(&mut bystander).is_some());
    }

    #[test]
    fn test_medium_alert_stays_with_subscribers() {
        let manager = ConnectionManager::new();
        let dog = Uuid::new_v4();
        let mut watcher = connect(&manager, "watcher");
        let mut bystander = connect(&manager, "bystander");
        manager.subscribe("watcher", dog);

        manager.send_intervention_alert(dog, InterventionTier::Medium, json!({}));
        assert!(recv_event(&mut watcher).is_some());
        assert!(recv_event(&mut bystander).is_none());
    }

    #[test]
    fn test_stale_socket_teardown_keeps_replacement_connection() {
        let manager = ConnectionManager::new();
        let (old_tx, _old_rx) = unbounded_channel();
        manager.register("watcher", old_tx.clone());

        // Reconnect replaces the handle, then the old socket tears down
        let (new_tx, mut new_rx) = unbounded_channel();
        manager.register("watcher", new_tx);
        manager.deregister_if_current("watcher", &old_tx);

        assert_eq!(manager.connection_count(), 1);
        let dog = Uuid::new_v4();
        manager.subscribe("watcher", dog);
        manager.send_to_subscribers(dog, EventKind::SensorUpdate, json!({}));
        assert!(recv_event(&mut new_rx).is_some());
    }
}
