//! Event-driven fan-out of world events to registered HTTP endpoints.
//! Deliveries are fire-and-forget: each matching registration gets its own
//! task, with no admission bound. A busy event type can therefore fan out
//! into many concurrent outbound POSTs; worth keeping in mind when sizing
//! deployments.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::{
    attributes,
    auth,
    config::ConfigHandle,
    wire,
    world::{EventKind, WorldEvent},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub url: String,
    pub mask: EventKind,
}

struct BusInner {
    config: ConfigHandle,
    http: reqwest::Client,
    entries: Mutex<HashMap<String, Registration>>,
}

#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    pub fn new(config: ConfigHandle) -> Self {
        let timeout = config.snapshot().notification_timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build http client");
        Self {
            inner: Arc::new(BusInner {
                config,
                http,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers the group's endpoint, replacing any previous
    /// registration for the same group.
    pub fn register(&self, group: &str, url: String, mask: EventKind) {
        self.inner
            .entries
            .lock()
            .insert(group.to_string(), Registration { url, mask });
    }

    pub fn unregister(&self, group: &str) -> bool {
        self.inner.entries.lock().remove(group).is_some()
    }

    pub fn registration(&self, group: &str) -> Option<Registration> {
        self.inner.entries.lock().get(group).cloned()
    }

    /// Fans the event out to every registration whose mask covers it and
    /// whose group still holds the matching notification bit in the
    /// current snapshot. Each delivery runs on its own task; failures are
    /// logged and dropped.
    pub fn dispatch(&self, event: &WorldEvent) {
        let kind = event.kind();
        let snapshot = self.inner.config.snapshot();
        let targets: Vec<(String, String)> = {
            let entries = self.inner.entries.lock();
            entries
                .iter()
                .filter(|(group, registration)| {
                    registration.mask.intersects(kind)
                        && snapshot
                            .group(group)
                            .map(|g| auth::has_notification(g, kind))
                            .unwrap_or(false)
                })
                .map(|(group, registration)| (group.clone(), registration.url.clone()))
                .collect()
        };
        if targets.is_empty() {
            return;
        }

        let fields: BTreeMap<String, String> = event_fields(event).into_iter().collect();
        let body = wire::encode(&wire::escape_map(&fields));
        for (group, url) in targets {
            let client = self.inner.http.clone();
            let body = body.clone();
            tokio::spawn(async move {
                match client
                    .post(&url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body)
                    .send()
                    .await
                {
                    Ok(_) => debug!("notification for {} delivered to {}", group, url),
                    Err(err) => {
                        warn!("notification for {} to {} failed: {}", group, url, err);
                    }
                }
            });
        }
    }
}

/// Event-specific field set for a notification body. Every body carries a
/// `type` key naming the event category.
pub fn event_fields(event: &WorldEvent) -> Vec<(String, String)> {
    let mut fields = vec![("type".to_string(), event.name().to_string())];
    match event {
        WorldEvent::Alert { message } => {
            fields.push(("message".to_string(), message.clone()));
        }
        WorldEvent::InstantMessage {
            agent,
            name,
            message,
        } => {
            fields.push(("agent".to_string(), agent.to_string()));
            fields.push(("name".to_string(), name.clone()));
            fields.push(("message".to_string(), message.clone()));
        }
        WorldEvent::GroupChat {
            group,
            agent,
            name,
            message,
        } => {
            fields.push(("group".to_string(), group.to_string()));
            fields.push(("agent".to_string(), agent.to_string()));
            fields.push(("name".to_string(), name.clone()));
            fields.push(("message".to_string(), message.clone()));
        }
        WorldEvent::GroupJoined { group, success } => {
            fields.push(("group".to_string(), group.to_string()));
            fields.push(("success".to_string(), success.to_string()));
        }
        WorldEvent::MoneyTransferred {
            target,
            amount,
            success,
        } => {
            fields.push(("target".to_string(), target.to_string()));
            fields.push(("amount".to_string(), amount.to_string()));
            fields.push(("success".to_string(), success.to_string()));
        }
        WorldEvent::ObjectRezzed { item, object } => {
            fields.push(("item".to_string(), item.to_string()));
            fields.push(("object".to_string(), object.to_string()));
        }
        WorldEvent::ParcelInfo(parcel) => {
            fields.extend(attributes::to_row(
                parcel,
                &["name", "description", "owner", "area", "musicurl"],
            ));
        }
        WorldEvent::FriendshipOffered { agent, name } => {
            fields.push(("agent".to_string(), agent.to_string()));
            fields.push(("name".to_string(), name.clone()));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn registration_replaces_previous_entry() {
        let bus = NotificationBus::new(ConfigHandle::new(crate::config::Config::default()));
        bus.register("Tester", "http://one.example/".to_string(), EventKind::ALERT);
        bus.register(
            "Tester",
            "http://two.example/".to_string(),
            EventKind::BALANCE,
        );
        let registration = bus.registration("Tester").unwrap();
        assert_eq!(registration.url, "http://two.example/");
        assert_eq!(registration.mask, EventKind::BALANCE);
        assert!(bus.unregister("Tester"));
        assert!(!bus.unregister("Tester"));
    }

    #[test]
    fn fields_carry_the_event_type() {
        let fields = event_fields(&WorldEvent::GroupJoined {
            group: Uuid::nil(),
            success: true,
        });
        assert_eq!(fields[0], ("type".to_string(), "membership".to_string()));
        assert!(fields.contains(&("success".to_string(), "true".to_string())));
    }
}
