//! Adapts the world's subscribe/trigger/event pattern into a single
//! bounded call: register a one-shot waiter, issue the request, wait.

use std::{future::Future, time::Duration};

use crate::{
    error::Result,
    world::{EventBroker, EventKind, WorldEvent},
};

/// Registers a one-shot waiter for `kind`, runs `trigger` to issue the
/// world request, then waits up to `timeout` for a matching event.
/// Returns `None` on timeout. The waiter registration is released on
/// every exit path, including a failing trigger; a reply arriving after
/// that is absorbed by the broker.
pub async fn await_event<F>(
    broker: &EventBroker,
    kind: EventKind,
    timeout: Duration,
    trigger: F,
) -> Result<Option<WorldEvent>>
where
    F: Future<Output = Result<()>>,
{
    let mut waiter = broker.subscribe_once(kind);
    trigger.await?;
    match tokio::time::timeout(timeout, waiter.recv()).await {
        Ok(event) => Ok(event),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use uuid::Uuid;

    use super::*;
    use crate::error::GatewayError;

    #[tokio::test]
    async fn returns_event_when_it_fires() {
        let broker = EventBroker::new();
        let publisher = broker.clone();
        let result = await_event(
            &broker,
            EventKind::MEMBERSHIP,
            Duration::from_secs(5),
            async {
                publisher.publish(&WorldEvent::GroupJoined {
                    group: Uuid::nil(),
                    success: true,
                });
                Ok(())
            },
        )
        .await
        .unwrap();
        assert!(matches!(result, Some(WorldEvent::GroupJoined { .. })));
        assert_eq!(broker.waiter_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_residual_subscription() {
        let broker = EventBroker::new();
        let result = await_event(
            &broker,
            EventKind::BALANCE,
            Duration::from_millis(200),
            async { Ok(()) },
        )
        .await
        .unwrap();
        assert!(result.is_none());
        assert_eq!(broker.waiter_count(), 0);

        // A later wait on the same kind starts clean.
        let publisher = broker.clone();
        let result = await_event(
            &broker,
            EventKind::BALANCE,
            Duration::from_millis(200),
            async {
                publisher.publish(&WorldEvent::MoneyTransferred {
                    target: Uuid::nil(),
                    amount: 1,
                    success: true,
                });
                Ok(())
            },
        )
        .await
        .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn timeout_is_roughly_the_configured_bound() {
        let broker = EventBroker::new();
        let started = Instant::now();
        let result = await_event(
            &broker,
            EventKind::OBJECT,
            Duration::from_millis(50),
            async { Ok(()) },
        )
        .await
        .unwrap();
        assert!(result.is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn failing_trigger_releases_the_waiter() {
        let broker = EventBroker::new();
        let result = await_event(
            &broker,
            EventKind::OBJECT,
            Duration::from_secs(5),
            async { Err(GatewayError::domain("wire down")) },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(broker.waiter_count(), 0);
    }
}
