//! In-process stand-in for a live world connection. Session bootstrap and
//! the real wire protocol live outside this crate; the loopback world
//! acknowledges every request with a synthesized success event, which is
//! enough for dry runs and for the integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::{
    attributes::{NameResolver, ParcelInfo},
    error::{GatewayError, Result},
    world::{WorldEvent, WorldRequest, WorldService},
};

pub struct LoopbackWorld {
    events: UnboundedSender<WorldEvent>,
    items: Mutex<HashMap<String, Uuid>>,
    parcel: ParcelInfo,
}

impl LoopbackWorld {
    /// Builds the world and the event stream it feeds. The receiver side
    /// is handed to the gateway's event pump.
    pub fn create() -> (std::sync::Arc<Self>, UnboundedReceiver<WorldEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let world = Self {
            events: tx,
            items: Mutex::new(HashMap::new()),
            parcel: ParcelInfo {
                name: "Loopback Plaza".to_string(),
                description: "simulated parcel".to_string(),
                owner: Some(Uuid::new_v4()),
                area: Some(512),
                music_url: String::new(),
            },
        };
        (std::sync::Arc::new(world), rx)
    }

    /// Stocks a named item in the searchable catalog and returns its
    /// identifier.
    pub fn stock_item(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.items.lock().insert(name.to_string(), id);
        id
    }

    /// Injects an arbitrary event into the stream, as though the world
    /// had produced it.
    pub fn inject(&self, event: WorldEvent) {
        let _ = self.events.send(event);
    }

    fn emit(&self, event: WorldEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| GatewayError::Storage("world event stream closed".to_string()))
    }
}

#[async_trait]
impl WorldService for LoopbackWorld {
    async fn submit(&self, request: WorldRequest) -> Result<()> {
        match request {
            WorldRequest::JoinGroup { group } => self.emit(WorldEvent::GroupJoined {
                group,
                success: true,
            }),
            WorldRequest::GiveMoney { target, amount } => {
                self.emit(WorldEvent::MoneyTransferred {
                    target,
                    amount,
                    success: true,
                })
            }
            WorldRequest::RezObject { item } => self.emit(WorldEvent::ObjectRezzed {
                item,
                object: Uuid::new_v4(),
            }),
            WorldRequest::Chat { .. } => Ok(()),
            WorldRequest::RequestParcelInfo => {
                self.emit(WorldEvent::ParcelInfo(self.parcel.clone()))
            }
        }
    }
}

impl NameResolver for LoopbackWorld {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        self.items.lock().get(name).copied()
    }
}
