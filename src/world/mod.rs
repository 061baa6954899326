//! Boundary to the asynchronous virtual-world client. The gateway never
//! assumes a request completes synchronously: requests are submitted
//! through [`WorldService`] and answered, if at all, by a later
//! [`WorldEvent`] flowing through the [`EventBroker`].

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use bitflags::bitflags;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{attributes::ParcelInfo, error::Result};

pub mod loopback;

pub use loopback::LoopbackWorld;

bitflags! {
    /// World-event categories. Doubles as the per-group notification mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventKind: u32 {
        const ALERT = 1 << 0;
        const MESSAGE = 1 << 1;
        const GROUP_CHAT = 1 << 2;
        const MEMBERSHIP = 1 << 3;
        const BALANCE = 1 << 4;
        const OBJECT = 1 << 5;
        const PARCEL = 1 << 6;
        const FRIENDSHIP = 1 << 7;
    }
}

impl EventKind {
    const NAMES: [(Self, &'static str); 8] = [
        (Self::ALERT, "alert"),
        (Self::MESSAGE, "message"),
        (Self::GROUP_CHAT, "groupchat"),
        (Self::MEMBERSHIP, "membership"),
        (Self::BALANCE, "balance"),
        (Self::OBJECT, "object"),
        (Self::PARCEL, "parcel"),
        (Self::FRIENDSHIP, "friendship"),
    ];

    pub fn flag_from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(_, label)| *label == name)
            .map(|(kind, _)| *kind)
    }

    pub fn from_names<I, S>(names: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = Self::empty();
        for name in names {
            let name = name.as_ref();
            mask |= Self::flag_from_name(name).ok_or_else(|| name.to_string())?;
        }
        Ok(mask)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(kind, _)| self.contains(*kind))
            .map(|(_, label)| *label)
            .collect()
    }

    pub fn label(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, label)| *label)
            .unwrap_or("unknown")
    }
}

/// An event observed in the world, fanned out to one-shot command waiters
/// and to the notification bus.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    Alert {
        message: String,
    },
    InstantMessage {
        agent: Uuid,
        name: String,
        message: String,
    },
    GroupChat {
        group: Uuid,
        agent: Uuid,
        name: String,
        message: String,
    },
    GroupJoined {
        group: Uuid,
        success: bool,
    },
    MoneyTransferred {
        target: Uuid,
        amount: i64,
        success: bool,
    },
    ObjectRezzed {
        item: Uuid,
        object: Uuid,
    },
    ParcelInfo(ParcelInfo),
    FriendshipOffered {
        agent: Uuid,
        name: String,
    },
}

impl WorldEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Alert { .. } => EventKind::ALERT,
            Self::InstantMessage { .. } => EventKind::MESSAGE,
            Self::GroupChat { .. } => EventKind::GROUP_CHAT,
            Self::GroupJoined { .. } => EventKind::MEMBERSHIP,
            Self::MoneyTransferred { .. } => EventKind::BALANCE,
            Self::ObjectRezzed { .. } => EventKind::OBJECT,
            Self::ParcelInfo(_) => EventKind::PARCEL,
            Self::FriendshipOffered { .. } => EventKind::FRIENDSHIP,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().label()
    }
}

/// Where chat output is directed.
#[derive(Debug, Clone)]
pub enum ChatScope {
    Local,
    Group(Uuid),
    Avatar(Uuid),
}

/// An asynchronous request issued against the world.
#[derive(Debug, Clone)]
pub enum WorldRequest {
    JoinGroup { group: Uuid },
    GiveMoney { target: Uuid, amount: i64 },
    RezObject { item: Uuid },
    Chat { scope: ChatScope, message: String },
    RequestParcelInfo,
}

#[async_trait]
pub trait WorldService: Send + Sync {
    /// Issues the request and returns as soon as it is on the wire; the
    /// reply, if any, arrives later as a [`WorldEvent`].
    async fn submit(&self, request: WorldRequest) -> Result<()>;
}

struct Waiter {
    id: u64,
    kind: EventKind,
    tx: oneshot::Sender<WorldEvent>,
}

struct BrokerInner {
    next_id: AtomicU64,
    waiters: Mutex<Vec<Waiter>>,
}

/// One-shot waiter registry for the call adapter. Events published for a
/// kind nobody is waiting on are absorbed silently.
#[derive(Clone)]
pub struct EventBroker {
    inner: Arc<BrokerInner>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                next_id: AtomicU64::new(0),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a one-shot waiter for `kind`. The registration is removed
    /// when the event fires or when the returned waiter is dropped,
    /// whichever comes first.
    pub fn subscribe_once(&self, kind: EventKind) -> EventWaiter {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.waiters.lock().push(Waiter { id, kind, tx });
        EventWaiter {
            id,
            inner: Arc::clone(&self.inner),
            rx,
        }
    }

    /// Delivers `event` to every waiter whose kind matches and removes
    /// them from the registry. Senders fire outside the registry lock.
    pub fn publish(&self, event: &WorldEvent) {
        let kind = event.kind();
        let fired: Vec<Waiter> = {
            let mut waiters = self.inner.waiters.lock();
            let (fired, kept) = std::mem::take(&mut *waiters)
                .into_iter()
                .partition(|waiter| waiter.kind.intersects(kind));
            *waiters = kept;
            fired
        };
        for waiter in fired {
            let _ = waiter.tx.send(event.clone());
        }
    }

    pub fn waiter_count(&self) -> usize {
        self.inner.waiters.lock().len()
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventWaiter {
    id: u64,
    inner: Arc<BrokerInner>,
    rx: oneshot::Receiver<WorldEvent>,
}

impl EventWaiter {
    pub async fn recv(&mut self) -> Option<WorldEvent> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for EventWaiter {
    fn drop(&mut self) {
        self.inner.waiters.lock().retain(|waiter| waiter.id != self.id);
    }
}
