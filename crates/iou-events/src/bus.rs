//! Room-based publish/subscribe fan-out.

use async_trait::async_trait;
use dashmap::DashMap;
use iou_core::DebtId;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::error::EventError;
use crate::events::DebtEvent;
use crate::rooms::Room;

/// Default per-room buffer before slow subscribers start lagging.
pub const DEFAULT_ROOM_CAPACITY: usize = 64;

/// Real-time delivery to every session subscribed to a room.
///
/// Delivery is at-most-once and best effort: a client that is not subscribed
/// when the event is published never sees it and must re-fetch on reconnect.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish `event` to `room`. Returns how many subscribers received it.
    async fn publish(&self, room: &Room, event: &DebtEvent) -> Result<usize, EventError>;
}

struct RoomChannel {
    sender: broadcast::Sender<DebtEvent>,
    /// Highest ledger version delivered per debt in this room.
    watermarks: HashMap<DebtId, u64>,
}

impl RoomChannel {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            watermarks: HashMap::new(),
        }
    }
}

/// In-process fan-out over `tokio::sync::broadcast`, one channel per room.
///
/// Within a room, events for one debt are delivered in ledger version order.
/// An event older than one already delivered for the same debt is dropped;
/// the newer snapshot supersedes it.
pub struct BroadcastEventBus {
    rooms: DashMap<Room, RoomChannel>,
    capacity: usize,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Join a room. The receiver sees events published after this call.
    pub fn subscribe(&self, room: Room) -> broadcast::Receiver<DebtEvent> {
        let capacity = self.capacity;
        let receiver = self
            .rooms
            .entry(room)
            .or_insert_with(|| RoomChannel::new(capacity))
            .sender
            .subscribe();
        tracing::debug!(room = %room, "room subscription opened");
        receiver
    }

    /// Live subscribers of `room`.
    pub fn subscriber_count(&self, room: &Room) -> usize {
        self.rooms
            .get(room)
            .map(|c| c.sender.receiver_count())
            .unwrap_or(0)
    }

    /// Rooms with a channel allocated.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn deliver(&self, room: &Room, event: &DebtEvent) -> usize {
        let Some(mut channel) = self.rooms.get_mut(room) else {
            return 0;
        };

        if channel.sender.receiver_count() == 0 {
            drop(channel);
            self.rooms
                .remove_if(room, |_, c| c.sender.receiver_count() == 0);
            tracing::trace!(room = %room, "dropped idle room");
            return 0;
        }

        let debt_id = event.debt.id;
        let version = event.version();
        let delivered_up_to = channel.watermarks.get(&debt_id).copied().unwrap_or(0);
        if version <= delivered_up_to {
            tracing::debug!(
                room = %room,
                debt_id = %debt_id,
                version,
                delivered_up_to,
                "skipping superseded event"
            );
            return 0;
        }
        channel.watermarks.insert(debt_id, version);

        channel.sender.send(event.clone()).unwrap_or(0)
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, room: &Room, event: &DebtEvent) -> Result<usize, EventError> {
        let delivered = self.deliver(room, event);
        tracing::debug!(
            room = %room,
            event = %event.name,
            debt_id = %event.debt.id,
            delivered,
            "event published"
        );
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use iou_core::{Debt, IdentityId, NewDebt, Outcome};
    use tokio::sync::broadcast::error::TryRecvError;

    fn event_at(debt: &Debt, version: u64) -> DebtEvent {
        let mut snapshot = debt.clone();
        snapshot.version = version;
        DebtEvent::new(snapshot, Outcome::Updated { due_date_moved: false }, None)
    }

    fn sample_debt() -> Debt {
        Debt::open(NewDebt::new(IdentityId::new(), IdentityId::new(), 100), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = BroadcastEventBus::default();
        let debt = sample_debt();
        let delivered = bus.publish(&Room::Debt(debt.id), &event_at(&debt, 1)).await.unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(bus.room_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = BroadcastEventBus::default();
        let debt = sample_debt();
        let room = Room::Debt(debt.id);
        let mut rx1 = bus.subscribe(room);
        let mut rx2 = bus.subscribe(room);
        assert_eq!(bus.subscriber_count(&room), 2);

        assert_eq!(bus.publish(&room, &event_at(&debt, 1)).await.unwrap(), 2);
        assert_eq!(bus.publish(&room, &event_at(&debt, 2)).await.unwrap(), 2);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap().version(), 1);
            assert_eq!(rx.recv().await.unwrap().version(), 2);
        }
    }

    #[tokio::test]
    async fn test_stale_event_is_skipped() {
        let bus = BroadcastEventBus::default();
        let debt = sample_debt();
        let room = Room::User(debt.sender_identity_id);
        let mut rx = bus.subscribe(room);

        bus.publish(&room, &event_at(&debt, 3)).await.unwrap();
        let delivered = bus.publish(&room, &event_at(&debt, 2)).await.unwrap();
        assert_eq!(delivered, 0);

        assert_eq!(rx.recv().await.unwrap().version(), 3);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_watermarks_are_per_debt() {
        let bus = BroadcastEventBus::default();
        let a = sample_debt();
        let b = sample_debt();
        let room = Room::User(IdentityId::new());
        let mut rx = bus.subscribe(room);

        bus.publish(&room, &event_at(&a, 5)).await.unwrap();
        assert_eq!(bus.publish(&room, &event_at(&b, 1)).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().debt.id, a.id);
        assert_eq!(rx.recv().await.unwrap().debt.id, b.id);
    }

    #[tokio::test]
    async fn test_idle_room_is_released() {
        let bus = BroadcastEventBus::default();
        let debt = sample_debt();
        let room = Room::Debt(debt.id);
        let rx = bus.subscribe(room);
        assert_eq!(bus.room_count(), 1);
        drop(rx);

        assert_eq!(bus.publish(&room, &event_at(&debt, 1)).await.unwrap(), 0);
        assert_eq!(bus.room_count(), 0);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let bus = BroadcastEventBus::default();
        let debt = sample_debt();
        let mut other = bus.subscribe(Room::User(IdentityId::new()));
        let _mine = bus.subscribe(Room::Debt(debt.id));

        bus.publish(&Room::Debt(debt.id), &event_at(&debt, 1)).await.unwrap();
        assert!(matches!(other.try_recv(), Err(TryRecvError::Empty)));
    }
}
