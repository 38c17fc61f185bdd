use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::BookingStatus;

const CHANNEL_CAPACITY: usize = 256;

/// What changed in a theatre's schedule. Views subscribe per theatre and
/// refetch on receipt instead of polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingEvent {
    Created {
        id: Ulid,
        theater: u32,
        date: NaiveDate,
    },
    StatusChanged {
        id: Ulid,
        theater: u32,
        status: BookingStatus,
    },
    Deleted {
        id: Ulid,
        theater: u32,
    },
}

/// Broadcast hub for schedule-change notifications, one channel per theatre.
pub struct NotifyHub {
    channels: DashMap<u32, broadcast::Sender<BookingEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a theatre's changes. Creates the channel if needed.
    pub fn subscribe(&self, theater: u32) -> broadcast::Receiver<BookingEvent> {
        let sender = self
            .channels
            .entry(theater)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, theater: u32, event: &BookingEvent) {
        if let Some(sender) = self.channels.get(&theater) {
            let _ = sender.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(1);

        let event = BookingEvent::Deleted {
            id: Ulid::new(),
            theater: 1,
        };
        hub.send(1, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // No subscriber — should not panic
        hub.send(
            2,
            &BookingEvent::Deleted {
                id: Ulid::new(),
                theater: 2,
            },
        );
    }

    #[tokio::test]
    async fn channels_are_per_theater() {
        let hub = NotifyHub::new();
        let mut rx_one = hub.subscribe(1);
        let _rx_two = hub.subscribe(2);

        hub.send(
            2,
            &BookingEvent::Deleted {
                id: Ulid::new(),
                theater: 2,
            },
        );
        assert!(rx_one.try_recv().is_err());
    }
}
