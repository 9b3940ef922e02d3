//! Change bus: the store's mutation notifications.
//!
//! # Invariants
//! - A change is published only after the mutating transaction committed.
//! - Publishing never blocks and never fails when nobody listens.

use tokio::sync::broadcast;

/// Which tables a committed mutation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreChange {
    pub notes: bool,
    pub tags: bool,
    pub links: bool,
}

impl StoreChange {
    pub const NONE: Self = Self {
        notes: false,
        tags: false,
        links: false,
    };
    pub const NOTES: Self = Self {
        notes: true,
        tags: false,
        links: false,
    };
    pub const TAGS: Self = Self {
        notes: false,
        tags: true,
        links: false,
    };
    pub const LINKS: Self = Self {
        notes: false,
        tags: false,
        links: true,
    };
    pub const ALL: Self = Self {
        notes: true,
        tags: true,
        links: true,
    };

    pub fn union(self, other: Self) -> Self {
        Self {
            notes: self.notes || other.notes,
            tags: self.tags || other.tags,
            links: self.links || other.links,
        }
    }

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

/// Broadcast fan-out of `StoreChange` events.
#[derive(Debug)]
pub struct ChangeBus {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeBus {
    /// Creates a bus buffering up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, change: StoreChange) {
        if change.is_empty() {
            return;
        }
        // No receivers is fine: nobody is watching yet.
        let _ = self.sender.send(change);
    }

    /// New subscribers only see changes published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeBus, StoreChange};

    #[test]
    fn union_merges_flags() {
        let merged = StoreChange::NOTES.union(StoreChange::LINKS);
        assert!(merged.notes && merged.links && !merged.tags);
        assert!(StoreChange::NONE.is_empty());
    }

    #[test]
    fn publish_reaches_subscribers_and_skips_empty_changes() {
        let bus = ChangeBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(StoreChange::NONE);
        bus.publish(StoreChange::TAGS);
        assert_eq!(rx.try_recv().unwrap(), StoreChange::TAGS);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = ChangeBus::new(0);
        bus.publish(StoreChange::ALL);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
