use crate::entity::{EntityId, Owner, Vec2};

/// Notable simulation outcomes, published once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    UnitSpawned { id: EntityId, owner: Owner },
    UnitKilled { id: EntityId },
    UnitArrived { id: EntityId, position: Vec2 },
}

type Subscriber = Box<dyn FnMut(&GameEvent) + Send>;

/// Collects events during a tick and hands them to subscribers at the end of it.
#[derive(Default)]
pub struct EventBus {
    pending: Vec<GameEvent>,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&GameEvent) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn pending(&self) -> &[GameEvent] {
        &self.pending
    }

    /// Delivers all pending events to every subscriber and returns them.
    pub fn flush(&mut self) -> Vec<GameEvent> {
        let events = std::mem::take(&mut self.pending);
        for subscriber in &mut self.subscribers {
            for event in &events {
                subscriber(event);
            }
        }
        events
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
