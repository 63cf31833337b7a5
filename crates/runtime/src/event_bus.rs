use std::collections::VecDeque;

/// Severity of a recorded event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured diagnostic event for the host UI.
///
/// `index` is assigned by the bus and increases by one per emitted event, so
/// consumers can tell which events they have already seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub index: u64,
    pub level: EventLevel,
    pub kind: &'static str,
    pub message: String,
}

/// Events kept by a bus built with [`EventBus::new`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Bounded log of recent events. Once full, the oldest event is dropped for
/// every new one.
#[derive(Debug)]
pub struct EventBus {
    next_index: u64,
    capacity: usize,
    events: VecDeque<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// A capacity of zero keeps one event.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            next_index: 0,
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn emit(&mut self, level: EventLevel, kind: &'static str, message: impl Into<String>) {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(Event {
            index,
            level,
            kind,
            message: message.into(),
        });
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_of_kind(&self, kind: &str) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, EventLevel};

    #[test]
    fn assigns_increasing_indices() {
        let mut bus = EventBus::new();
        bus.emit(EventLevel::Info, "fetch", "a");
        bus.emit(EventLevel::Warn, "stale", "b");
        let idx: Vec<u64> = bus.events().map(|e| e.index).collect();
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(bus.last_of_kind("stale").map(|e| e.level), Some(EventLevel::Warn));
    }

    #[test]
    fn drain_clears_events_but_keeps_numbering() {
        let mut bus = EventBus::new();
        bus.emit(EventLevel::Info, "k", "m");
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.is_empty());

        bus.emit(EventLevel::Info, "k", "n");
        assert_eq!(bus.events().next().map(|e| e.index), Some(1));
    }

    #[test]
    fn full_bus_drops_oldest_events() {
        let mut bus = EventBus::with_capacity(3);
        for i in 0..10 {
            bus.emit(EventLevel::Debug, "fetch_started", format!("#{i}"));
        }
        assert_eq!(bus.len(), 3);
        let idx: Vec<u64> = bus.events().map(|e| e.index).collect();
        assert_eq!(idx, vec![7, 8, 9]);
    }
}
