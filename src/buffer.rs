// Event Buffer and Retained Log
//
// `EventBuffer` holds validated events until the next flush hands them to the
// persistent store. `EventLog` keeps a bounded tail of recent events so
// reports can still be built when the store cannot be queried.
//
// Both use a std mutex that is only ever held for the duration of a push,
// copy or drain, never across an await point.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::models::InteractionEvent;

/// Ordered pending events. The buffer never reorders what it is given.
#[derive(Default)]
pub struct EventBuffer {
    events: Mutex<Vec<InteractionEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InteractionEvent) -> usize {
        let mut events = self.lock();
        events.push(event);
        events.len()
    }

    /// Copy of everything currently buffered, in order
    pub fn snapshot(&self) -> Vec<InteractionEvent> {
        self.lock().clone()
    }

    /// Remove the events of a previously taken snapshot.
    ///
    /// Only the leading run of events whose ids match the snapshot, in order,
    /// is removed; anything pushed after the snapshot was taken stays put.
    /// Returns how many events were removed.
    pub fn remove_flushed(&self, flushed: &[InteractionEvent]) -> usize {
        let mut events = self.lock();
        let matched = events
            .iter()
            .zip(flushed)
            .take_while(|(buffered, sent)| buffered.id == sent.id)
            .count();
        events.drain(..matched);
        matched
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<InteractionEvent>> {
        // A panic while holding the lock cannot leave a Vec half-written
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bounded log of recent events, oldest evicted first
pub struct EventLog {
    events: Mutex<VecDeque<InteractionEvent>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entries beyond capacity.
    /// Returns the number of evicted events.
    pub fn push(&self, event: InteractionEvent) -> usize {
        let mut events = self.lock();
        events.push_back(event);
        let mut evicted = 0;
        while events.len() > self.capacity {
            events.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn extend(&self, batch: &[InteractionEvent]) {
        for event in batch {
            self.push(event.clone());
        }
    }

    /// Events matching the predicate, in insertion order
    pub fn collect_where(
        &self,
        mut keep: impl FnMut(&InteractionEvent) -> bool,
    ) -> Vec<InteractionEvent> {
        self.lock().iter().filter(|e| keep(e)).cloned().collect()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<InteractionEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityCode, InteractionAction};
    use chrono::Utc;

    fn event(code: &str) -> InteractionEvent {
        InteractionEvent {
            id: Uuid::new_v4(),
            entity_code: EntityCode::parse(code).unwrap(),
            action: InteractionAction::Hover,
            timestamp: Utc::now(),
            client_signature: "test-agent".into(),
            session_id: Uuid::nil(),
            metadata: None,
        }
    }

    #[test]
    fn remove_flushed_keeps_events_pushed_after_snapshot() {
        let buffer = EventBuffer::new();
        buffer.push(event("CA"));
        buffer.push(event("TX"));

        let snapshot = buffer.snapshot();
        let late = event("NY");
        let late_id = late.id;
        buffer.push(late);

        assert_eq!(buffer.remove_flushed(&snapshot), 2);
        let remaining = buffer.snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, late_id);
    }

    #[test]
    fn remove_flushed_ignores_mismatched_snapshot() {
        let buffer = EventBuffer::new();
        buffer.push(event("CA"));
        let stale = vec![event("CA")];

        assert_eq!(buffer.remove_flushed(&stale), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn log_never_exceeds_capacity() {
        let log = EventLog::new(5);
        let mut last_id = Uuid::nil();
        for _ in 0..50 {
            let e = event("WA");
            last_id = e.id;
            log.push(e);
            assert!(log.len() <= 5);
        }
        assert_eq!(log.len(), 5);
        assert!(log.contains(last_id));
    }

    #[test]
    fn log_with_zero_capacity_stays_empty() {
        let log = EventLog::new(0);
        assert_eq!(log.push(event("OR")), 1);
        assert!(log.is_empty());
    }
}
