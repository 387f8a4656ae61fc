use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reminders::ReminderKind;

/// Why a break left `BreakActive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakEndReason {
    Completed,
    Ended,
    Skipped,
    Disabled,
}

/// Every state change in the scheduler produces an Event.
/// The overlay orchestrator consumes them in order; listeners observe them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CountdownStarted {
        next_break_in_secs: u64,
        at: DateTime<Utc>,
    },
    PreBreakCountdownShown {
        next_break_in_secs: u64,
        at: DateTime<Utc>,
    },
    /// Main countdown tick while the pre-break badge is up.
    PreBreakCountdownTick {
        next_break_in_secs: u64,
        at: DateTime<Utc>,
    },
    PreBreakCountdownHidden {
        at: DateTime<Utc>,
    },
    BreakStarted {
        break_seq: u64,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    BreakTick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    BreakEnded {
        break_seq: u64,
        reason: BreakEndReason,
        at: DateTime<Utc>,
    },
    BreakPostponed {
        by_secs: u64,
        next_break_in_secs: u64,
        at: DateTime<Utc>,
    },
    TimerDisabled {
        at: DateTime<Utc>,
    },
    ReminderShown {
        kind: ReminderKind,
        message: String,
        at: DateTime<Utc>,
    },
    ReminderDismissed {
        kind: ReminderKind,
        at: DateTime<Utc>,
    },
    PresetApplied {
        preset_id: Uuid,
        name: String,
        at: DateTime<Utc>,
    },
}

/// Id returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Event) + Send>;

/// Ordered event queue with external listeners.
///
/// Producers publish; the engine drains the queue in publication order,
/// feeds each event to the orchestrator and then to every listener. Nothing
/// is coalesced or reordered.
#[derive(Default)]
pub struct EventBus {
    queue: VecDeque<Event>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether the listener existed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn notify_listeners(&mut self, event: &Event) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("queued", &self.queue.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn queue_preserves_publication_order() {
        let mut bus = EventBus::new();
        bus.publish(Event::PreBreakCountdownHidden { at: Utc::now() });
        bus.publish(Event::BreakStarted {
            break_seq: 1,
            duration_secs: 20,
            at: Utc::now(),
        });
        assert!(matches!(bus.pop(), Some(Event::PreBreakCountdownHidden { .. })));
        assert!(matches!(bus.pop(), Some(Event::BreakStarted { break_seq: 1, .. })));
        assert!(bus.pop().is_none());
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let mut bus = EventBus::new();
        let id = bus.subscribe(move |_| *counter.lock().unwrap() += 1);

        let event = Event::TimerDisabled { at: Utc::now() };
        bus.notify_listeners(&event);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.notify_listeners(&event);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::BreakEnded {
            break_seq: 3,
            reason: BreakEndReason::Skipped,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BreakEnded");
        assert_eq!(json["reason"], "skipped");
    }
}
