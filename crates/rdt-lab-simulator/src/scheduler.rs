use rdt_lab_abstract::{EntityId, Frame, Packet};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::ScheduleError;

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The entity's retransmission timer goes off.
    Timer,
    /// The application has data for the entity. `None` asks the generator for it.
    AppArrival(Option<Packet>),
    /// A frame pops out of the channel at the entity.
    FrameArrival(Frame),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Timer => "timer",
            EventKind::AppArrival(_) => "app_arrival",
            EventKind::FrameArrival(_) => "frame_arrival",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: f64,
    pub entity: EntityId,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: f64, entity: EntityId, kind: EventKind) -> Self {
        Self { time, entity, kind }
    }

    pub fn is_timer_for(&self, entity: EntityId) -> bool {
        self.entity == entity && self.kind == EventKind::Timer
    }

    pub fn is_frame_arrival_at(&self, entity: EntityId) -> bool {
        self.entity == entity && matches!(self.kind, EventKind::FrameArrival(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct EventKey {
    time: f64,
    id: u64, // insertion order, breaks ties between equal times
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Simulation clock plus the time-ordered list of pending events.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: f64,
    queue: BTreeMap<EventKey, Event>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.queue.keys().next().map(|k| k.time)
    }

    /// Pending events in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.queue.values()
    }

    pub fn insert(&mut self, event: Event) {
        debug_assert!(
            event.time >= self.now,
            "event scheduled in the past ({} < {})",
            event.time,
            self.now
        );
        let key = EventKey {
            time: event.time,
            id: self.next_id,
        };
        self.next_id += 1;
        self.queue.insert(key, event);
    }

    /// Insert `event` unless its time is non-finite or earlier than [`Scheduler::now`].
    pub fn try_insert(&mut self, event: Event) -> Result<(), ScheduleError> {
        if !event.time.is_finite() || event.time < self.now {
            return Err(ScheduleError::InvalidTime {
                time: event.time,
                now: self.now,
            });
        }
        self.insert(event);
        Ok(())
    }

    /// Remove the earliest event and advance the clock to its time.
    pub fn pop_earliest(&mut self) -> Option<Event> {
        let (_, event) = self.queue.pop_first()?;
        self.now = event.time;
        Some(event)
    }

    /// Remove the earliest pending event matching `predicate`.
    pub fn cancel<F>(&mut self, predicate: F) -> Result<Event, ScheduleError>
    where
        F: Fn(&Event) -> bool,
    {
        let key = self
            .queue
            .iter()
            .find(|(_, event)| predicate(event))
            .map(|(key, _)| *key)
            .ok_or(ScheduleError::NoMatchingEvent)?;
        self.queue.remove(&key).ok_or(ScheduleError::NoMatchingEvent)
    }

    pub fn has_timer(&self, entity: EntityId) -> bool {
        self.queue.values().any(|e| e.is_timer_for(entity))
    }

    /// Schedule a timer event for `entity` at `now + duration`.
    pub fn start_timer(&mut self, entity: EntityId, duration: f64) -> Result<(), ScheduleError> {
        if self.has_timer(entity) {
            return Err(ScheduleError::TimerAlreadyRunning(entity));
        }
        self.insert(Event::new(self.now + duration, entity, EventKind::Timer));
        Ok(())
    }

    pub fn stop_timer(&mut self, entity: EntityId) -> Result<(), ScheduleError> {
        self.cancel(|e| e.is_timer_for(entity))
            .map(|_| ())
            .map_err(|_| ScheduleError::TimerNotRunning(entity))
    }
}
