use rdt_lab_abstract::{EntityId, Packet, SimConfig};
use tracing::trace;

use crate::random::UniformSource;
use crate::scheduler::{Event, EventKind, Scheduler};

/// Number of distinct fill patterns ('a' through 'z').
pub const FILL_PATTERNS: u32 = 26;

/// Packet number `n`: a run of the `n mod 26`-th lowercase letter, NUL-terminated.
pub fn fill_pattern(n: u32) -> Packet {
    Packet::filled(b'a' + (n % FILL_PATTERNS) as u8)
}

/// Produces application arrivals with random gaps of mean `mean_interarrival`.
#[derive(Debug, Clone)]
pub struct AppDataGenerator {
    max_packets: u32,
    generated: u32,
    mean_interarrival: f64,
    bidirectional: bool,
}

impl AppDataGenerator {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            max_packets: config.max_packets,
            generated: 0,
            mean_interarrival: config.mean_interarrival,
            bidirectional: config.bidirectional,
        }
    }

    pub fn generated(&self) -> u32 {
        self.generated
    }

    pub fn is_exhausted(&self) -> bool {
        self.generated >= self.max_packets
    }

    /// Schedule the next arrival `2 * mean * U` after now.
    ///
    /// In bidirectional mode a second draw above 0.5 sends it to B.
    pub fn schedule_next(&self, scheduler: &mut Scheduler, rng: &mut dyn UniformSource) {
        let gap = self.mean_interarrival * rng.next_uniform() * 2.0;
        let entity = if self.bidirectional && rng.next_uniform() > 0.5 {
            EntityId::B
        } else {
            EntityId::A
        };
        let time = scheduler.now() + gap;
        trace!("next application arrival for {} at {:.3}", entity, time);
        scheduler.insert(Event::new(time, entity, EventKind::AppArrival(None)));
    }

    /// Handle a generator-driven arrival that just fired.
    ///
    /// Schedules the following arrival first (while more remain), then returns
    /// the packet to hand over. Returns `None` once `max_packets` is reached.
    pub fn on_arrival(
        &mut self,
        scheduler: &mut Scheduler,
        rng: &mut dyn UniformSource,
    ) -> Option<Packet> {
        if self.is_exhausted() {
            return None;
        }
        if self.generated + 1 < self.max_packets {
            self.schedule_next(scheduler, rng);
        }
        let packet = fill_pattern(self.generated);
        self.generated += 1;
        Some(packet)
    }
}
