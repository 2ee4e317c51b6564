use rdt_lab_abstract::{Corruption, EntityId, Frame, SimConfig};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::random::UniformSource;
use crate::scheduler::{Event, EventKind, Scheduler};

/// Minimum one-way delay added on top of the latest pending arrival.
pub const MIN_DELAY: f64 = 1.0;
/// Width of the uniformly distributed part of the delay.
pub const DELAY_SPREAD: f64 = 9.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub frames_sent: u32,
    pub frames_lost: u32,
    pub frames_corrupted: u32,
}

/// What became of a frame handed to the channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transmission {
    Lost { injected: bool },
    Scheduled {
        arrival: f64,
        corruption: Option<Corruption>,
    },
}

/// Deterministic loss: drops the next frame from `from` that matches.
#[derive(Debug, Clone, PartialEq)]
struct DropRule {
    from: EntityId,
    seq: Option<u32>,
    ack: Option<u32>,
}

impl DropRule {
    fn matches(&self, from: EntityId, frame: &Frame) -> bool {
        if self.from != from {
            return false;
        }
        match (self.seq, self.ack) {
            (None, None) => true,
            (seq, ack) => {
                (seq.is_some() && frame.seqnum() == seq) || (ack.is_some() && frame.acknum() == ack)
            }
        }
    }
}

/// Lossy, corrupting, delaying channel that never reorders frames headed to
/// the same destination.
#[derive(Debug, Clone)]
pub struct Channel {
    loss_prob: f64,
    corrupt_prob: f64,
    last_arrival: HashMap<EntityId, f64>,
    drop_rules: Vec<DropRule>,
    stats: ChannelStats,
}

impl Channel {
    pub fn new(loss_prob: f64, corrupt_prob: f64) -> Self {
        Self {
            loss_prob,
            corrupt_prob,
            last_arrival: HashMap::new(),
            drop_rules: Vec::new(),
            stats: ChannelStats::default(),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.loss_prob, config.corrupt_prob)
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Drop the next frame sent by `from` whose seqnum equals `seq` or whose
    /// acknum equals `ack`. With neither given, the next frame of any kind.
    pub fn add_drop_rule(&mut self, from: EntityId, seq: Option<u32>, ack: Option<u32>) {
        self.drop_rules.push(DropRule { from, seq, ack });
    }

    /// Push `frame` from `from` towards its peer.
    ///
    /// Random draws, in order: loss, delay, corruption, corruption target.
    /// A frame removed by a drop rule consumes no draw.
    pub fn transmit(
        &mut self,
        scheduler: &mut Scheduler,
        rng: &mut dyn UniformSource,
        from: EntityId,
        frame: &Frame,
    ) -> Transmission {
        self.stats.frames_sent += 1;

        if let Some(pos) = self.drop_rules.iter().position(|r| r.matches(from, frame)) {
            self.drop_rules.remove(pos);
            self.stats.frames_lost += 1;
            debug!("[{}->{}] frame dropped by rule", from, from.peer());
            return Transmission::Lost { injected: true };
        }

        if rng.next_uniform() < self.loss_prob {
            self.stats.frames_lost += 1;
            debug!("[{}->{}] frame lost", from, from.peer());
            return Transmission::Lost { injected: false };
        }

        let mut copy = *frame;
        let to = from.peer();
        let last = self.last_arrival.get(&to).copied().unwrap_or(0.0);
        let arrival = scheduler.now().max(last) + MIN_DELAY + DELAY_SPREAD * rng.next_uniform();
        self.last_arrival.insert(to, arrival);

        let mut corruption = None;
        if rng.next_uniform() < self.corrupt_prob {
            let x = rng.next_uniform();
            let target = if x < 0.75 {
                Corruption::Payload
            } else if x < 0.875 {
                Corruption::SeqNum
            } else {
                Corruption::AckNum
            };
            copy.corrupt(target);
            self.stats.frames_corrupted += 1;
            corruption = Some(target);
            debug!("[{}->{}] frame corrupted ({:?})", from, to, target);
        }

        scheduler.insert(Event::new(arrival, to, EventKind::FrameArrival(copy)));
        Transmission::Scheduled {
            arrival,
            corruption,
        }
    }
}
