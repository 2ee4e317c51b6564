use rdt_lab_abstract::{Corruption, EntityId, Frame, Packet, Payload, SimConfig};
use serde::Serialize;

use crate::channel::ChannelStats;

/// Trace level at which only scheduler warnings are kept.
pub const TRACE_WARNINGS: u8 = 0;
/// Adds losses, corruptions and protocol notes.
pub const TRACE_LINK: u8 = 1;
/// Adds every dispatched event.
pub const TRACE_EVENTS: u8 = 2;
/// Adds scheduled arrivals, generated packets and deliveries.
pub const TRACE_ALL: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LinkEventKind {
    Dispatched {
        entity: EntityId,
        kind: &'static str,
    },
    AppDataGiven {
        entity: EntityId,
        packet: Packet,
    },
    FrameLost {
        from: EntityId,
        frame: Frame,
        injected: bool,
    },
    FrameCorrupted {
        from: EntityId,
        corruption: Corruption,
    },
    FrameScheduled {
        from: EntityId,
        to: EntityId,
        arrival: f64,
        frame: Frame,
    },
    ProtocolNote {
        entity: EntityId,
        message: String,
    },
    Delivered {
        entity: EntityId,
        payload: Payload,
    },
    SchedulerWarning {
        entity: EntityId,
        message: String,
    },
}

impl LinkEventKind {
    /// Lowest `trace_level` at which this record is kept.
    pub fn min_trace_level(&self) -> u8 {
        match self {
            LinkEventKind::SchedulerWarning { .. } => TRACE_WARNINGS,
            LinkEventKind::FrameLost { .. }
            | LinkEventKind::FrameCorrupted { .. }
            | LinkEventKind::ProtocolNote { .. } => TRACE_LINK,
            LinkEventKind::Dispatched { .. } => TRACE_EVENTS,
            LinkEventKind::AppDataGiven { .. }
            | LinkEventKind::FrameScheduled { .. }
            | LinkEventKind::Delivered { .. } => TRACE_ALL,
        }
    }
}

/// A timestamped trace record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkEvent {
    pub time: f64,
    #[serde(flatten)]
    pub kind: LinkEventKind,
}

/// A payload handed to the application layer at `entity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub time: f64,
    pub entity: EntityId,
    pub payload: Payload,
}

impl Delivery {
    /// Payload up to the first NUL, lossily decoded.
    pub fn text(&self) -> String {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub simulated_time: f64,
    pub packets_generated: u32,
    pub channel: ChannelStats,
    pub deliveries: Vec<Delivery>,
    pub link_events: Vec<LinkEvent>,
}

impl SimulationReport {
    pub fn deliveries_at(&self, entity: EntityId) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(move |d| d.entity == entity)
    }

    pub fn delivered_text(&self, entity: EntityId) -> Vec<String> {
        self.deliveries_at(entity).map(Delivery::text).collect()
    }
}
