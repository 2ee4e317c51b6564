use serde::{Deserialize, Serialize};
use std::fmt;

use crate::packet::{Frame, Packet, Payload};

/// One of the two endpoints attached to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityId {
    #[default]
    A,
    B,
}

impl EntityId {
    pub fn peer(&self) -> Self {
        match self {
            EntityId::A => EntityId::B,
            EntityId::B => EntityId::A,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::A => f.write_str("A"),
            EntityId::B => f.write_str("B"),
        }
    }
}

/// Capabilities the simulator hands to an entity for the duration of one callback.
pub trait SystemContext {
    /// Hand a frame to the unreliable channel. The channel keeps its own copy.
    fn send_frame(&mut self, frame: Frame);

    /// Start this entity's retransmission timer.
    /// Starting it while already running is reported by the simulator and ignored.
    fn start_timer(&mut self, duration: f64);

    /// Stop this entity's retransmission timer.
    fn stop_timer(&mut self);

    /// Pass a payload up to the application layer.
    fn deliver_data(&mut self, payload: &Payload);

    /// Emit a protocol note into the simulation trace.
    fn log(&mut self, message: &str);

    /// Current simulated time.
    fn now(&self) -> f64;
}

/// The protocol each entity runs. Both endpoints run the same implementation.
pub trait TransportProtocol {
    /// Called once before any event is dispatched.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// The application has data for the peer.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// A frame came out of the channel.
    fn on_frame(&mut self, ctx: &mut dyn SystemContext, frame: Frame);

    /// The retransmission timer went off.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);
}
