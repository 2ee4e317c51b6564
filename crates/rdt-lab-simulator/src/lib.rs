pub mod channel;
pub mod engine;
pub mod error;
pub mod generator;
pub mod random;
pub mod scenario_runner;
pub mod scheduler;
pub mod trace;

pub use channel::{Channel, ChannelStats, Transmission};
pub use engine::Simulator;
pub use error::{ScheduleError, SimError};
pub use random::{ScriptedUniform, SeededUniform, UniformSource};
pub use scheduler::{Event, EventKind, Scheduler};
pub use trace::{Delivery, LinkEvent, LinkEventKind, SimulationReport};
