use rdt_lab_abstract::{ConfigError, EntityId};
use thiserror::Error;

/// Conditions that stop a simulation from starting.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error(
        "random source does not look uniform on [0, 1]: mean of {draws} draws was {mean:.4}"
    )]
    RandomSourceNotUniform { draws: u32, mean: f64 },
}

/// Misuse of the scheduler. Reported and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("attempt to start a timer for {0} that is already started")]
    TimerAlreadyRunning(EntityId),

    #[error("unable to stop the timer for {0}: it wasn't running")]
    TimerNotRunning(EntityId),

    #[error("no pending event matches")]
    NoMatchingEvent,

    #[error("cannot schedule an event at {time} when the clock reads {now}")]
    InvalidTime { time: f64, now: f64 },
}
