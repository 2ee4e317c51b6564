//! Protocol entities runnable inside the RDT lab simulator.

pub mod alternating_bit;

pub use alternating_bit::{AlternatingBit, DEFAULT_TIMEOUT, EntityStats, SendState};
