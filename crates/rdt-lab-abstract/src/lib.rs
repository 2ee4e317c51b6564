pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{EntityId, SystemContext, TransportProtocol};
pub use packet::{AckFrame, Corruption, DataFrame, Frame, PAYLOAD_LEN, Packet, Payload, checksum};

pub use config::{ConfigError, SimConfig};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
