use crate::config::SimConfig;
use crate::interface::EntityId;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub max_packets: Option<u32>,
    pub loss_prob: Option<f64>,
    pub corrupt_prob: Option<f64>,
    pub mean_interarrival: Option<f64>,
    pub trace_level: Option<u8>,
    pub timeout: Option<f64>,
    pub seed: Option<u64>,
    pub bidirectional: Option<bool>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.max_packets {
            config.max_packets = v;
        }
        if let Some(v) = self.loss_prob {
            config.loss_prob = v;
        }
        if let Some(v) = self.corrupt_prob {
            config.corrupt_prob = v;
        }
        if let Some(v) = self.mean_interarrival {
            config.mean_interarrival = v;
        }
        if let Some(v) = self.trace_level {
            config.trace_level = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.bidirectional {
            config.bidirectional = v;
        }
    }
}

fn default_receiver() -> EntityId {
    EntityId::B
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application hands `data` to `entity` at `time`, bypassing the random generator
    AppSend {
        time: f64,
        #[serde(default)]
        entity: EntityId,
        data: String,
    },
    /// Deterministically drop the next frame from `from` matching the given numbers
    DropNext {
        #[serde(default)]
        from: EntityId,
        seq: Option<u32>,
        ack: Option<u32>,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Some payload delivered at `to` starts with `data`
    DataDelivered {
        #[serde(default = "default_receiver")]
        to: EntityId,
        data: String,
    },
    /// Payloads delivered at `to` start with these strings, in exactly this order
    DeliveredInOrder {
        #[serde(default = "default_receiver")]
        to: EntityId,
        data: Vec<String>,
    },
    /// Exactly `count` payloads were delivered at `to`
    DeliveryCount {
        #[serde(default = "default_receiver")]
        to: EntityId,
        count: usize,
    },
    /// Number of frames handed to the channel is within range
    FramesSent { min: u32, max: Option<u32> },
    /// Simulation finishes by the given simulated time
    MaxDuration { time: f64 },
}
