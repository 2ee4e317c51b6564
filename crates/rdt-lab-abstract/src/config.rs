use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of application packets to generate before arrivals stop.
    pub max_packets: u32,
    /// Probability that a frame is dropped by the channel.
    pub loss_prob: f64,
    /// Probability that a frame is mangled by the channel.
    pub corrupt_prob: f64,
    /// Mean gap between application arrivals.
    pub mean_interarrival: f64,
    /// Verbosity of the recorded trace (0 = warnings only, 3 = everything).
    pub trace_level: u8,
    /// Retransmission timer duration used by both entities.
    pub timeout: f64,
    pub seed: u64,
    /// Route roughly half of the application arrivals to B instead of A.
    pub bidirectional: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_packets: 10,
            loss_prob: 0.0,
            corrupt_prob: 0.0,
            mean_interarrival: 1000.0,
            trace_level: 1,
            timeout: 25.0,
            seed: 9999,
            bidirectional: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("loss_prob", self.loss_prob), ("corrupt_prob", self.corrupt_prob)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { field, value });
            }
        }
        for (field, value) in [
            ("mean_interarrival", self.mean_interarrival),
            ("timeout", self.timeout),
        ] {
            // written so that NaN is rejected too
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let config = SimConfig {
            corrupt_prob: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProbabilityOutOfRange { field: "corrupt_prob", .. })
        ));
    }

    #[test]
    fn rejects_non_positive_interarrival() {
        let config = SimConfig {
            mean_interarrival: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "mean_interarrival", .. })
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SimConfig = toml::from_str("loss_prob = 0.2\nmax_packets = 3\n").unwrap();
        assert_eq!(config.max_packets, 3);
        assert_eq!(config.loss_prob, 0.2);
        assert_eq!(config.timeout, 25.0);
        assert_eq!(config.seed, 9999);
    }
}
