//! Session and station configuration.
//!
//! Station presets are plain JSON so the map layer can ship them as data:
//!
//! ```json
//! [{ "name": "Rail Crafter",
//!    "inputs": [{ "resource_type": "Wood" }, { "resource_type": "Rock" }],
//!    "output": "Rail", "base_rate": 0.25, "tier": 1.0 }]
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{ResourceType, SlotRequirement};

/// Configuration for a simulation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// RNG seed for cosmetic randomness; `None` seeds from entropy
    pub seed: Option<u64>,
    /// 1.0 = real-time
    pub time_scale: f32,
    /// Maximum cosmetic yaw (degrees, either way) applied when units are stacked
    pub stack_wobble_degrees: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            time_scale: 1.0,
            stack_wobble_degrees: 10.0,
        }
    }
}

/// Configuration for a production station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub name: String,
    pub inputs: Vec<SlotRequirement>,
    pub output: ResourceType,
    /// Height of produced units, defaults to the output type's height
    #[serde(default)]
    pub output_height: Option<f32>,
    /// Cycle progress per second at tier 1
    #[serde(default = "default_base_rate")]
    pub base_rate: f32,
    #[serde(default = "default_tier")]
    pub tier: f32,
}

fn default_base_rate() -> f32 {
    0.25
}

fn default_tier() -> f32 {
    1.0
}

impl StationConfig {
    pub fn new(name: impl Into<String>, inputs: &[ResourceType], output: ResourceType) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.iter().copied().map(SlotRequirement::new).collect(),
            output,
            output_height: None,
            base_rate: default_base_rate(),
            tier: default_tier(),
        }
    }

    pub fn with_tier(mut self, tier: f32) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_base_rate(mut self, base_rate: f32) -> Self {
        self.base_rate = base_rate;
        self
    }

    /// Parse a JSON array of station presets
    pub fn list_from_json(json: &str) -> Result<Vec<StationConfig>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_defaults() {
        let json = r#"[{
            "name": "Rail Crafter",
            "inputs": [{ "resource_type": "Wood" }, { "resource_type": "Rock", "min_units": 2 }],
            "output": "Rail"
        }]"#;
        let presets = StationConfig::list_from_json(json).unwrap();
        assert_eq!(presets.len(), 1);
        let preset = &presets[0];
        assert_eq!(preset.inputs[0].min_units, 1);
        assert_eq!(preset.inputs[1].min_units, 2);
        assert_eq!(preset.output, ResourceType::Rail);
        assert_eq!(preset.base_rate, 0.25);
        assert_eq!(preset.tier, 1.0);
        assert_eq!(preset.output_height, None);
    }

    #[test]
    fn test_bad_preset_rejected() {
        let json = r#"[{ "name": "Broken", "inputs": [], "output": "Gold" }]"#;
        assert!(StationConfig::list_from_json(json).is_err());
    }
}
