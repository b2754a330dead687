//! Pipeline configuration
//!
//! Buffer sizes and metric parameters for one streaming session. Defaults
//! match the sensor's fixed stream settings; a JSON file can override any
//! subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::pmd::ACC_SAMPLE_RATE_HZ;

/// Default ECG display window (samples)
pub const DEFAULT_ECG_CAPACITY: usize = 1200;
/// Default PPG display window (samples)
pub const DEFAULT_PPG_CAPACITY: usize = 1200;
/// Default ACC-z window (samples, 21 s at 200 Hz)
pub const DEFAULT_ACC_CAPACITY: usize = 4200;
/// Default zero-padded FFT length for respiration
pub const DEFAULT_RESPIRATION_PADDING: usize = 15_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub ecg_capacity: usize,
    pub ppg_capacity: usize,
    /// ACC-z window; respiration is estimated over this buffer
    pub acc_capacity: usize,
    /// ACC-z length at which respiration is (re)computed
    pub respiration_trigger: usize,
    pub respiration_padding: usize,
    pub acc_sample_rate_hz: f64,
    /// Cap on retained IBIs for RMSSD; `None` keeps the whole session
    pub ibi_history_limit: Option<usize>,
    /// Plausible respiration range (BPM); estimates outside it are withheld
    pub respiration_range_bpm: Option<(f64, f64)>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ecg_capacity: DEFAULT_ECG_CAPACITY,
            ppg_capacity: DEFAULT_PPG_CAPACITY,
            acc_capacity: DEFAULT_ACC_CAPACITY,
            respiration_trigger: DEFAULT_ACC_CAPACITY,
            respiration_padding: DEFAULT_RESPIRATION_PADDING,
            acc_sample_rate_hz: ACC_SAMPLE_RATE_HZ,
            ibi_history_limit: None,
            respiration_range_bpm: Some((4.0, 40.0)),
        }
    }
}

impl StreamConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        let config: StreamConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON
    pub fn to_json(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the parameters describe a usable pipeline
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.ecg_capacity == 0 || self.ppg_capacity == 0 || self.acc_capacity == 0 {
            return Err(StreamError::Config(
                "buffer capacities must be positive".to_string(),
            ));
        }
        if self.respiration_trigger == 0 || self.respiration_trigger > self.acc_capacity {
            return Err(StreamError::Config(format!(
                "respiration_trigger must be in 1..={}",
                self.acc_capacity
            )));
        }
        if self.respiration_padding < self.acc_capacity {
            return Err(StreamError::Config(format!(
                "respiration_padding ({}) must be at least acc_capacity ({})",
                self.respiration_padding, self.acc_capacity
            )));
        }
        if !(self.acc_sample_rate_hz > 0.0) {
            return Err(StreamError::Config(
                "acc_sample_rate_hz must be positive".to_string(),
            ));
        }
        if self.ibi_history_limit == Some(0) {
            return Err(StreamError::Config(
                "ibi_history_limit must be positive when set".to_string(),
            ));
        }
        if let Some((min, max)) = self.respiration_range_bpm {
            if !(min >= 0.0 && min < max) {
                return Err(StreamError::Config(format!(
                    "invalid respiration range {min}..{max}"
                )));
            }
        }
        Ok(())
    }
}
