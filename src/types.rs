//! Core types for the Synheart Stream pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw notification frames, decoded sample batches, and the events
//! emitted to the display/recording sink.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::ControlResponse;

/// GATT characteristic a notification arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    /// Bluetooth SIG Heart Rate Measurement
    HeartRateMeasurement,
    /// Vendor PMD control point (responses to start/stop requests)
    PmdControl,
    /// Vendor PMD streaming data
    PmdData,
    /// Bluetooth SIG Battery Level
    BatteryLevel,
}

impl Characteristic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Characteristic::HeartRateMeasurement => "heart_rate_measurement",
            Characteristic::PmdControl => "pmd_control",
            Characteristic::PmdData => "pmd_data",
            Characteristic::BatteryLevel => "battery_level",
        }
    }

    /// Parse the snake_case name used in recordings and over FFI
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "heart_rate_measurement" => Some(Characteristic::HeartRateMeasurement),
            "pmd_control" => Some(Characteristic::PmdControl),
            "pmd_data" => Some(Characteristic::PmdData),
            "battery_level" => Some(Characteristic::BatteryLevel),
            _ => None,
        }
    }
}

/// One notification payload, borrowed for the duration of decoding
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub characteristic: Characteristic,
    pub data: &'a [u8],
}

impl<'a> RawFrame<'a> {
    pub fn new(characteristic: Characteristic, data: &'a [u8]) -> Self {
        Self {
            characteristic,
            data,
        }
    }
}

/// PMD measurement type, carried in byte 0 of every data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    Ecg,
    Ppg,
    Acc,
}

impl MeasurementType {
    /// Map a wire tag to a known measurement type
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(MeasurementType::Ecg),
            0x01 => Some(MeasurementType::Ppg),
            0x02 => Some(MeasurementType::Acc),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            MeasurementType::Ecg => 0x00,
            MeasurementType::Ppg => 0x01,
            MeasurementType::Acc => 0x02,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::Ecg => "ecg",
            MeasurementType::Ppg => "ppg",
            MeasurementType::Acc => "acc",
        }
    }
}

/// Single accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccSample {
    /// X/Y/Z acceleration (g)
    pub xyz: [f32; 3],
    /// Epoch time of the sample (seconds)
    pub timestamp: f64,
}

impl AccSample {
    /// Sample time as a UTC datetime, if representable
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        let micros = (self.timestamp * 1_000_000.0).round() as i64;
        let secs = micros.div_euclid(1_000_000);
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }
}

/// Heart rate with the inter-beat intervals carried in the same notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrSample {
    /// Heart rate reported by the device (bpm)
    pub bpm: u16,
    /// Inter-beat intervals (ms), in arrival order
    pub ibis: Vec<u32>,
}

/// Samples decoded from one frame
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBatch {
    /// Raw ECG ADC values
    Ecg(Vec<i32>),
    /// PPG1, PPG2, PPG3, ambient
    Ppg(Vec<[i32; 4]>),
    Acc(Vec<AccSample>),
    Hr(HrSample),
}

impl SampleBatch {
    /// Number of samples carried
    pub fn len(&self) -> usize {
        match self {
            SampleBatch::Ecg(s) => s.len(),
            SampleBatch::Ppg(s) => s.len(),
            SampleBatch::Acc(s) => s.len(),
            SampleBatch::Hr(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of decoding one notification
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Samples(SampleBatch),
    BatteryLevel(u8),
    Control(ControlResponse),
}

/// Latest derived metrics; `None` means not available yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// RMSSD over the session's IBI history (ms)
    pub rmssd_ms: Option<f64>,
    /// Respiration rate from ACC-z (breaths per minute)
    pub respiration_bpm: Option<f64>,
}

/// Event delivered to the display/recording sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StreamEvent {
    EcgSample(i32),
    PpgSample([i32; 4]),
    AccSample(AccSample),
    HrSample(HrSample),
    Rmssd(f64),
    Respiration(f64),
    BatteryLevel(u8),
    ControlResponse(ControlResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_characteristic_names_round_trip() {
        for c in [
            Characteristic::HeartRateMeasurement,
            Characteristic::PmdControl,
            Characteristic::PmdData,
            Characteristic::BatteryLevel,
        ] {
            assert_eq!(Characteristic::from_name(c.as_str()), Some(c));
        }
        assert_eq!(Characteristic::from_name("gyro"), None);
    }

    #[test]
    fn test_measurement_tags() {
        assert_eq!(MeasurementType::from_tag(0), Some(MeasurementType::Ecg));
        assert_eq!(MeasurementType::from_tag(2), Some(MeasurementType::Acc));
        assert_eq!(MeasurementType::from_tag(9), None);
        assert_eq!(MeasurementType::Ppg.tag(), 1);
    }

    #[test]
    fn test_acc_timestamp_utc() {
        let sample = AccSample {
            xyz: [0.0, 0.0, 1.0],
            timestamp: 1_700_000_000.5,
        };
        let dt = sample.timestamp_utc().unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_event_json_shape() {
        let event = StreamEvent::EcgSample(-12);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ecg_sample");
        assert_eq!(json["value"], -12);

        let event = StreamEvent::HrSample(HrSample {
            bpm: 60,
            ibis: vec![1000],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["value"]["bpm"], 60);
    }
}
