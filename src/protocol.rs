//! GATT UUIDs, PMD control frames, and device identification
//!
//! These values are part of the device's wire contract and must match
//! byte-for-byte for the sensor to respond.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StreamError;
use crate::types::{Characteristic, MeasurementType};

// ============================================================================
// Services and characteristics
// ============================================================================

/// Bluetooth SIG Heart Rate service (0x180D)
pub const HEART_RATE_SERVICE: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);

/// Bluetooth SIG Heart Rate Measurement characteristic (0x2A37)
pub const HEART_RATE_MEASUREMENT: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Bluetooth SIG Battery service (0x180F)
pub const BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Bluetooth SIG Battery Level characteristic (0x2A19)
pub const BATTERY_LEVEL: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Polar Measurement Data service
pub const PMD_SERVICE: Uuid = Uuid::from_u128(0xfb005c80_02e7_f387_1cad_8acd2d8df0c8);

/// PMD control point: stream settings and start/stop requests are written here
pub const PMD_CONTROL: Uuid = Uuid::from_u128(0xfb005c81_02e7_f387_1cad_8acd2d8df0c8);

/// PMD data: measurement frames are notified here
pub const PMD_DATA: Uuid = Uuid::from_u128(0xfb005c82_02e7_f387_1cad_8acd2d8df0c8);

impl Characteristic {
    /// GATT UUID of this characteristic
    pub fn uuid(&self) -> Uuid {
        match self {
            Characteristic::HeartRateMeasurement => HEART_RATE_MEASUREMENT,
            Characteristic::PmdControl => PMD_CONTROL,
            Characteristic::PmdData => PMD_DATA,
            Characteristic::BatteryLevel => BATTERY_LEVEL,
        }
    }

    /// Map a GATT UUID to a known characteristic
    pub fn from_uuid(uuid: &Uuid) -> Result<Self, StreamError> {
        match *uuid {
            HEART_RATE_MEASUREMENT => Ok(Characteristic::HeartRateMeasurement),
            PMD_CONTROL => Ok(Characteristic::PmdControl),
            PMD_DATA => Ok(Characteristic::PmdData),
            BATTERY_LEVEL => Ok(Characteristic::BatteryLevel),
            other => Err(StreamError::UnknownCharacteristic(other.to_string())),
        }
    }
}

// ============================================================================
// Control frames
// ============================================================================

/// Control point op code: request stream settings
pub const OP_GET_SETTINGS: u8 = 0x01;
/// Control point op code: start a measurement
pub const OP_START: u8 = 0x02;
/// Control point op code: stop a measurement
pub const OP_STOP: u8 = 0x03;

/// First byte of a control point response notification
pub const CONTROL_RESPONSE: u8 = 0xf0;

/// Start ECG at 130 Hz
pub const ECG_START: [u8; 10] = [0x02, 0x00, 0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x0e, 0x00];

/// Start PPG at 130 Hz, 22-bit resolution
pub const PPG_START: [u8; 10] = [0x02, 0x01, 0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x16, 0x00];

/// Start ACC at 200 Hz, 16-bit resolution, 8 g range
pub const ACC_START: [u8; 14] = [
    0x02, 0x02, 0x00, 0x01, 0xc8, 0x00, 0x01, 0x01, 0x10, 0x00, 0x02, 0x01, 0x08, 0x00,
];

/// Frame that starts `measurement` with its fixed settings
pub fn start_frame(measurement: MeasurementType) -> &'static [u8] {
    match measurement {
        MeasurementType::Ecg => &ECG_START,
        MeasurementType::Ppg => &PPG_START,
        MeasurementType::Acc => &ACC_START,
    }
}

/// Frame that stops `measurement`
pub fn stop_frame(measurement: MeasurementType) -> [u8; 2] {
    [OP_STOP, measurement.tag()]
}

/// Frame requesting the settings `measurement` supports
pub fn settings_request(measurement: MeasurementType) -> [u8; 2] {
    [OP_GET_SETTINGS, measurement.tag()]
}

// ============================================================================
// Control responses
// ============================================================================

/// Status code in a control point response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Success,
    InvalidOpCode,
    InvalidMeasurementType,
    NotSupported,
    InvalidLength,
    InvalidParameter,
    AlreadyInState,
    InvalidResolution,
    InvalidSampleRate,
    InvalidRange,
    InvalidMtu,
    InvalidNumberOfChannels,
    InvalidState,
    DeviceInCharger,
    Unknown(u8),
}

impl ControlStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ControlStatus::Success,
            1 => ControlStatus::InvalidOpCode,
            2 => ControlStatus::InvalidMeasurementType,
            3 => ControlStatus::NotSupported,
            4 => ControlStatus::InvalidLength,
            5 => ControlStatus::InvalidParameter,
            6 => ControlStatus::AlreadyInState,
            7 => ControlStatus::InvalidResolution,
            8 => ControlStatus::InvalidSampleRate,
            9 => ControlStatus::InvalidRange,
            10 => ControlStatus::InvalidMtu,
            11 => ControlStatus::InvalidNumberOfChannels,
            12 => ControlStatus::InvalidState,
            13 => ControlStatus::DeviceInCharger,
            other => ControlStatus::Unknown(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ControlStatus::Success)
    }
}

/// Decoded acknowledgement of a control point write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Op code being acknowledged
    pub op_code: u8,
    /// Measurement tag, `None` if not a known type
    pub measurement: Option<MeasurementType>,
    pub status: ControlStatus,
    /// Trailing parameter bytes (e.g. the settings listing)
    pub parameters: Vec<u8>,
}

/// Decode a PMD control point notification.
///
/// Returns `Ok(None)` for notifications that are not op-code responses
/// (the feature bitmap read is delivered on the same characteristic).
pub fn decode_control_response(data: &[u8]) -> Result<Option<ControlResponse>, StreamError> {
    match data.first() {
        Some(&CONTROL_RESPONSE) => {}
        Some(other) => {
            log::debug!("Ignoring control notification 0x{:02x}", other);
            return Ok(None);
        }
        None => {
            return Err(StreamError::FrameTooShort {
                kind: "control",
                needed: 4,
                actual: 0,
            })
        }
    }

    if data.len() < 4 {
        return Err(StreamError::FrameTooShort {
            kind: "control",
            needed: 4,
            actual: data.len(),
        });
    }

    // byte 4, when present, is the "more frames" flag
    let parameters = data.get(5..).map(<[u8]>::to_vec).unwrap_or_default();

    Ok(Some(ControlResponse {
        op_code: data[1],
        measurement: MeasurementType::from_tag(data[2]),
        status: ControlStatus::from_code(data[3]),
        parameters,
    }))
}

// ============================================================================
// Device identification
// ============================================================================

/// Sensor family, identified from the advertised name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceModel {
    /// Chest strap: ECG + ACC
    H10,
    /// Optical arm band: PPG + ACC
    Oh1,
    Unknown,
}

impl DeviceModel {
    pub fn from_name(name: &str) -> Self {
        if name.contains("H10") {
            DeviceModel::H10
        } else if name.contains("OH1") {
            DeviceModel::Oh1
        } else {
            DeviceModel::Unknown
        }
    }

    /// PMD streams to start on this device, in start order
    pub fn pmd_streams(&self) -> &'static [MeasurementType] {
        match self {
            DeviceModel::H10 => &[MeasurementType::Ecg, MeasurementType::Acc],
            DeviceModel::Oh1 => &[MeasurementType::Ppg, MeasurementType::Acc],
            DeviceModel::Unknown => &[],
        }
    }
}

/// Whether a scanned device name belongs to a supported sensor
pub fn is_supported_device(name: Option<&str>) -> bool {
    name.map_or(false, |n| n.contains("Polar"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uuid_strings() {
        assert_eq!(
            PMD_CONTROL.to_string(),
            "fb005c81-02e7-f387-1cad-8acd2d8df0c8"
        );
        assert_eq!(
            PMD_DATA.to_string(),
            "fb005c82-02e7-f387-1cad-8acd2d8df0c8"
        );
        assert_eq!(
            BATTERY_LEVEL.to_string(),
            "00002a19-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_characteristic_uuid_mapping() {
        for c in [
            Characteristic::HeartRateMeasurement,
            Characteristic::PmdControl,
            Characteristic::PmdData,
            Characteristic::BatteryLevel,
        ] {
            assert_eq!(Characteristic::from_uuid(&c.uuid()).unwrap(), c);
        }
        assert!(Characteristic::from_uuid(&PMD_SERVICE).is_err());
    }

    #[test]
    fn test_control_frames_are_exact() {
        assert_eq!(
            start_frame(MeasurementType::Ecg),
            &[0x02, 0x00, 0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x0E, 0x00]
        );
        assert_eq!(start_frame(MeasurementType::Ppg)[1], 0x01);
        assert_eq!(start_frame(MeasurementType::Acc)[4], 0xc8);
        assert_eq!(stop_frame(MeasurementType::Acc), [0x03, 0x02]);
        assert_eq!(settings_request(MeasurementType::Ppg), [0x01, 0x01]);
    }

    #[test]
    fn test_decode_control_success() {
        let ack = decode_control_response(&[0xf0, 0x02, 0x00, 0x00, 0x00])
            .unwrap()
            .unwrap();
        assert_eq!(ack.op_code, OP_START);
        assert_eq!(ack.measurement, Some(MeasurementType::Ecg));
        assert!(ack.status.is_success());
        assert!(ack.parameters.is_empty());
    }

    #[test]
    fn test_decode_control_error_with_parameters() {
        let ack = decode_control_response(&[0xf0, 0x01, 0x02, 0x06, 0x00, 0xaa, 0xbb])
            .unwrap()
            .unwrap();
        assert_eq!(ack.status, ControlStatus::AlreadyInState);
        assert_eq!(ack.parameters, vec![0xaa, 0xbb]);
        assert_eq!(ControlStatus::from_code(42), ControlStatus::Unknown(42));
    }

    #[test]
    fn test_decode_control_ignores_feature_read() {
        assert_eq!(decode_control_response(&[0x0f, 0x05]).unwrap(), None);
        assert!(decode_control_response(&[0xf0, 0x02]).is_err());
        assert!(decode_control_response(&[]).is_err());
    }

    #[test]
    fn test_device_model() {
        assert_eq!(DeviceModel::from_name("Polar H10 ABC123"), DeviceModel::H10);
        assert_eq!(DeviceModel::from_name("Polar OH1 1F2E"), DeviceModel::Oh1);
        assert_eq!(DeviceModel::from_name("Polar Verity"), DeviceModel::Unknown);
        assert_eq!(
            DeviceModel::Oh1.pmd_streams(),
            &[MeasurementType::Ppg, MeasurementType::Acc]
        );
        assert!(is_supported_device(Some("Polar H10 1")));
        assert!(!is_supported_device(Some("Mi Band")));
        assert!(!is_supported_device(None));
    }
}
