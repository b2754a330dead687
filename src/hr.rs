//! Heart Rate Measurement decoder
//!
//! Parses the Bluetooth SIG Heart Rate Measurement characteristic into a heart
//! rate plus the RR intervals batched into the same notification.

use crate::bytes::read_uint;
use crate::error::StreamError;
use crate::types::HrSample;

/// Flags bit 0: heart rate is a u16 instead of a u8
const FLAG_HR_U16: u8 = 0x01;
/// Flags bit 3: energy expended field present
const FLAG_ENERGY_EXPENDED: u8 = 0x08;
/// Flags bit 4: one or more RR intervals present
const FLAG_RR_INTERVAL: u8 = 0x10;

/// RR intervals are transmitted in 1/1024 s units
const RR_UNITS_PER_SECOND: f64 = 1024.0;

/// Decode a Heart Rate Measurement notification.
///
/// Frames without the RR-interval flag yield `Ok(None)`: only frames carrying
/// beat timing produce a sample.
pub fn decode_heart_rate(data: &[u8]) -> Result<Option<HrSample>, StreamError> {
    let flags = *data.first().ok_or(StreamError::FrameTooShort {
        kind: "heart rate",
        needed: 2,
        actual: 0,
    })?;

    if flags & FLAG_RR_INTERVAL == 0 {
        return Ok(None);
    }

    let hr_width = if flags & FLAG_HR_U16 != 0 { 2 } else { 1 };
    let energy_width = if flags & FLAG_ENERGY_EXPENDED != 0 { 2 } else { 0 };
    let rr_offset = 1 + hr_width + energy_width;

    // the RR flag promises at least one interval
    if data.len() < rr_offset + 2 {
        return Err(StreamError::FrameTooShort {
            kind: "heart rate",
            needed: rr_offset + 2,
            actual: data.len(),
        });
    }

    let bpm = read_uint(data, 1, hr_width)? as u16;

    let rr_bytes = &data[rr_offset..];
    if rr_bytes.len() % 2 != 0 {
        log::debug!("Ignoring dangling byte at end of heart rate frame");
    }

    let ibis = rr_bytes
        .chunks_exact(2)
        .map(|pair| rr_to_ms(u16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    Ok(Some(HrSample { bpm, ibis }))
}

/// Convert a raw 1/1024 s RR interval to whole milliseconds, rounding up
pub fn rr_to_ms(raw: u16) -> u32 {
    (f64::from(raw) / RR_UNITS_PER_SECOND * 1000.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_rr_flag_yields_nothing() {
        assert_eq!(decode_heart_rate(&[0x00, 72]).unwrap(), None);
        assert_eq!(decode_heart_rate(&[0x01, 72, 0]).unwrap(), None);
        // energy expended without RR is still dropped
        assert_eq!(decode_heart_rate(&[0x08, 72, 0x10, 0x00]).unwrap(), None);
    }

    #[test]
    fn test_u8_hr_with_two_intervals() {
        let frame = [0x10, 64, 0x00, 0x04, 0x00, 0x04];
        let sample = decode_heart_rate(&frame).unwrap().unwrap();
        assert_eq!(
            sample,
            HrSample {
                bpm: 64,
                ibis: vec![1000, 1000],
            }
        );
    }

    #[test]
    fn test_u16_hr_with_energy_expended() {
        // flags: u16 HR, energy expended, RR present
        let frame = [0x19, 0x2c, 0x01, 0xff, 0xff, 0x00, 0x02];
        let sample = decode_heart_rate(&frame).unwrap().unwrap();
        assert_eq!(sample.bpm, 300);
        assert_eq!(sample.ibis, vec![500]);
    }

    #[test]
    fn test_rr_conversion_rounds_up() {
        assert_eq!(rr_to_ms(1024), 1000);
        // 820 / 1024 * 1000 = 800.78
        assert_eq!(rr_to_ms(820), 801);
        assert_eq!(rr_to_ms(0), 0);
    }

    #[test]
    fn test_rr_flag_without_intervals_rejected() {
        assert!(matches!(
            decode_heart_rate(&[0x10, 80]),
            Err(StreamError::FrameTooShort { needed: 4, actual: 2, .. })
        ));
        // a single dangling byte is not an interval either
        assert!(matches!(
            decode_heart_rate(&[0x10, 80, 0x04]),
            Err(StreamError::FrameTooShort { needed: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_dangling_byte_ignored() {
        let sample = decode_heart_rate(&[0x10, 80, 0x00, 0x04, 0x07]).unwrap().unwrap();
        assert_eq!(sample.ibis, vec![1000]);
    }

    #[test]
    fn test_truncated_frames_fail() {
        assert!(decode_heart_rate(&[]).is_err());
        assert!(decode_heart_rate(&[0x10]).is_err());
        assert!(decode_heart_rate(&[0x11, 60]).is_err());
        assert!(matches!(
            decode_heart_rate(&[0x18, 60, 0x01]),
            Err(StreamError::FrameTooShort { needed: 6, actual: 3, .. })
        ));
    }
}
