//! Notification dispatch
//!
//! Routes each notification to the decoder for the characteristic it arrived
//! on. Decoding is synchronous and only touches the ACC stream clock.

use crate::error::StreamError;
use crate::hr::decode_heart_rate;
use crate::pmd::{decode_pmd, StreamClockState, WallClock};
use crate::protocol::decode_control_response;
use crate::types::{Characteristic, Decoded, RawFrame, SampleBatch};

/// Decode one notification.
///
/// `Ok(None)` means the frame was valid but carries nothing to emit (no RR
/// data, unknown PMD type, empty payload).
pub fn decode_frame(
    frame: RawFrame<'_>,
    clock_state: &mut StreamClockState,
    clock: &dyn WallClock,
) -> Result<Option<Decoded>, StreamError> {
    let decoded = match frame.characteristic {
        Characteristic::HeartRateMeasurement => {
            decode_heart_rate(frame.data)?.map(|hr| Decoded::Samples(SampleBatch::Hr(hr)))
        }
        Characteristic::PmdData => {
            decode_pmd(frame.data, clock_state, clock)?.map(Decoded::Samples)
        }
        Characteristic::PmdControl => decode_control_response(frame.data)?.map(Decoded::Control),
        Characteristic::BatteryLevel => Some(Decoded::BatteryLevel(decode_battery_level(
            frame.data,
        )?)),
    };
    Ok(decoded)
}

/// Battery level is a single percentage byte
pub fn decode_battery_level(data: &[u8]) -> Result<u8, StreamError> {
    data.first().copied().ok_or(StreamError::FrameTooShort {
        kind: "battery level",
        needed: 1,
        actual: 0,
    })
}
