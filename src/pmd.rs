//! PMD data frame decoders
//!
//! Every PMD notification starts with a 10-byte header:
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0     | measurement type (0 = ECG, 1 = PPG, 2 = ACC) |
//! | 1..9  | device timestamp, u64 LE nanoseconds |
//! | 9     | frame type (ACC resolution selector) |
//!
//! The remaining bytes are packed samples whose layout depends on the type.

use chrono::Utc;

use crate::bytes::{read_i24, read_int, read_uint};
use crate::error::StreamError;
use crate::types::{AccSample, MeasurementType, SampleBatch};

/// PMD header length
pub const HEADER_LEN: usize = 10;

/// Bytes per ECG sample
pub const ECG_SAMPLE_BYTES: usize = 3;

/// Channels per PPG sample (PPG1, PPG2, PPG3, ambient)
pub const PPG_CHANNELS: usize = 4;

/// Bytes per PPG sample
pub const PPG_SAMPLE_BYTES: usize = PPG_CHANNELS * 3;

/// Default ACC sample rate; the start frame requests 200 Hz
pub const ACC_SAMPLE_RATE_HZ: f64 = 200.0;

/// Raw ACC counts per g
const ACC_SCALE: f32 = 100.0;

/// Frame-type bit marking delta-compressed frames
const COMPRESSED_FRAME: u8 = 0x80;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Parsed PMD header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmdHeader {
    pub tag: u8,
    /// Device clock time of the last sample in the frame (ns)
    pub timestamp_ns: u64,
    pub frame_type: u8,
}

impl PmdHeader {
    pub fn parse(data: &[u8]) -> Result<Self, StreamError> {
        if data.len() < HEADER_LEN {
            return Err(StreamError::FrameTooShort {
                kind: "PMD",
                needed: HEADER_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            tag: data[0],
            timestamp_ns: read_uint(data, 1, 8)?,
            frame_type: data[9],
        })
    }

    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / NANOS_PER_SECOND
    }
}

// ============================================================================
// Stream clock
// ============================================================================

/// Source of wall-clock time (epoch seconds)
pub trait WallClock {
    fn now_epoch_secs(&self) -> f64;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_epoch_secs(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Wall clock pinned to a fixed instant, used for replay and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock(pub f64);

impl WallClock for FixedClock {
    fn now_epoch_secs(&self) -> f64 {
        self.0
    }
}

/// Mapping from device time to epoch time for one ACC stream.
///
/// Anchored once from the first ACC record of a session; later records reuse
/// the same offset. Drift between the two clocks is not corrected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamClockState {
    /// True until the first record anchors the stream
    pub first_record: bool,
    /// epoch seconds minus device seconds
    pub polar_to_epoch_offset: f64,
    /// Seconds between consecutive ACC samples
    pub sample_period: f64,
}

impl Default for StreamClockState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamClockState {
    pub fn new() -> Self {
        Self::with_sample_rate(ACC_SAMPLE_RATE_HZ)
    }

    /// Clock for an ACC stream sampled at `sample_rate_hz`
    pub fn with_sample_rate(sample_rate_hz: f64) -> Self {
        Self {
            first_record: true,
            polar_to_epoch_offset: 0.0,
            sample_period: 1.0 / sample_rate_hz,
        }
    }

    pub fn is_anchored(&self) -> bool {
        !self.first_record
    }

    /// Forget the anchor so the next record re-establishes it
    pub fn reset(&mut self) {
        self.first_record = true;
        self.polar_to_epoch_offset = 0.0;
    }

    /// Epoch time of the first sample of a record of `n_samples` whose last
    /// sample was taken at `device_secs`. Anchors on the first call.
    pub fn first_sample_epoch(
        &mut self,
        device_secs: f64,
        n_samples: usize,
        clock: &dyn WallClock,
    ) -> f64 {
        let record_duration = n_samples.saturating_sub(1) as f64 * self.sample_period;
        let stream_start_device = device_secs - record_duration;

        if self.first_record {
            let stream_start_epoch = clock.now_epoch_secs() - record_duration;
            self.polar_to_epoch_offset = stream_start_epoch - stream_start_device;
            self.first_record = false;
            log::info!(
                "ACC stream anchored: device {:.3}s -> epoch offset {:.3}s",
                device_secs,
                self.polar_to_epoch_offset
            );
        }

        stream_start_device + self.polar_to_epoch_offset
    }
}

// ============================================================================
// Decoders
// ============================================================================

/// Decode a PMD data notification.
///
/// Unknown measurement types yield `Ok(None)`, as do frames carrying no
/// complete sample.
pub fn decode_pmd(
    data: &[u8],
    clock_state: &mut StreamClockState,
    clock: &dyn WallClock,
) -> Result<Option<SampleBatch>, StreamError> {
    let header = PmdHeader::parse(data)?;
    let payload = &data[HEADER_LEN..];

    let Some(measurement) = MeasurementType::from_tag(header.tag) else {
        log::warn!("Ignoring PMD frame with unknown type 0x{:02x}", header.tag);
        return Ok(None);
    };

    let batch = match measurement {
        MeasurementType::Ecg => SampleBatch::Ecg(decode_ecg(payload)?),
        MeasurementType::Ppg => SampleBatch::Ppg(decode_ppg(payload)?),
        MeasurementType::Acc => SampleBatch::Acc(decode_acc(&header, payload, clock_state, clock)?),
    };

    if batch.is_empty() {
        log::debug!("{} frame carried no complete samples", measurement.as_str());
        return Ok(None);
    }
    Ok(Some(batch))
}

/// Decode consecutive 24-bit signed ECG samples
pub fn decode_ecg(payload: &[u8]) -> Result<Vec<i32>, StreamError> {
    let n = payload.len() / ECG_SAMPLE_BYTES;
    (0..n)
        .map(|i| read_i24(payload, i * ECG_SAMPLE_BYTES))
        .collect()
}

/// Decode 4-channel PPG samples, each channel a 24-bit signed value
pub fn decode_ppg(payload: &[u8]) -> Result<Vec<[i32; 4]>, StreamError> {
    let n = payload.len() / PPG_SAMPLE_BYTES;
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let base = i * PPG_SAMPLE_BYTES;
        let mut channels = [0i32; PPG_CHANNELS];
        for (ch, value) in channels.iter_mut().enumerate() {
            *value = read_i24(payload, base + ch * 3)?;
        }
        samples.push(channels);
    }
    Ok(samples)
}

/// Per-axis byte width selected by an ACC frame type
pub fn acc_bytes_per_axis(frame_type: u8) -> Result<usize, StreamError> {
    let unsupported = StreamError::UnsupportedFrameType {
        kind: "ACC",
        frame_type,
    };
    if frame_type & COMPRESSED_FRAME != 0 {
        return Err(unsupported);
    }
    let resolution_bits = (usize::from(frame_type) + 1) * 8;
    let bytes = resolution_bits.div_ceil(8);
    if bytes > 8 {
        return Err(unsupported);
    }
    Ok(bytes)
}

/// Decode ACC samples and stamp them with epoch times
pub fn decode_acc(
    header: &PmdHeader,
    payload: &[u8],
    clock_state: &mut StreamClockState,
    clock: &dyn WallClock,
) -> Result<Vec<AccSample>, StreamError> {
    let width = acc_bytes_per_axis(header.frame_type)?;
    let step = 3 * width;
    let n = payload.len() / step;
    if n == 0 {
        return Ok(Vec::new());
    }

    let start = clock_state.first_sample_epoch(header.timestamp_secs(), n, clock);

    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let base = i * step;
        let mut xyz = [0f32; 3];
        for (axis, value) in xyz.iter_mut().enumerate() {
            *value = read_int(payload, base + axis * width, width)? as f32 / ACC_SCALE;
        }
        samples.push(AccSample {
            xyz,
            timestamp: start + i as f64 * clock_state.sample_period,
        });
    }
    Ok(samples)
}
