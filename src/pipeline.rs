//! Session orchestration
//!
//! This module provides the public API for Synheart Stream.
//! A `StreamSession` owns everything one connected sensor needs: the
//! aggregator buffers, the ACC stream clock and the last battery reading.

use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::config::StreamConfig;
use crate::decoder::decode_frame;
use crate::error::StreamError;
use crate::pmd::{StreamClockState, SystemClock, WallClock};
use crate::types::{Characteristic, Decoded, DerivedMetrics, RawFrame, StreamEvent};

/// Decode a single notification with fresh session state.
///
/// Useful for inspecting one frame; ACC timestamps are anchored to the
/// current system time.
///
/// # Example
/// ```ignore
/// let events = decode_notification(Characteristic::HeartRateMeasurement, &[0x10, 64, 0x00, 0x04])?;
/// ```
pub fn decode_notification(
    characteristic: Characteristic,
    data: &[u8],
) -> Result<Vec<StreamEvent>, StreamError> {
    let mut session = StreamSession::new();
    session.try_ingest(RawFrame::new(characteristic, data))
}

/// Stateful processor for one sensor connection.
///
/// Notifications must be ingested in arrival order. Call `reset` when the
/// device disconnects so the next ACC record re-anchors the clock.
#[derive(Debug)]
pub struct StreamSession<C: WallClock = SystemClock> {
    id: Uuid,
    config: StreamConfig,
    aggregator: Aggregator,
    clock_state: StreamClockState,
    clock: C,
    battery_level: Option<u8>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    /// Create a session with default settings
    pub fn new() -> Self {
        Self::with_clock(StreamConfig::default(), SystemClock)
    }

    /// Create a session from a validated configuration
    pub fn with_config(config: StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self::with_clock(config, SystemClock))
    }
}

impl<C: WallClock> StreamSession<C> {
    /// Create a session that reads wall-clock time from `clock`
    pub fn with_clock(config: StreamConfig, clock: C) -> Self {
        let aggregator = Aggregator::new(&config);
        let clock_state = StreamClockState::with_sample_rate(config.acc_sample_rate_hz);
        let id = Uuid::new_v4();
        log::info!("Stream session {} started", id);
        Self {
            id,
            config,
            aggregator,
            clock_state,
            clock,
            battery_level: None,
        }
    }

    /// Ingest one notification, dropping it with a warning if malformed
    pub fn ingest(&mut self, frame: RawFrame<'_>) -> Vec<StreamEvent> {
        match self.try_ingest(frame) {
            Ok(events) => events,
            Err(e) => {
                log::warn!(
                    "Dropping {} notification ({} bytes): {}",
                    frame.characteristic.as_str(),
                    frame.data.len(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Ingest one notification, surfacing decode errors
    pub fn try_ingest(&mut self, frame: RawFrame<'_>) -> Result<Vec<StreamEvent>, StreamError> {
        let decoded = decode_frame(frame, &mut self.clock_state, &self.clock)?;

        let events = match decoded {
            None => Vec::new(),
            Some(Decoded::Samples(batch)) => self.aggregator.apply(batch),
            Some(Decoded::BatteryLevel(level)) => {
                self.battery_level = Some(level);
                vec![StreamEvent::BatteryLevel(level)]
            }
            Some(Decoded::Control(response)) => {
                if !response.status.is_success() {
                    log::warn!(
                        "Control op 0x{:02x} for {} failed: {:?}",
                        response.op_code,
                        response.measurement.map_or("unknown", |m| m.as_str()),
                        response.status
                    );
                }
                vec![StreamEvent::ControlResponse(response)]
            }
        };
        Ok(events)
    }

    /// Ingest a notification identified by its characteristic UUID
    pub fn ingest_uuid(
        &mut self,
        uuid: &Uuid,
        data: &[u8],
    ) -> Result<Vec<StreamEvent>, StreamError> {
        let characteristic = Characteristic::from_uuid(uuid)?;
        self.try_ingest(RawFrame::new(characteristic, data))
    }

    /// Discard all buffers, the clock anchor and battery state, and start a
    /// new session id
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.clock_state.reset();
        self.battery_level = None;
        let previous = std::mem::replace(&mut self.id, Uuid::new_v4());
        log::info!("Stream session {} reset as {}", previous, self.id);
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Latest derived metrics
    pub fn metrics(&self) -> DerivedMetrics {
        self.aggregator.metrics()
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.battery_level
    }

    /// Read-only view of the signal buffers
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn clock_state(&self) -> &StreamClockState {
        &self.clock_state
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmd::FixedClock;
    use crate::protocol::{ControlStatus, PMD_DATA};
    use crate::types::{AccSample, HrSample};
    use pretty_assertions::assert_eq;

    fn session() -> StreamSession<FixedClock> {
        StreamSession::with_clock(StreamConfig::default(), FixedClock(1_700_000_000.0))
    }

    fn acc_frame(device_ns: u64, n: usize) -> Vec<u8> {
        let mut frame = vec![0x02];
        frame.extend_from_slice(&device_ns.to_le_bytes());
        frame.push(0x01);
        for _ in 0..n {
            frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x64, 0x00]);
        }
        frame
    }

    #[test]
    fn test_heart_rate_to_rmssd() {
        let mut session = session();
        let events = session.ingest(RawFrame::new(
            Characteristic::HeartRateMeasurement,
            &[0x10, 64, 0x00, 0x04, 0x00, 0x04],
        ));
        assert_eq!(
            events,
            vec![
                StreamEvent::HrSample(HrSample {
                    bpm: 64,
                    ibis: vec![1000, 1000],
                }),
                StreamEvent::Rmssd(0.0),
            ]
        );
        assert_eq!(session.metrics().rmssd_ms, Some(0.0));
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let mut session = session();
        assert!(session
            .ingest(RawFrame::new(Characteristic::PmdData, &[0x00, 0x01]))
            .is_empty());
        assert!(session
            .try_ingest(RawFrame::new(Characteristic::PmdData, &[0x00, 0x01]))
            .is_err());
        assert!(session.aggregator().ecg().is_empty());
    }

    #[test]
    fn test_heart_rate_without_intervals_rejected() {
        let mut session = session();
        let frame = RawFrame::new(Characteristic::HeartRateMeasurement, &[0x10, 80]);
        assert!(matches!(
            session.try_ingest(frame),
            Err(StreamError::FrameTooShort { needed: 4, actual: 2, .. })
        ));
        assert!(session.ingest(frame).is_empty());
        assert!(session.aggregator().ibis().is_empty());
    }

    #[test]
    fn test_acc_timestamps_anchor_once() {
        let mut session = session();
        let events = session.ingest(RawFrame::new(
            Characteristic::PmdData,
            &acc_frame(5_000_000_000, 2),
        ));
        assert_eq!(events.len(), 2);
        let StreamEvent::AccSample(AccSample { xyz, timestamp }) = events[1] else {
            panic!("expected ACC sample");
        };
        assert_eq!(xyz, [0.0, 0.0, 1.0]);
        assert!((timestamp - 1_700_000_000.0).abs() < 1e-6);
        assert!(session.clock_state().is_anchored());
        assert_eq!(session.aggregator().acc_z().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_configured_acc_rate_spaces_timestamps() {
        let config = StreamConfig {
            acc_sample_rate_hz: 100.0,
            ..StreamConfig::default()
        };
        let mut session = StreamSession::with_clock(config, FixedClock(1000.0));
        let events = session.ingest(RawFrame::new(
            Characteristic::PmdData,
            &acc_frame(5_000_000_000, 3),
        ));
        let timestamps: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::AccSample(s) => Some(s.timestamp),
                _ => None,
            })
            .collect();
        assert_eq!(timestamps.len(), 3);
        assert!((timestamps[1] - timestamps[0] - 0.01).abs() < 1e-6);
        assert!((timestamps[2] - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_battery_and_control() {
        let mut session = session();
        let events = session.ingest(RawFrame::new(Characteristic::BatteryLevel, &[64]));
        assert_eq!(events, vec![StreamEvent::BatteryLevel(64)]);
        assert_eq!(session.battery_level(), Some(64));

        let events = session.ingest(RawFrame::new(
            Characteristic::PmdControl,
            &[0xf0, 0x02, 0x00, 0x06],
        ));
        let StreamEvent::ControlResponse(response) = &events[0] else {
            panic!("expected control response");
        };
        assert_eq!(response.status, ControlStatus::AlreadyInState);
    }

    #[test]
    fn test_ingest_by_uuid() {
        let mut session = session();
        let mut frame = vec![0x00];
        frame.extend_from_slice(&[0u8; 9]);
        frame.extend_from_slice(&[0x01, 0x00, 0x00, 0xff, 0xff, 0xff]);
        let events = session.ingest_uuid(&PMD_DATA, &frame).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::EcgSample(1), StreamEvent::EcgSample(-1)]
        );
        assert!(session.ingest_uuid(&Uuid::nil(), &frame).is_err());
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut session = session();
        session.ingest(RawFrame::new(Characteristic::BatteryLevel, &[90]));
        session.ingest(RawFrame::new(
            Characteristic::PmdData,
            &acc_frame(5_000_000_000, 3),
        ));
        let first_id = session.session_id();

        session.reset();
        assert_ne!(session.session_id(), first_id);
        assert_eq!(session.battery_level(), None);
        assert!(!session.clock_state().is_anchored());
        assert!(session.aggregator().acc_z().is_empty());
    }

    #[test]
    fn test_with_config_validates() {
        let config = StreamConfig {
            ecg_capacity: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            StreamSession::with_config(config),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn test_decode_notification_stateless() {
        let events =
            decode_notification(Characteristic::HeartRateMeasurement, &[0x00, 70]).unwrap();
        assert!(events.is_empty());
    }
}
