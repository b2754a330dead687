//! sensor.notification.v1 recording format
//!
//! One JSON object per GATT notification, as captured from a live device.
//! Recordings are replayed through a `StreamSession` to reproduce the exact
//! event stream offline.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::pipeline::StreamSession;
use crate::pmd::{SystemClock, WallClock};
use crate::types::{Characteristic, RawFrame, StreamEvent};

/// Current record schema version
pub const RECORD_SCHEMA_VERSION: &str = "sensor.notification.v1";

/// One recorded notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub schema_version: String,
    pub characteristic: Characteristic,
    /// Notification payload bytes
    pub data: Vec<u8>,
    /// Host receive time (epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<f64>,
}

impl NotificationRecord {
    pub fn new(characteristic: Characteristic, data: Vec<u8>) -> Self {
        Self {
            schema_version: RECORD_SCHEMA_VERSION.to_string(),
            characteristic,
            data,
            received_at: None,
        }
    }

    pub fn with_received_at(mut self, received_at: f64) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn frame(&self) -> RawFrame<'_> {
        RawFrame::new(self.characteristic, &self.data)
    }

    /// Validate the record schema
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.schema_version != RECORD_SCHEMA_VERSION {
            return Err(RecordValidationError::InvalidSchemaVersion {
                expected: RECORD_SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }
        if self.data.is_empty() {
            return Err(RecordValidationError::EmptyPayload);
        }
        if let Some(t) = self.received_at {
            if !t.is_finite() || t < 0.0 {
                return Err(RecordValidationError::InvalidReceiveTime(t));
            }
        }
        Ok(())
    }
}

/// Validation errors for notification records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Empty notification payload")]
    EmptyPayload,

    #[error("Invalid receive time: {0}")]
    InvalidReceiveTime(f64),
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub error: RecordValidationError,
}

/// Parse a JSON array of records
pub fn parse_array(json: &str) -> Result<Vec<NotificationRecord>, StreamError> {
    let records: Vec<NotificationRecord> = serde_json::from_str(json)?;
    Ok(records)
}

/// Parse NDJSON (newline-delimited JSON) records, skipping blank lines
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<NotificationRecord>, StreamError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<NotificationRecord>(trimmed).map_err(|e| {
            StreamError::Parse(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Validate a batch of records, returning only the failures
pub fn validate_records(records: &[NotificationRecord]) -> Vec<ValidationResult> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            record
                .validate()
                .err()
                .map(|error| ValidationResult { index, error })
        })
        .collect()
}

/// Wall clock that follows the receive times of replayed records.
///
/// Falls back to system time until a record with `received_at` is seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayClock {
    current: Option<f64>,
}

impl ReplayClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock to a record's receive time, if it has one
    pub fn advance(&mut self, record: &NotificationRecord) {
        if let Some(t) = record.received_at {
            self.current = Some(t);
        }
    }
}

impl WallClock for ReplayClock {
    fn now_epoch_secs(&self) -> f64 {
        self.current
            .unwrap_or_else(|| SystemClock.now_epoch_secs())
    }
}

/// Replay records in order, dropping malformed ones
pub fn replay(
    session: &mut StreamSession<ReplayClock>,
    records: &[NotificationRecord],
) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for record in records {
        session.clock_mut().advance(record);
        events.extend(session.ingest(record.frame()));
    }
    events
}
