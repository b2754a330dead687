//! Synheart Stream - Real-time decoder for Polar biosensor telemetry
//!
//! Stream turns GATT notifications from Polar H10 / OH1 sensors into typed
//! physiological signals through a deterministic pipeline: byte reader →
//! frame decoder → rolling buffers → derived metrics → events.
//!
//! ## Modules
//!
//! - **Decoding**: standard heart-rate frames and vendor PMD frames (ECG, PPG, ACC)
//! - **Aggregation**: bounded signal buffers, RMSSD and respiration rate

pub mod aggregator;
pub mod buffer;
pub mod bytes;
pub mod config;
pub mod decoder;
pub mod error;
pub mod hr;
pub mod metrics;
pub mod pipeline;
pub mod pmd;
pub mod protocol;
pub mod record;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::Aggregator;
pub use config::StreamConfig;
pub use decoder::decode_frame;
pub use error::StreamError;
pub use pipeline::{decode_notification, StreamSession};
pub use pmd::{FixedClock, StreamClockState, SystemClock, WallClock};
pub use protocol::{ControlResponse, ControlStatus, DeviceModel};
pub use types::{
    AccSample, Characteristic, DerivedMetrics, HrSample, MeasurementType, RawFrame, SampleBatch,
    StreamEvent,
};

/// Library version
pub const STREAM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "synheart-stream";
