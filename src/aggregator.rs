//! Streaming aggregator
//!
//! Owns one rolling buffer per signal, appends decoded batches, and reruns
//! the derived metrics when their buffers reach the trigger size.

use crate::buffer::SignalBuffer;
use crate::config::StreamConfig;
use crate::metrics::{rmssd, RespirationEstimator};
use crate::types::{DerivedMetrics, SampleBatch, StreamEvent};

#[derive(Debug)]
pub struct Aggregator {
    ecg: SignalBuffer<i32>,
    ppg: SignalBuffer<[i32; 4]>,
    acc_z: SignalBuffer<f64>,
    ibis: SignalBuffer<u32>,
    respiration: RespirationEstimator,
    respiration_trigger: usize,
    metrics: DerivedMetrics,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(&StreamConfig::default())
    }
}

impl Aggregator {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            ecg: SignalBuffer::bounded(config.ecg_capacity),
            ppg: SignalBuffer::bounded(config.ppg_capacity),
            acc_z: SignalBuffer::bounded(config.acc_capacity),
            ibis: SignalBuffer::with_capacity(config.ibi_history_limit),
            respiration: RespirationEstimator::new(
                config.respiration_padding,
                config.acc_sample_rate_hz,
            )
            .with_range(config.respiration_range_bpm),
            respiration_trigger: config.respiration_trigger,
            metrics: DerivedMetrics::default(),
        }
    }

    /// Append a decoded batch and return the events it produces: one per
    /// sample, followed by any recomputed metric.
    pub fn apply(&mut self, batch: SampleBatch) -> Vec<StreamEvent> {
        match batch {
            SampleBatch::Ecg(samples) => {
                self.ecg.extend(samples.iter().copied());
                samples.into_iter().map(StreamEvent::EcgSample).collect()
            }
            SampleBatch::Ppg(samples) => {
                self.ppg.extend(samples.iter().copied());
                samples.into_iter().map(StreamEvent::PpgSample).collect()
            }
            SampleBatch::Acc(samples) => {
                self.acc_z
                    .extend(samples.iter().map(|s| f64::from(s.xyz[2])));
                let mut events: Vec<StreamEvent> =
                    samples.into_iter().map(StreamEvent::AccSample).collect();
                if let Some(bpm) = self.update_respiration() {
                    events.push(StreamEvent::Respiration(bpm));
                }
                events
            }
            SampleBatch::Hr(sample) => {
                self.ibis.extend(sample.ibis.iter().copied());
                let mut events = vec![StreamEvent::HrSample(sample)];
                if let Some(value) = self.update_rmssd() {
                    events.push(StreamEvent::Rmssd(value));
                }
                events
            }
        }
    }

    fn update_rmssd(&mut self) -> Option<f64> {
        self.metrics.rmssd_ms = rmssd(self.ibis.iter());
        self.metrics.rmssd_ms
    }

    fn update_respiration(&mut self) -> Option<f64> {
        if self.acc_z.len() < self.respiration_trigger {
            return None;
        }
        let window = self.acc_z.to_vec();
        let estimate = self.respiration.estimate(&window);
        if let Some(bpm) = estimate {
            self.metrics.respiration_bpm = Some(bpm);
            log::debug!("Respiration {:.1} BPM over {} samples", bpm, window.len());
        }
        estimate
    }

    /// Latest derived metrics
    pub fn metrics(&self) -> DerivedMetrics {
        self.metrics
    }

    pub fn ecg(&self) -> &SignalBuffer<i32> {
        &self.ecg
    }

    pub fn ppg(&self) -> &SignalBuffer<[i32; 4]> {
        &self.ppg
    }

    pub fn acc_z(&self) -> &SignalBuffer<f64> {
        &self.acc_z
    }

    pub fn ibis(&self) -> &SignalBuffer<u32> {
        &self.ibis
    }

    /// Drop all buffered samples and metrics
    pub fn reset(&mut self) {
        self.ecg.clear();
        self.ppg.clear();
        self.acc_z.clear();
        self.ibis.clear();
        self.metrics = DerivedMetrics::default();
    }
}
