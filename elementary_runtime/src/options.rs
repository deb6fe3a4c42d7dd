//! Runtime configuration, mirroring `knaster_graph::processor::AudioProcessorOptions`'s
//! role: the handful of knobs that must be fixed before the first block runs.

/// Configures a [`crate::Runtime`] at construction. `Default` matches the
/// teacher's `AudioProcessorOptions` defaults where the concept overlaps
/// (block size, sample rate, ring-buffer capacities).
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Depth of the control→audio render-sequence handoff queue (spec §5).
    /// Only the newest sequence is ever adopted (`pop_latest`), so this only
    /// needs to absorb bursts of `COMMIT_UPDATES` between audio callbacks.
    pub sequence_queue_capacity: usize,
    /// Depth of the audio→control realtime-diagnostics log queue (spec §6.3).
    pub log_queue_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 64,
            sequence_queue_capacity: 4,
            log_queue_capacity: 256,
        }
    }
}

impl RuntimeOptions {
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            ..Default::default()
        }
    }
}
