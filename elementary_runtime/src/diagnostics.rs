//! Read-only host observability, mirroring `knaster_graph::inspection`'s role
//! of exposing graph-shape counters without letting a host mutate anything.

/// A point-in-time snapshot of runtime counters (spec §5 "Supplemented
/// features"). Cheap to compute; never touches the audio thread's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Nodes currently alive (excludes garbage-table entries awaiting prune).
    pub nodes_live: usize,
    /// Nodes logically deleted but still physically retained because a
    /// compiled render sequence still references them.
    pub garbage_pending: usize,
    /// Total render sequences compiled since construction (one per
    /// `COMMIT_UPDATES`, not one per instruction batch).
    pub render_sequences_compiled: u64,
}
