//! The `Runtime`: ties the reconciler, compiler, and block-rate scheduler
//! together behind the wire API spec §6.2 describes (spec §5's two logical
//! call sites — "control thread" methods and the single "audio thread"
//! method — are just different methods on this one struct; which OS thread
//! actually calls which is the host's concern, same as `knaster_graph`'s
//! split between `Graph` and `GraphGen`).

use std::sync::Arc;

use elementary_core::{Event, ErrorCode, NodeFactory, PropertyContext, RtLogReceiver, RtLogSender, SharedResourceMap, TapBus};
use elementary_primitives::{Name, SpscConsumer, SpscProducer, SpscQueue, Value};
use smallvec::SmallVec;

use crate::compiler::{self, RenderSequence};
use crate::diagnostics::Diagnostics;
use crate::events::with_source;
use crate::instruction::Instruction;
use crate::options::RuntimeOptions;
use crate::reconciler::Reconciler;

pub struct Runtime {
    reconciler: Reconciler,
    resources: SharedResourceMap,
    tap_bus: TapBus,
    logger_tx: RtLogSender,
    logger_rx: RtLogReceiver,
    seq_tx: SpscProducer<Arc<RenderSequence>>,
    seq_rx: SpscConsumer<Arc<RenderSequence>>,
    current_sequence: Option<Arc<RenderSequence>>,
    scratch: Vec<f32>,
    sample_rate: u32,
    block_size: usize,
    frame_clock: u64,
    render_sequences_compiled: u64,
}

impl Runtime {
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self::with_options(RuntimeOptions::new(sample_rate, block_size))
    }

    /// Construct with explicit queue capacities (spec §5's "supplemented
    /// features" configuration layer), mirroring
    /// `knaster_graph::processor::AudioProcessorOptions`.
    pub fn with_options(options: RuntimeOptions) -> Self {
        let (seq_tx, seq_rx) = SpscQueue::new::<Arc<RenderSequence>>(options.sequence_queue_capacity);
        let (logger_tx, logger_rx) = RtLogReceiver::channel(options.log_queue_capacity);
        Self {
            reconciler: Reconciler::new(),
            resources: SharedResourceMap::new(),
            tap_bus: TapBus::new(),
            logger_tx,
            logger_rx,
            seq_tx,
            seq_rx,
            current_sequence: None,
            scratch: vec![0.0; options.block_size.max(1)],
            sample_rate: options.sample_rate,
            block_size: options.block_size,
            frame_clock: 0,
            render_sequences_compiled: 0,
        }
    }

    /// Register a custom node kind (spec §6.2 `registerNodeType`). Returns
    /// the dense wire error code (0 on success).
    pub fn register_node_type(&mut self, kind: &str, factory: NodeFactory) -> i32 {
        elementary_core::error::result_to_wire_code(self.reconciler.register_node_type(kind, factory))
    }

    /// Apply a batch of wire-format instructions (spec §4.1, §6.2). Applies
    /// in order; the first failure aborts the remaining batch but changes
    /// already applied stick. Returns the dense wire error code.
    pub fn apply_instructions(&mut self, batch: &[Value]) -> i32 {
        let mut first_error: Option<ErrorCode> = None;
        for raw in batch {
            let result = Instruction::decode(raw).and_then(|instruction| {
                if matches!(instruction, Instruction::CommitUpdates) {
                    self.recompile();
                    Ok(())
                } else {
                    let property_ctx = PropertyContext {
                        sample_rate: self.sample_rate,
                        block_size: self.block_size,
                        resources: &self.resources,
                    };
                    self.reconciler.apply(&instruction, &property_ctx)
                }
            });
            if let Err(e) = result {
                first_error = Some(e);
                break;
            }
        }
        self.reconciler.prune_garbage();
        first_error.map(|e| e.code()).unwrap_or(0)
    }

    fn recompile(&mut self) {
        let sequence = Arc::new(compiler::compile(&self.reconciler, self.sample_rate, self.block_size));
        if sequence.scratch_len > self.scratch.len() {
            self.scratch.resize(sequence.scratch_len, 0.0);
        }
        self.render_sequences_compiled += 1;
        if self.seq_tx.push(sequence).is_err() {
            log::warn!("render sequence queue full; audio thread has not adopted the pending sequence yet");
        }
    }

    /// Read-only counters for host observability (spec §5 "supplemented
    /// features"); never touches anything the audio thread owns.
    pub fn diagnostics(&self) -> Diagnostics {
        let (nodes_live, garbage_pending) = self.reconciler.liveness_counts();
        Diagnostics {
            nodes_live,
            garbage_pending,
            render_sequences_compiled: self.render_sequences_compiled,
        }
    }

    /// Run one block (spec §5, §6.2). `outputs[c]` receives the sum of every
    /// active root assigned to channel `c`. Never allocates: the scratch
    /// buffer was sized during the last `recompile`.
    pub fn process(&mut self, outputs: &mut [&mut [f32]]) {
        if let Some(latest) = self.seq_rx.pop_latest() {
            self.current_sequence = Some(latest);
        }
        for out in outputs.iter_mut() {
            let n = self.block_size.min(out.len());
            out[..n].fill(0.0);
        }
        let Some(sequence) = self.current_sequence.clone() else {
            self.frame_clock += self.block_size as u64;
            return;
        };

        // tapIn ops never read another node's buffer, so running them before
        // every tapOut (regardless of where each falls in topological order)
        // preserves the one-block latency spec §4.4 requires without needing
        // the compiler to interleave unrelated sub-sequences.
        let (tap_ins, rest): (Vec<_>, Vec<_>) = sequence
            .ops
            .iter()
            .partition(|op| self.reconciler.kind_of(op.node_id).as_deref() == Some("tapIn"));

        let block_size = self.block_size;
        let sample_rate = self.sample_rate;
        let frame_clock = self.frame_clock;
        let scratch_ptr = self.scratch.as_mut_ptr();
        let nodes = &mut self.reconciler;
        let tap_bus = &mut self.tap_bus;
        let logger_tx = &mut self.logger_tx;

        for op in tap_ins.into_iter().chain(rest.into_iter()) {
            let Some(node) = nodes.node_mut(op.node_id) else { continue };
            // SAFETY: `output_offset` and every `Some` input offset are
            // disjoint ranges of length `block_size` inside `scratch`,
            // assigned by the allocator during compilation; every input
            // offset refers to a node visited earlier in this same
            // iteration order, so it has already been written this block.
            let output = unsafe { std::slice::from_raw_parts_mut(scratch_ptr.add(op.output_offset), block_size) };
            let mut inputs: SmallVec<[Option<&[f32]>; 4]> = SmallVec::new();
            for input in &op.input_offsets {
                inputs.push(input.map(|off| unsafe { std::slice::from_raw_parts(scratch_ptr.add(off), block_size) }));
            }
            let mut ctx = elementary_core::NodeContext::new(sample_rate, block_size, frame_clock, logger_tx, tap_bus);
            node.process(&mut ctx, &inputs, output);
        }

        for &(_root_id, output_offset, channel) in &sequence.root_ops {
            if let Some(out) = outputs.get_mut(channel) {
                let n = block_size.min(out.len());
                let rendered = unsafe { std::slice::from_raw_parts(scratch_ptr.add(output_offset), block_size) };
                for (dst, src) in out[..n].iter_mut().zip(&rendered[..n]) {
                    *dst += *src;
                }
            }
        }

        self.frame_clock += block_size as u64;
    }

    /// Drain every pending analyzer event plus any realtime-thread
    /// diagnostics raised since the last call (spec §6.2, §6.3).
    pub fn process_events(&mut self, mut emit: impl FnMut(Event)) {
        for (&id, entry) in self.reconciler.nodes_mut() {
            entry.node.process_events(&mut |event| emit(with_source(id, event)));
        }
        self.logger_rx.recv(|chain| {
            let data = Value::Array(
                chain
                    .iter()
                    .filter(|m| !m.is_end())
                    .map(|m| match m {
                        elementary_core::RtLogMessage::Str(s) => Value::String((*s).to_string()),
                        elementary_core::RtLogMessage::Float(f) => Value::Number(*f),
                        elementary_core::RtLogMessage::Int(i) => Value::Number(*i as f64),
                        elementary_core::RtLogMessage::NodeId(n) => Value::Number(*n as f64),
                        elementary_core::RtLogMessage::End => Value::Null,
                    })
                    .collect(),
            );
            emit(Event { kind: Name::from("error"), source: None, data });
        });
    }

    /// Reset all transient per-node state (spec §6.2). Properties and the
    /// graph structure are untouched.
    pub fn reset(&mut self) {
        for entry in self.reconciler.nodes.values_mut() {
            entry.node.reset();
        }
        self.frame_clock = 0;
        self.tap_bus = TapBus::new();
    }

    pub fn update_shared_resource_map(&mut self, name: &str, data: &[f32]) -> bool {
        self.resources.insert(Name::from(name), Arc::from(data.to_vec().into_boxed_slice()))
    }

    pub fn prune_shared_resource_map(&mut self) {
        self.resources.prune();
    }

    pub fn get_shared_resource_map_keys(&self) -> Vec<Name> {
        self.resources.keys().cloned().collect()
    }

    /// A structured dump of the whole graph (spec §6.2 `snapshot`).
    pub fn snapshot(&self) -> Value {
        let mut nodes_map = std::collections::BTreeMap::new();
        // The garbage table is an implementation detail of two-phase teardown
        // (reconciler.rs module doc); a node logically deleted by the batch
        // that produced this snapshot must not still appear in it, even
        // though its physical entry survives until `prune_garbage` observes
        // the use-count has dropped back to one.
        for (&id, entry) in self.reconciler.nodes.iter().filter(|(_, e)| e.alive) {
            let mut node_map = std::collections::BTreeMap::new();
            node_map.insert(Name::from("kind"), Value::String(entry.kind.to_string()));
            node_map.insert(
                Name::from("children"),
                Value::Array(entry.children.iter().map(|&c| Value::Number(c as f64)).collect()),
            );
            node_map.insert(Name::from("properties"), entry.node.properties().to_value());
            nodes_map.insert(Name::from(elementary_core::format_node_id(id).as_str()), Value::Map(node_map));
        }
        let mut root = std::collections::BTreeMap::new();
        root.insert(Name::from("nodes"), Value::Map(nodes_map));
        root.insert(
            Name::from("activeRoots"),
            Value::Array(self.reconciler.active_roots.iter().map(|&id| Value::Number(id as f64)).collect()),
        );
        root.insert(
            Name::from("registeredKinds"),
            Value::Array(self.reconciler.registered_kinds().map(|k| Value::String(k.to_string())).collect()),
        );
        Value::Map(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(id: i32, kind: &str) -> Value {
        Value::Array(vec![Value::Number(0.0), Value::Number(id as f64), Value::String(kind.into())])
    }
    fn commit() -> Value {
        Value::Array(vec![Value::Number(5.0)])
    }

    #[test]
    fn with_options_honors_custom_queue_capacities() {
        let options = RuntimeOptions { sequence_queue_capacity: 1, log_queue_capacity: 1, ..RuntimeOptions::new(8_000, 4) };
        let mut rt = Runtime::with_options(options);
        assert_eq!(rt.apply_instructions(&[create(1, "const"), commit()]), 0);
        let mut out = vec![0.0f32; 4];
        {
            let mut refs: Vec<&mut [f32]> = vec![out.as_mut_slice()];
            rt.process(&mut refs);
        }
    }

    #[test]
    fn diagnostics_counts_live_and_garbage_pending_nodes() {
        let mut rt = Runtime::new(48_000, 16);
        assert_eq!(rt.apply_instructions(&[create(1, "const"), commit()]), 0);
        assert_eq!(rt.diagnostics().nodes_live, 1);
        assert_eq!(rt.diagnostics().render_sequences_compiled, 1);

        assert_eq!(rt.apply_instructions(&[Value::Array(vec![Value::Number(1.0), Value::Number(1.0)])]), 0);
        assert_eq!(rt.diagnostics().nodes_live, 0);
    }

    #[test]
    fn snapshot_lists_registered_kinds() {
        let rt = Runtime::new(48_000, 16);
        let Value::Map(root) = rt.snapshot() else { panic!("snapshot must be a map") };
        let Value::Array(kinds) = &root[&Name::from("registeredKinds")] else { panic!() };
        assert!(kinds.contains(&Value::String("root".to_string())));
        assert!(kinds.contains(&Value::String("const".to_string())));
    }
}
