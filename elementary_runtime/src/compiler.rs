//! Compiles the persistent node graph into a [`RenderSequence`]: a flat,
//! topologically-ordered list of render ops plus the scratch-buffer offsets
//! each op reads and writes (spec §4.2).
//!
//! Buffers are assigned as offsets into one growable scratch `Vec<f32>`,
//! generalizing `knaster_graph::buffer_allocator::BufferAllocator`'s
//! offset-then-pointer two-phase scheme: offsets are handed out during
//! compilation (control thread, may grow the backing allocation), and only
//! resolved into actual slices at execution time (audio thread, spec §4.2
//! "child buffer pointers ... resolved at execution time").

use std::collections::HashSet;
use std::sync::Arc;

use elementary_core::NodeId;
use smallvec::SmallVec;

use crate::reconciler::Reconciler;

const CHUNK_BUFFERS: usize = 32;

/// Offset-based scratch allocator. Grows by appending whole chunks; never
/// frees during a single compile pass (spec §4.2: "never frees during
/// compile") — buffers are only reclaimed wholesale when a `RenderSequence`
/// is dropped and a later compile starts over from offset zero.
pub(crate) struct BufferAllocator {
    block_size: usize,
    next_offset: usize,
    reserved: usize,
}
impl BufferAllocator {
    fn new(block_size: usize) -> Self {
        Self { block_size, next_offset: 0, reserved: CHUNK_BUFFERS * block_size }
    }

    fn allocate(&mut self) -> usize {
        let offset = self.next_offset;
        self.next_offset += self.block_size;
        while self.next_offset > self.reserved {
            self.reserved += CHUNK_BUFFERS * self.block_size;
        }
        offset
    }

    fn total_len(&self) -> usize {
        self.reserved
    }
}

/// One node's compiled execution step: which node to run, where to find each
/// positional input (an offset into the sequence's scratch buffer, or `None`
/// for an unconnected input, which the executor treats as silence), and
/// where to write its output.
pub struct RenderOp {
    pub node_id: NodeId,
    pub input_offsets: SmallVec<[Option<usize>; 4]>,
    pub output_offset: usize,
}

/// The compiled, immutable render plan handed to the audio thread (spec §3,
/// §4.2). Holds an `Arc<()>` per referenced node purely to keep the
/// reconciler's garbage-collection use-count accurate — see
/// [`crate::reconciler::Reconciler`]'s module doc.
pub struct RenderSequence {
    pub ops: Vec<RenderOp>,
    pub scratch_len: usize,
    pub root_ops: Vec<(NodeId, usize, usize)>,
    _use_handles: Vec<Arc<()>>,
}

/// Walks the node graph from the active-then-fading root set, assigning each
/// reachable node to exactly one position in `ops` via a shared `visited`
/// set (spec §4.2: "each node in exactly one sub-sequence — first root
/// reaching it").
pub(crate) fn compile(reconciler: &Reconciler, sample_rate: u32, block_size: usize) -> RenderSequence {
    let mut allocator = BufferAllocator::new(block_size);
    let mut ops = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut use_handles = Vec::new();
    let mut root_ops = Vec::new();

    let mut roots: Vec<NodeId> = reconciler.active_roots.clone();
    for &candidate in &reconciler.root_candidates() {
        if roots.contains(&candidate) {
            continue;
        }
        if let Some(entry) = reconciler.nodes.get(&candidate) {
            if entry.alive {
                if let Some((active, silent)) = entry.node.root_state() {
                    if active || !silent {
                        roots.push(candidate);
                    }
                }
            }
        }
    }

    for &root_id in &roots {
        if !visited.contains(&root_id) && reconciler.nodes.get(&root_id).is_some_and(|e| e.alive) {
            let output_offset = visit(reconciler, root_id, &mut visited, &mut allocator, &mut ops, &mut use_handles);
            let channel = if let elementary_primitives::Value::Number(n) = reconciler.nodes[&root_id]
                .node
                .properties()
                .get("channel")
                .cloned()
                .unwrap_or(elementary_primitives::Value::Number(0.0))
            {
                n as usize
            } else {
                0
            };
            root_ops.push((root_id, output_offset, channel));
        }
    }

    // `tapOut` registers on whichever sub-sequence reaches it (spec §4.4); a
    // `tapOut` with no root downstream of it is still live and must still
    // run every block to keep feeding its named tap, so any one not already
    // pulled in by a root's traversal gets its own standalone traversal.
    let mut tap_out_ids: Vec<NodeId> = reconciler
        .nodes
        .iter()
        .filter(|(_, e)| e.alive && e.kind.as_str() == "tapOut")
        .map(|(id, _)| *id)
        .collect();
    tap_out_ids.sort_unstable();
    for tap_out_id in tap_out_ids {
        if !visited.contains(&tap_out_id) {
            visit(reconciler, tap_out_id, &mut visited, &mut allocator, &mut ops, &mut use_handles);
        }
    }

    RenderSequence {
        ops,
        scratch_len: allocator.total_len(),
        root_ops,
        _use_handles: use_handles,
    }
}

fn visit(
    reconciler: &Reconciler,
    node_id: NodeId,
    visited: &mut HashSet<NodeId>,
    allocator: &mut BufferAllocator,
    ops: &mut Vec<RenderOp>,
    use_handles: &mut Vec<Arc<()>>,
) -> usize {
    if visited.contains(&node_id) {
        // A second root reached an already-scheduled node; its buffer offset
        // was already recorded in an earlier op. Re-derive it by scanning —
        // cheap at compile time, and avoids a second lookup table.
        return ops.iter().find(|op| op.node_id == node_id).map(|op| op.output_offset).unwrap_or(0);
    }
    visited.insert(node_id);
    let entry = &reconciler.nodes[&node_id];
    let mut input_offsets: SmallVec<[Option<usize>; 4]> = SmallVec::new();
    for &child_id in &entry.children {
        let offset = if reconciler.nodes.get(&child_id).is_some_and(|e| e.alive) {
            Some(visit(reconciler, child_id, visited, allocator, ops, use_handles))
        } else {
            None
        };
        input_offsets.push(offset);
    }
    let output_offset = allocator.allocate();
    use_handles.push(entry.use_handle.clone());
    ops.push(RenderOp { node_id, input_offsets, output_offset });
    output_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use elementary_core::{PropertyContext, SharedResourceMap};
    use elementary_primitives::Name;

    fn apply(r: &mut Reconciler, i: Instruction) {
        let resources = SharedResourceMap::new();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        r.apply(&i, &ctx).unwrap();
    }

    #[test]
    fn compiles_a_single_root_with_one_child() {
        let mut r = Reconciler::new();
        apply(&mut r, Instruction::CreateNode { id: 1, kind: Name::from("const") });
        apply(&mut r, Instruction::CreateNode { id: 2, kind: Name::from("root") });
        apply(&mut r, Instruction::AppendChild { parent: 2, child: 1 });
        apply(&mut r, Instruction::ActivateRoots { ids: vec![2] });

        let seq = compile(&r, 48_000, 64);
        assert_eq!(seq.ops.len(), 2);
        assert_eq!(seq.root_ops.len(), 1);
        assert!(seq.scratch_len >= 2 * 64);
    }

    #[test]
    fn shared_child_is_only_scheduled_once() {
        let mut r = Reconciler::new();
        apply(&mut r, Instruction::CreateNode { id: 1, kind: Name::from("const") });
        apply(&mut r, Instruction::CreateNode { id: 2, kind: Name::from("root") });
        apply(&mut r, Instruction::CreateNode { id: 3, kind: Name::from("root") });
        apply(&mut r, Instruction::AppendChild { parent: 2, child: 1 });
        apply(&mut r, Instruction::AppendChild { parent: 3, child: 1 });
        apply(&mut r, Instruction::ActivateRoots { ids: vec![2, 3] });

        let seq = compile(&r, 48_000, 64);
        assert_eq!(seq.ops.iter().filter(|op| op.node_id == 1).count(), 1);
    }
}
