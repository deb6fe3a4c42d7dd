//! The persistent node graph and the instruction reconciler that mutates it
//! (spec §3, §4.1).
//!
//! Nodes live in one table for their whole lifetime, including the window
//! between `DELETE_NODE` and physical destruction: `DELETE_NODE` only flips
//! `alive` to `false` and drops the node out of root/child bookkeeping
//! (phase one). A node is only actually removed from the table once its
//! [`RefCountedPool`]-style use handle's strong count has fallen back to one
//! — meaning no outstanding render sequence still points at it (phase two,
//! driven by [`Reconciler::prune_garbage`]). This mirrors `knaster_core`'s
//! `Arc<AtomicBool>` live-flag two-phase teardown, adapted to plain
//! refcounting since nothing here needs an atomic (pruning only ever runs on
//! the control thread).

use std::collections::HashMap;
use std::sync::Arc;

use elementary_core::{ErrorCode, GraphNode, NodeId, NodeRegistry, PropertyContext, SharedResourceMap};
use elementary_primitives::Name;

use crate::instruction::Instruction;

pub(crate) struct NodeEntry {
    pub(crate) node: Box<dyn GraphNode>,
    pub(crate) kind: Name,
    pub(crate) children: Vec<NodeId>,
    pub(crate) alive: bool,
    /// Cloned into every compiled [`crate::compiler::RenderSequence`] that
    /// references this node; see the module doc for the two-phase teardown
    /// this enables.
    pub(crate) use_handle: Arc<()>,
}

/// Owns the node/edge/garbage tables and applies instruction batches to them
/// (spec §4.1). Recompilation and render-sequence handoff are the caller's
/// job (`Runtime`); the reconciler only ever touches the persistent graph.
pub struct Reconciler {
    pub(crate) nodes: HashMap<NodeId, NodeEntry>,
    /// The most recently activated root set, in the order the client gave it
    /// (spec §4.2: "order active-before-fading").
    pub(crate) active_roots: Vec<NodeId>,
    registry: NodeRegistry,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            active_roots: Vec::new(),
            registry: NodeRegistry::new(),
        }
    }

    pub fn register_node_type(
        &mut self,
        kind: &str,
        factory: elementary_core::NodeFactory,
    ) -> Result<(), ErrorCode> {
        self.registry.register(kind, factory)
    }

    /// Apply one decoded instruction. `COMMIT_UPDATES` is intentionally not
    /// handled here — the caller (`Runtime`) intercepts it to trigger
    /// recompilation, since the reconciler has no notion of render sequences.
    pub fn apply(&mut self, instruction: &Instruction, property_ctx: &PropertyContext) -> Result<(), ErrorCode> {
        match instruction {
            Instruction::CreateNode { id, kind } => self.create_node(*id, kind),
            Instruction::DeleteNode { id } => self.delete_node(*id),
            Instruction::AppendChild { parent, child } => self.append_child(*parent, *child),
            Instruction::SetProperty { id, key, value } => self.set_property(*id, key, value, property_ctx),
            Instruction::ActivateRoots { ids } => self.activate_roots(ids),
            Instruction::CommitUpdates => Ok(()),
        }
    }

    fn create_node(&mut self, id: NodeId, kind: &Name) -> Result<(), ErrorCode> {
        if self.nodes.get(&id).is_some_and(|e| e.alive) {
            return Err(ErrorCode::NodeAlreadyExists);
        }
        let node = self.registry.create(kind)?;
        self.nodes.insert(
            id,
            NodeEntry {
                node,
                kind: kind.clone(),
                children: Vec::new(),
                alive: true,
                use_handle: Arc::new(()),
            },
        );
        Ok(())
    }

    fn delete_node(&mut self, id: NodeId) -> Result<(), ErrorCode> {
        let entry = self.nodes.get_mut(&id).filter(|e| e.alive).ok_or(ErrorCode::NodeNotFound)?;
        entry.alive = false;
        self.active_roots.retain(|&r| r != id);
        Ok(())
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ErrorCode> {
        if !self.nodes.get(&child).is_some_and(|e| e.alive) {
            return Err(ErrorCode::NodeNotFound);
        }
        let parent_entry = self.nodes.get_mut(&parent).filter(|e| e.alive).ok_or(ErrorCode::NodeNotFound)?;
        parent_entry.children.push(child);
        Ok(())
    }

    fn set_property(
        &mut self,
        id: NodeId,
        key: &str,
        value: &elementary_primitives::Value,
        property_ctx: &PropertyContext,
    ) -> Result<(), ErrorCode> {
        let entry = self.nodes.get_mut(&id).filter(|e| e.alive).ok_or(ErrorCode::NodeNotFound)?;
        entry.node.set_property(property_ctx, key, value)
    }

    fn activate_roots(&mut self, ids: &[NodeId]) -> Result<(), ErrorCode> {
        for &id in ids {
            let entry = self.nodes.get(&id).filter(|e| e.alive).ok_or(ErrorCode::NodeNotFound)?;
            if entry.kind.as_str() != "root" {
                return Err(ErrorCode::InvariantViolation);
            }
        }
        let previously_active: Vec<NodeId> = self.active_roots.drain(..).collect();
        for id in &previously_active {
            if !ids.contains(id) {
                if let Some(entry) = self.nodes.get_mut(id) {
                    let _ = entry.node.set_property(
                        &PropertyContext { sample_rate: 0, block_size: 0, resources: &SharedResourceMap::new() },
                        "active",
                        &elementary_primitives::Value::Bool(false),
                    );
                }
            }
        }
        for &id in ids {
            if !previously_active.contains(&id) {
                if let Some(entry) = self.nodes.get_mut(&id) {
                    let _ = entry.node.set_property(
                        &PropertyContext { sample_rate: 0, block_size: 0, resources: &SharedResourceMap::new() },
                        "active",
                        &elementary_primitives::Value::Bool(true),
                    );
                }
            }
        }
        self.active_roots = ids.to_vec();
        Ok(())
    }

    /// Remove garbage-table entries whose only remaining reference is the
    /// table itself — i.e. no compiled render sequence still points at them
    /// (spec §4.1: "After each batch, the reconciler prunes the garbage
    /// table, destroying any node whose use-count has returned to one").
    pub fn prune_garbage(&mut self) {
        self.nodes.retain(|_, entry| entry.alive || Arc::strong_count(&entry.use_handle) > 1);
    }

    /// The kind of a live or still-fading node, if it exists at all.
    pub(crate) fn kind_of(&self, id: NodeId) -> Option<Name> {
        self.nodes.get(&id).map(|e| e.kind.clone())
    }

    /// Mutable access to one node for block execution. `Runtime::process`
    /// is the only caller; nodes that were physically removed by
    /// `prune_garbage` (or never existed) are silently skipped.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Box<dyn GraphNode>> {
        self.nodes.get_mut(&id).map(|e| &mut e.node)
    }

    /// Every node keyed by id, mutable — used for event readout and reset,
    /// which must visit every node regardless of liveness or reachability.
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut NodeEntry)> {
        self.nodes.iter_mut()
    }

    /// Every registered node kind, in registration order (built-ins first,
    /// then any custom kinds added via `register_node_type`) — backs
    /// `snapshot()`'s `registeredKinds` listing.
    pub(crate) fn registered_kinds(&self) -> impl Iterator<Item = &Name> {
        self.registry.kinds()
    }

    /// `(alive count, garbage-pending count)` for [`crate::Diagnostics`].
    pub(crate) fn liveness_counts(&self) -> (usize, usize) {
        let alive = self.nodes.values().filter(|e| e.alive).count();
        (alive, self.nodes.len() - alive)
    }

    /// All root node ids, alive or still fading, in creation order — the
    /// candidate set the compiler filters down to active + still-fading.
    pub(crate) fn root_candidates(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, e)| e.kind.as_str() == "root")
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementary_primitives::Value;

    fn pctx() -> (SharedResourceMap,) {
        (SharedResourceMap::new(),)
    }

    #[test]
    fn create_then_duplicate_create_is_rejected() {
        let mut r = Reconciler::new();
        let (resources,) = pctx();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        r.apply(&Instruction::CreateNode { id: 1, kind: Name::from("const") }, &ctx).unwrap();
        let err = r.apply(&Instruction::CreateNode { id: 1, kind: Name::from("const") }, &ctx);
        assert_eq!(err.unwrap_err(), ErrorCode::NodeAlreadyExists);
    }

    #[test]
    fn unknown_kind_create_is_rejected() {
        let mut r = Reconciler::new();
        let (resources,) = pctx();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        let err = r.apply(&Instruction::CreateNode { id: 1, kind: Name::from("nope") }, &ctx);
        assert_eq!(err.unwrap_err(), ErrorCode::UnknownKind);
    }

    #[test]
    fn delete_is_two_phase_until_use_count_drops() {
        let mut r = Reconciler::new();
        let (resources,) = pctx();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        r.apply(&Instruction::CreateNode { id: 1, kind: Name::from("const") }, &ctx).unwrap();
        let handle_clone = r.nodes.get(&1).unwrap().use_handle.clone();
        r.apply(&Instruction::DeleteNode { id: 1 }, &ctx).unwrap();
        r.prune_garbage();
        assert!(r.nodes.contains_key(&1), "still referenced, must not be destroyed yet");
        drop(handle_clone);
        r.prune_garbage();
        assert!(!r.nodes.contains_key(&1));
    }

    #[test]
    fn append_child_requires_both_nodes_alive() {
        let mut r = Reconciler::new();
        let (resources,) = pctx();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        r.apply(&Instruction::CreateNode { id: 1, kind: Name::from("const") }, &ctx).unwrap();
        let err = r.apply(&Instruction::AppendChild { parent: 1, child: 2 }, &ctx);
        assert_eq!(err.unwrap_err(), ErrorCode::NodeNotFound);
    }

    #[test]
    fn activate_roots_rejects_non_root_kinds() {
        let mut r = Reconciler::new();
        let (resources,) = pctx();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        r.apply(&Instruction::CreateNode { id: 1, kind: Name::from("const") }, &ctx).unwrap();
        let err = r.apply(&Instruction::ActivateRoots { ids: vec![1] }, &ctx);
        assert_eq!(err.unwrap_err(), ErrorCode::InvariantViolation);
    }

    #[test]
    fn set_property_rejects_unknown_node() {
        let mut r = Reconciler::new();
        let (resources,) = pctx();
        let ctx = PropertyContext { sample_rate: 48_000, block_size: 64, resources: &resources };
        let err = r.apply(&Instruction::SetProperty { id: 1, key: Name::from("value"), value: Value::Number(1.0) }, &ctx);
        assert_eq!(err.unwrap_err(), ErrorCode::NodeNotFound);
    }
}
