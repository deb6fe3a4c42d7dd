//! The node-kind registry: maps a wire-format kind string to a factory that
//! constructs the right [`GraphNode`] (spec §6.1's `registerNodeType`). Seeded
//! at construction with every built-in kind; custom kinds can be registered
//! later the same way, mirroring `knaster_graph`'s `NodeBank` registration.

use std::collections::HashMap;

use elementary_primitives::Name;

use crate::error::ErrorCode;
use crate::node::GraphNode;
use crate::ops::math::MathOp;
use crate::ops::osc::BlepShape;

pub type NodeFactory = Box<dyn Fn() -> Box<dyn GraphNode> + Send + Sync>;

pub struct NodeRegistry {
    factories: HashMap<Name, NodeFactory>,
    registration_order: Vec<Name>,
}
impl NodeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
            registration_order: Vec::new(),
        };
        registry.seed_builtins();
        registry
    }

    /// Register a factory for `kind`. Returns an error if `kind` is already
    /// registered (spec §6.1: kinds are registered at most once).
    pub fn register(&mut self, kind: &str, factory: NodeFactory) -> Result<(), ErrorCode> {
        let name = Name::from(kind);
        if self.factories.contains_key(&name) {
            return Err(ErrorCode::KindAlreadyRegistered);
        }
        self.factories.insert(name.clone(), factory);
        self.registration_order.push(name);
        Ok(())
    }

    pub fn create(&self, kind: &str) -> Result<Box<dyn GraphNode>, ErrorCode> {
        self.factories.get(kind).map(|f| f()).ok_or(ErrorCode::UnknownKind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Name> {
        self.registration_order.iter()
    }

    fn seed_builtins(&mut self) {
        macro_rules! seed {
            ($name:expr, $make:expr) => {
                self.register($name, Box::new($make)).expect("duplicate built-in node kind");
            };
        }

        for op in MATH_OPS {
            let op = *op;
            self.register(op.kind_str(), Box::new(move || {
                Box::new(crate::ops::math::MathNode::new(op)) as Box<dyn GraphNode>
            }))
            .expect("duplicate built-in math kind");
        }

        seed!("const", || Box::new(crate::ops::const_node::ConstNode::new()) as Box<dyn GraphNode>);
        seed!("cycle", || Box::new(crate::ops::osc::CycleNode::new()) as Box<dyn GraphNode>);
        seed!("phasor", || Box::new(crate::ops::osc::PhasorNode::new(false)) as Box<dyn GraphNode>);
        seed!("sphasor", || Box::new(crate::ops::osc::PhasorNode::new(true)) as Box<dyn GraphNode>);
        seed!("blepsaw", || Box::new(crate::ops::osc::BlepNode::new(BlepShape::Saw)) as Box<dyn GraphNode>);
        seed!("blepsquare", || Box::new(crate::ops::osc::BlepNode::new(BlepShape::Square)) as Box<dyn GraphNode>);
        seed!("bleptriangle", || Box::new(crate::ops::osc::BlepNode::new(BlepShape::Triangle)) as Box<dyn GraphNode>);

        seed!("sr", || Box::new(crate::ops::time::SampleRateNode::new()) as Box<dyn GraphNode>);
        seed!("time", || Box::new(crate::ops::time::TimeNode::new()) as Box<dyn GraphNode>);
        seed!("counter", || Box::new(crate::ops::time::CounterNode::new()) as Box<dyn GraphNode>);
        seed!("accum", || Box::new(crate::ops::time::AccumNode::new()) as Box<dyn GraphNode>);
        seed!("z", || Box::new(crate::ops::time::ZNode::new()) as Box<dyn GraphNode>);

        seed!("rand", || Box::new(crate::ops::noise::RandNode::new()) as Box<dyn GraphNode>);

        seed!("latch", || Box::new(crate::ops::gate::LatchNode::new()) as Box<dyn GraphNode>);
        seed!("snapshot", || Box::new(crate::ops::gate::SnapshotNode::new()) as Box<dyn GraphNode>);
        seed!("maxhold", || Box::new(crate::ops::gate::MaxHoldNode::new()) as Box<dyn GraphNode>);
        seed!("once", || Box::new(crate::ops::gate::OnceNode::new()) as Box<dyn GraphNode>);

        seed!("seq", || Box::new(crate::ops::seq::SeqNode::new()) as Box<dyn GraphNode>);
        seed!("seq2", || Box::new(crate::ops::seq::Seq2Node::new()) as Box<dyn GraphNode>);
        seed!("sparseq", || Box::new(crate::ops::sparseq::SparSeqNode::new()) as Box<dyn GraphNode>);
        seed!("sparseq2", || Box::new(crate::ops::sparseq::SparSeq2Node::new()) as Box<dyn GraphNode>);
        seed!("sampleseq", || Box::new(crate::ops::sparseq::SampleSeqNode::new()) as Box<dyn GraphNode>);
        seed!("sampleseq2", || Box::new(crate::ops::sparseq::SampleSeq2Node::new()) as Box<dyn GraphNode>);

        seed!("sample", || Box::new(crate::ops::sample::SampleNode::new()) as Box<dyn GraphNode>);
        seed!("table", || Box::new(crate::ops::sample::TableNode::new()) as Box<dyn GraphNode>);
        seed!("in", || Box::new(crate::ops::sample::InNode::new()) as Box<dyn GraphNode>);

        seed!("pole", || Box::new(crate::ops::filters::PoleNode::new()) as Box<dyn GraphNode>);
        seed!("env", || Box::new(crate::ops::filters::EnvNode::new()) as Box<dyn GraphNode>);
        seed!("biquad", || Box::new(crate::ops::filters::BiquadNode::new()) as Box<dyn GraphNode>);
        seed!("prewarp", || Box::new(crate::ops::filters::PrewarpNode::new()) as Box<dyn GraphNode>);
        seed!("mm1p", || Box::new(crate::ops::filters::Mm1pNode::new()) as Box<dyn GraphNode>);
        seed!("svf", || Box::new(crate::ops::filters::SvfNode::new()) as Box<dyn GraphNode>);
        seed!("svfshelf", || Box::new(crate::ops::filters::SvfShelfNode::new()) as Box<dyn GraphNode>);

        seed!("delay", || Box::new(crate::ops::delay::DelayNode::new()) as Box<dyn GraphNode>);
        seed!("sdelay", || Box::new(crate::ops::delay::SDelayNode::new()) as Box<dyn GraphNode>);

        seed!("tapIn", || Box::new(crate::ops::tap::TapInNode::new()) as Box<dyn GraphNode>);
        seed!("tapOut", || Box::new(crate::ops::tap::TapOutNode::new()) as Box<dyn GraphNode>);

        seed!("meter", || Box::new(crate::ops::analyzers::MeterNode::new()) as Box<dyn GraphNode>);
        seed!("scope", || Box::new(crate::ops::analyzers::ScopeNode::new(512)) as Box<dyn GraphNode>);
        seed!("fft", || Box::new(crate::ops::analyzers::FftNode::new(1024)) as Box<dyn GraphNode>);
        seed!("capture", || Box::new(crate::ops::analyzers::CaptureNode::new()) as Box<dyn GraphNode>);

        seed!("root", || Box::new(crate::ops::root::RootNode::new()) as Box<dyn GraphNode>);
    }
}

const MATH_OPS: &[MathOp] = &[
    MathOp::Add,
    MathOp::Sub,
    MathOp::Mul,
    MathOp::Div,
    MathOp::Mod,
    MathOp::Min,
    MathOp::Max,
    MathOp::Pow,
    MathOp::Eq,
    MathOp::Le,
    MathOp::Leq,
    MathOp::Ge,
    MathOp::Geq,
    MathOp::And,
    MathOp::Or,
    MathOp::Sin,
    MathOp::Cos,
    MathOp::Tan,
    MathOp::Tanh,
    MathOp::Asinh,
    MathOp::Ln,
    MathOp::Log,
    MathOp::Log2,
    MathOp::Ceil,
    MathOp::Floor,
    MathOp::Round,
    MathOp::Sqrt,
    MathOp::Exp,
    MathOp::Abs,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_built_in_kind_constructs_successfully() {
        let registry = NodeRegistry::new();
        for kind in ["const", "cycle", "add", "svf", "root", "delay", "tapIn", "fft"] {
            assert!(registry.create(kind).is_ok(), "failed to construct {kind}");
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let registry = NodeRegistry::new();
        match registry.create("nonexistent") {
            Err(e) => assert_eq!(e, ErrorCode::UnknownKind),
            Ok(_) => panic!("expected UnknownKind error"),
        }
    }

    #[test]
    fn re_registering_a_kind_is_rejected() {
        let mut registry = NodeRegistry::new();
        let result = registry.register("const", Box::new(|| Box::new(crate::ops::const_node::ConstNode::new()) as Box<dyn GraphNode>));
        assert_eq!(result.unwrap_err(), ErrorCode::KindAlreadyRegistered);
    }
}
