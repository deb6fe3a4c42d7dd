//! The arithmetic and transcendental operator family (spec §6.1's arithmetic
//! set), grouped into one generic node the way `knaster_core_dsp::ugens::math`
//! groups `Add`/`Mul`/`Sub`/... behind a single `MathUGen<Op>`; here the
//! dispatch is a runtime `MathOp` enum rather than a type parameter, since
//! operator kind is only known once an instruction names it (spec §4.1).

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

/// Which arithmetic/transcendental function a [`MathNode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Pow,
    Eq,
    Le,
    Leq,
    Ge,
    Geq,
    And,
    Or,
    Sin,
    Cos,
    Tan,
    Tanh,
    Asinh,
    Ln,
    Log,
    Log2,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Exp,
    Abs,
}
impl MathOp {
    /// Binary ops read two positional inputs; unary ops read one.
    pub fn arity(self) -> usize {
        use MathOp::*;
        match self {
            Add | Sub | Mul | Div | Mod | Min | Max | Pow | Eq | Le | Leq | Ge | Geq | And | Or => 2,
            _ => 1,
        }
    }

    pub fn kind_str(self) -> &'static str {
        use MathOp::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Min => "min",
            Max => "max",
            Pow => "pow",
            Eq => "eq",
            Le => "le",
            Leq => "leq",
            Ge => "ge",
            Geq => "geq",
            And => "and",
            Or => "or",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Tanh => "tanh",
            Asinh => "asinh",
            Ln => "ln",
            Log => "log",
            Log2 => "log2",
            Ceil => "ceil",
            Floor => "floor",
            Round => "round",
            Sqrt => "sqrt",
            Exp => "exp",
            Abs => "abs",
        }
    }

    #[inline]
    fn apply_binary(self, a: f32, b: f32) -> f32 {
        use MathOp::*;
        match self {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => a / b,
            Mod => a % b,
            Min => a.min(b),
            Max => a.max(b),
            Pow => a.powf(b),
            Eq => (a == b) as i32 as f32,
            Le => (a < b) as i32 as f32,
            Leq => (a <= b) as i32 as f32,
            Ge => (a > b) as i32 as f32,
            Geq => (a >= b) as i32 as f32,
            And => ((a != 0.0) && (b != 0.0)) as i32 as f32,
            Or => ((a != 0.0) || (b != 0.0)) as i32 as f32,
            _ => unreachable!("unary op dispatched to apply_binary"),
        }
    }

    #[inline]
    fn apply_unary(self, a: f32) -> f32 {
        use MathOp::*;
        match self {
            Sin => a.sin(),
            Cos => a.cos(),
            Tan => a.tan(),
            Tanh => a.tanh(),
            Asinh => a.asinh(),
            Ln => a.ln(),
            Log => a.log10(),
            Log2 => a.log2(),
            Ceil => a.ceil(),
            Floor => a.floor(),
            Round => a.round(),
            Sqrt => a.sqrt(),
            Exp => a.exp(),
            Abs => a.abs(),
            _ => unreachable!("binary op dispatched to apply_unary"),
        }
    }
}

pub struct MathNode {
    op: MathOp,
    props: PropertyMap,
}
impl MathNode {
    pub fn new(op: MathOp) -> Self {
        Self {
            op,
            props: PropertyMap::new(),
        }
    }
}
impl GraphNode for MathNode {
    fn kind(&self) -> &'static str {
        self.op.kind_str()
    }

    fn min_inputs(&self) -> usize {
        self.op.arity()
    }

    fn set_property(&mut self, _ctx: &PropertyContext, _key: &str, _value: &Value) -> Result<(), ErrorCode> {
        Err(ErrorCode::InvalidPropertyValue)
    }

    fn properties(&self) -> &PropertyMap {
        &self.props
    }

    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        if self.op.arity() == 2 {
            let a = input_or_silence(inputs, 0, &silence);
            let b = input_or_silence(inputs, 1, &silence);
            for i in 0..output.len() {
                output[i] = self.op.apply_binary(a[i], b[i]);
            }
        } else {
            let a = input_or_silence(inputs, 0, &silence);
            for i in 0..output.len() {
                output[i] = self.op.apply_unary(a[i]);
            }
        }
    }

    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: MathOp, a: &[f32], b: &[f32]) -> Vec<f32> {
        let mut node = MathNode::new(op);
        let mut logger = crate::log::RtLogSender::non_rt();
        let mut tap = crate::resource::TapBus::new();
        let mut ctx = NodeContext::new(48_000, a.len(), 0, &mut logger, &mut tap);
        let mut out = vec![0.0; a.len()];
        node.process(&mut ctx, &[Some(a), Some(b)], &mut out);
        out
    }

    #[test]
    fn add_sums_elementwise() {
        assert_eq!(run(MathOp::Add, &[1.0, 2.0], &[3.0, 4.0]), vec![4.0, 6.0]);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(run(MathOp::Geq, &[1.0, 0.0], &[0.5, 0.5]), vec![1.0, 0.0]);
    }

    #[test]
    fn missing_second_input_is_silence() {
        let mut node = MathNode::new(MathOp::Add);
        let mut logger = crate::log::RtLogSender::non_rt();
        let mut tap = crate::resource::TapBus::new();
        let mut ctx = NodeContext::new(48_000, 2, 0, &mut logger, &mut tap);
        let mut out = vec![0.0; 2];
        node.process(&mut ctx, &[Some(&[1.0, 2.0])], &mut out);
        assert_eq!(out, vec![1.0, 2.0]);
    }
}
