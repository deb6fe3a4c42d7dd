//! `rand`: a seedable linear-congruential noise source (spec §4.3).

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

const LCG_MUL: u64 = 6_364_136_223_846_793_005;
const LCG_INC: u64 = 1_442_695_040_888_963_407;

pub struct RandNode {
    state: u64,
    props: PropertyMap,
}
impl RandNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        let seed = fastrand::u64(..);
        props.set("seed", Value::Number(seed as f64));
        Self { state: seed, props }
    }

    fn next(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
        // Top 24 bits give a uniform, well-mixed mantissa.
        let bits = (self.state >> 40) as u32;
        (bits as f32 / (1u32 << 24) as f32) * 2.0 - 1.0
    }
}
impl GraphNode for RandNode {
    fn kind(&self) -> &'static str {
        "rand"
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "seed" {
            return Ok(());
        }
        let seed = value.as_f64().ok_or(ErrorCode::InvalidPropertyType)?;
        self.state = seed as i64 as u64;
        self.props.set("seed", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, _ctx: &mut NodeContext, _inputs: &[Option<&[f32]>], output: &mut [f32]) {
        for out in output.iter_mut() {
            *out = self.next();
        }
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_the_same_sequence() {
        let mut a = RandNode::new();
        let mut b = RandNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 8,
            resources: &resources,
        };
        a.set_property(&pctx, "seed", &Value::Number(42.0)).unwrap();
        b.set_property(&pctx, "seed", &Value::Number(42.0)).unwrap();
        let mut logger = crate::log::RtLogSender::non_rt();
        let mut tap = crate::resource::TapBus::new();
        let mut ctx1 = NodeContext::new(48_000, 8, 0, &mut logger, &mut tap);
        let mut out_a = vec![0.0; 8];
        a.process(&mut ctx1, &[], &mut out_a);
        let mut logger2 = crate::log::RtLogSender::non_rt();
        let mut tap2 = crate::resource::TapBus::new();
        let mut ctx2 = NodeContext::new(48_000, 8, 0, &mut logger2, &mut tap2);
        let mut out_b = vec![0.0; 8];
        b.process(&mut ctx2, &[], &mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut node = RandNode::new();
        let mut logger = crate::log::RtLogSender::non_rt();
        let mut tap = crate::resource::TapBus::new();
        let mut ctx = NodeContext::new(48_000, 64, 0, &mut logger, &mut tap);
        let mut out = vec![0.0; 64];
        node.process(&mut ctx, &[], &mut out);
        for s in out {
            assert!((-1.0..=1.0).contains(&s));
        }
    }
}
