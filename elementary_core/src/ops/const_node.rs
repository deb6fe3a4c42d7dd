//! `const`: emits a constant block (spec §4.3). The value is a plain `f32`
//! field mutated only by `set_property` on the control thread; the audio
//! thread only ever reads it through `process`, so no atomic is required —
//! unlike knaster's audio-rate parameters, `const` has no audio-rate input
//! of its own to race against.

use elementary_primitives::Value;

use crate::error::ErrorCode;
use crate::node::{Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

pub struct ConstNode {
    value: f32,
    props: PropertyMap,
}
impl ConstNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("value", Value::Number(0.0));
        Self { value: 0.0, props }
    }
}
impl GraphNode for ConstNode {
    fn kind(&self) -> &'static str {
        "const"
    }

    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "value" {
            return Ok(());
        }
        let v = value.as_f32().ok_or(ErrorCode::InvalidPropertyType)?;
        self.value = v;
        self.props.set("value", value.clone());
        Ok(())
    }

    fn properties(&self) -> &PropertyMap {
        &self.props
    }

    fn process(&mut self, _ctx: &mut NodeContext, _inputs: &[Option<&[f32]>], output: &mut [f32]) {
        output.fill(self.value);
    }

    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_constant_block() {
        let mut node = ConstNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 4,
            resources: &resources,
        };
        node.set_property(&pctx, "value", &Value::Number(0.3)).unwrap();
        let mut logger = crate::log::RtLogSender::non_rt();
        let mut tap = crate::resource::TapBus::new();
        let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut tap);
        let mut out = vec![0.0; 4];
        node.process(&mut ctx, &[], &mut out);
        assert_eq!(out, vec![0.3; 4]);
    }
}
