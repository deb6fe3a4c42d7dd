//! `tapIn`/`tapOut`: the feedback bus pair that lets a graph read its own
//! output from one block ago, keeping the per-block dependency graph acyclic
//! (spec §4.4).

use elementary_primitives::{Name, Value};

use crate::error::ErrorCode;
use crate::node::{input_or_silence, Event, GraphNode, NodeContext, PropertyContext, PropertyMap};

/// `tapIn`: reads the named tap's contents as written by the matching
/// `tapOut` during the *previous* block.
pub struct TapInNode {
    name: Name,
    props: PropertyMap,
}
impl TapInNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("name", Value::String(String::new()));
        Self {
            name: Name::from(""),
            props,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }
}
impl GraphNode for TapInNode {
    fn kind(&self) -> &'static str {
        "tapIn"
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "name" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let name = value.as_str().ok_or(ErrorCode::InvalidPropertyType)?;
        self.name = Name::from(name);
        self.props.set("name", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, _inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let data = ctx.tap_bus.read(&self.name, ctx.block_size);
        output.copy_from_slice(&data[..output.len()]);
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

/// `tapOut(name, x)`: writes input0 into the named tap, making it visible to
/// any `tapIn` of the same name on the *next* block (never the current one).
pub struct TapOutNode {
    name: Name,
    props: PropertyMap,
}
impl TapOutNode {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("name", Value::String(String::new()));
        Self {
            name: Name::from(""),
            props,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }
}
impl GraphNode for TapOutNode {
    fn kind(&self) -> &'static str {
        "tapOut"
    }
    fn min_inputs(&self) -> usize {
        1
    }
    fn set_property(&mut self, _ctx: &PropertyContext, key: &str, value: &Value) -> Result<(), ErrorCode> {
        if key != "name" {
            return Err(ErrorCode::InvalidPropertyValue);
        }
        let name = value.as_str().ok_or(ErrorCode::InvalidPropertyType)?;
        self.name = Name::from(name);
        self.props.set("name", value.clone());
        Ok(())
    }
    fn properties(&self) -> &PropertyMap {
        &self.props
    }
    fn process(&mut self, ctx: &mut NodeContext, inputs: &[Option<&[f32]>], output: &mut [f32]) {
        let silence = vec![0.0f32; ctx.block_size];
        let x = input_or_silence(inputs, 0, &silence);
        ctx.tap_bus.write(&self.name, x);
        output.copy_from_slice(x);
    }
    fn process_events(&mut self, _emit: &mut dyn FnMut(Event)) {}
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_out_is_visible_to_tap_in_one_block_later() {
        let mut tap_out = TapOutNode::new();
        let mut tap_in = TapInNode::new();
        let resources = crate::resource::SharedResourceMap::new();
        let pctx = PropertyContext {
            sample_rate: 48_000,
            block_size: 4,
            resources: &resources,
        };
        tap_out.set_property(&pctx, "name", &Value::String("fb".into())).unwrap();
        tap_in.set_property(&pctx, "name", &Value::String("fb".into())).unwrap();

        let mut logger = crate::log::RtLogSender::non_rt();
        let mut bus = crate::resource::TapBus::new();

        {
            let mut ctx = NodeContext::new(48_000, 4, 0, &mut logger, &mut bus);
            let mut first_in = vec![0.0; 4];
            tap_in.process(&mut ctx, &[], &mut first_in);
            assert_eq!(first_in, vec![0.0; 4]);

            let x = [1.0, 2.0, 3.0, 4.0];
            let mut out = vec![0.0; 4];
            tap_out.process(&mut ctx, &[Some(&x)], &mut out);
        }
        {
            let mut ctx = NodeContext::new(48_000, 4, 4, &mut logger, &mut bus);
            let mut second_in = vec![0.0; 4];
            tap_in.process(&mut ctx, &[], &mut second_in);
            assert_eq!(second_in, vec![1.0, 2.0, 3.0, 4.0]);
        }
    }
}
