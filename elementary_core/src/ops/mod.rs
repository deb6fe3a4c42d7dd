//! The elementary operator set (spec §4.3–§4.7): one [`crate::node::GraphNode`]
//! implementation per node kind, grouped by family the way `knaster_core_dsp`
//! groups its ugens into `ugens::{math, env, filter, ...}` modules.

pub mod analyzers;
pub mod const_node;
pub mod delay;
pub mod filters;
pub mod gate;
pub mod math;
pub mod noise;
pub mod osc;
pub mod pitch;
pub mod root;
pub mod sample;
pub mod seq;
pub mod sparseq;
pub mod tap;
pub mod time;
