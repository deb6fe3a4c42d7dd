//! Lock-free logging from the audio thread, mirroring
//! `knaster_core::log::{ArLogSender, ArLogReceiver, rt_log!}`.
//!
//! `process` may not allocate or call the OS, so diagnostics raised while
//! running a render sequence are pushed as small `Copy` messages onto an
//! SPSC channel and drained from the control thread. Control-thread code
//! (the reconciler, the resource map) logs directly through the `log` crate
//! facade instead.

use elementary_primitives::{SpscConsumer, SpscProducer, SpscQueue};

/// A single log message sent from the audio thread, requiring no allocation.
#[derive(Debug, Clone, Copy)]
pub enum RtLogMessage {
    Str(&'static str),
    Float(f64),
    Int(i64),
    NodeId(i32),
    End,
}
impl RtLogMessage {
    pub fn is_end(&self) -> bool {
        matches!(self, RtLogMessage::End)
    }
}
impl From<&'static str> for RtLogMessage {
    fn from(v: &'static str) -> Self {
        RtLogMessage::Str(v)
    }
}
impl From<f64> for RtLogMessage {
    fn from(v: f64) -> Self {
        RtLogMessage::Float(v)
    }
}
impl From<f32> for RtLogMessage {
    fn from(v: f32) -> Self {
        RtLogMessage::Float(v as f64)
    }
}
impl From<i64> for RtLogMessage {
    fn from(v: i64) -> Self {
        RtLogMessage::Int(v)
    }
}
impl From<i32> for RtLogMessage {
    fn from(v: i32) -> Self {
        RtLogMessage::Int(v as i64)
    }
}
impl From<usize> for RtLogMessage {
    fn from(v: usize) -> Self {
        RtLogMessage::Int(v as i64)
    }
}

/// The audio-thread half of the log channel. Stored in [`crate::node::NodeContext`].
pub enum RtLogSender {
    Channel(SpscProducer<RtLogMessage>),
    /// Fallback used off the audio thread (tests, non-realtime processing):
    /// logs via the `log` crate facade instead of a channel.
    Log,
}
impl RtLogSender {
    pub fn non_rt() -> Self {
        RtLogSender::Log
    }
    pub fn send(&mut self, msg: RtLogMessage) {
        match self {
            RtLogSender::Channel(p) => {
                let _ = p.push(msg);
            }
            RtLogSender::Log => log::warn!("{msg:?}"),
        }
    }
}

/// The control-thread half: drains chains of [`RtLogMessage`] terminated by `End`.
pub struct RtLogReceiver(SpscConsumer<RtLogMessage>);
impl RtLogReceiver {
    pub fn channel(capacity: usize) -> (RtLogSender, RtLogReceiver) {
        let (p, c) = SpscQueue::new(capacity);
        (RtLogSender::Channel(p), RtLogReceiver(c))
    }

    /// Call `handler` once per complete message chain (a run up to and
    /// including an `End` marker).
    pub fn recv(&mut self, mut handler: impl FnMut(&[RtLogMessage])) {
        let mut chain = Vec::new();
        while let Some(msg) = self.0.pop() {
            let is_end = msg.is_end();
            chain.push(msg);
            if is_end {
                handler(&chain);
                chain.clear();
            }
        }
    }
}

/// Push a chain of [`RtLogMessage`]s through an [`RtLogSender`], terminated
/// with `End`. Mirrors `knaster_core::rt_log!`.
#[macro_export]
macro_rules! rt_log {
    ($sender:expr; $($msg:expr),* $(,)?) => {{
        $(
            $sender.send($crate::log::RtLogMessage::from($msg));
        )*
        $sender.send($crate::log::RtLogMessage::End);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_round_trips_through_the_channel() {
        let (mut tx, mut rx) = RtLogReceiver::channel(16);
        rt_log!(tx; "clamped gain", 0.5_f64, 3_i32);
        let mut seen = 0;
        rx.recv(|chain| {
            seen += 1;
            assert!(chain.last().unwrap().is_end());
            assert_eq!(chain.len(), 4);
        });
        assert_eq!(seen, 1);
    }
}
