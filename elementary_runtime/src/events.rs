//! Event readout plumbing for `Runtime::process_events` (spec §6.2, §6.3).

use elementary_core::Event;

/// A drained analyzer event plus the node id that produced it, matching the
/// `source`/`data` shape spec §6.3 requires of every event payload.
pub fn with_source(node_id: elementary_core::NodeId, mut event: Event) -> Event {
    event.source = Some(elementary_primitives::Name::from(elementary_core::format_node_id(node_id).as_str()));
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use elementary_primitives::Value;

    #[test]
    fn stamps_the_producing_node_id_as_source() {
        let event = Event { kind: elementary_primitives::Name::from("meter"), source: None, data: Value::Null };
        let stamped = with_source(7, event);
        assert_eq!(stamped.source.unwrap(), "00000007");
    }
}
