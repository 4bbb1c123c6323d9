//! Inbound side of the serial link: decode, classify, cache, fan out.
//!
//! The device reader lives in `infrastructure::serial`; this type holds
//! the per-line logic so it can be driven directly from tests.

use std::sync::Arc;

use parking_lot::Mutex;
use preamp_core::protocol::serial_line::decode_line;
use preamp_core::{classify_line, LineKind};
use tracing::debug;

use crate::application::broadcast::BroadcastHub;
use crate::domain::LineCache;

/// Routes lines from the controller to the cache and to every session.
#[derive(Clone)]
pub struct SerialBridge {
    hub: Arc<BroadcastHub>,
    cache: Arc<Mutex<LineCache>>,
}

impl SerialBridge {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self {
            hub,
            cache: Arc::new(Mutex::new(LineCache::new())),
        }
    }

    /// Handles one raw line as read from the device, terminator included.
    ///
    /// Returns the line's kind, or `None` if it was blank.
    pub fn ingest(&self, raw: &[u8]) -> Option<LineKind> {
        let line = decode_line(raw);
        if line.is_empty() {
            return None;
        }

        let kind = classify_line(&line);
        self.cache.lock().record(kind, &line);
        debug!("UART <- {line}");
        self.hub.broadcast(&line);
        Some(kind)
    }

    /// The cached lines a newly joined session receives first.
    pub fn replay_lines(&self) -> Vec<String> {
        self.cache.lock().replay()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::broadcast::{DeliveryError, LineSink};
    use preamp_core::protocol::serial_line::BAD_VALUE_LINE;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl LineSink for RecordingSink {
        fn deliver(&self, line: &str) -> Result<(), DeliveryError> {
            self.lines.lock().push(line.to_string());
            Ok(())
        }
    }

    fn bridge_with_sink() -> (SerialBridge, Arc<RecordingSink>) {
        let hub = Arc::new(BroadcastHub::new());
        let sink = Arc::new(RecordingSink::default());
        hub.register(Uuid::new_v4(), sink.clone());
        (SerialBridge::new(hub), sink)
    }

    #[test]
    fn test_state_line_is_cached_and_broadcast() {
        // Arrange
        let (bridge, sink) = bridge_with_sink();

        // Act
        let kind = bridge.ingest(b"STATE VOL=10 MUTE=0\r\n");

        // Assert
        assert_eq!(kind, Some(LineKind::State));
        assert_eq!(*sink.lines.lock(), vec!["STATE VOL=10 MUTE=0"]);
        assert_eq!(bridge.replay_lines(), vec!["STATE VOL=10 MUTE=0"]);
    }

    #[test]
    fn test_other_lines_are_broadcast_but_not_cached() {
        let (bridge, sink) = bridge_with_sink();

        let kind = bridge.ingest(b"OK VOL\n");

        assert_eq!(kind, Some(LineKind::Other));
        assert_eq!(*sink.lines.lock(), vec!["OK VOL"]);
        assert!(bridge.replay_lines().is_empty());
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let (bridge, sink) = bridge_with_sink();

        assert_eq!(bridge.ingest(b"\r\n"), None);
        assert!(sink.lines.lock().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_delivered_as_bad_value() {
        let (bridge, sink) = bridge_with_sink();

        let kind = bridge.ingest(&[b'S', 0xC3, 0x28, b'\n']);

        assert_eq!(kind, Some(LineKind::Other));
        assert_eq!(*sink.lines.lock(), vec![BAD_VALUE_LINE]);
    }

    #[test]
    fn test_replay_after_labels_and_state() {
        let (bridge, _sink) = bridge_with_sink();

        bridge.ingest(b"STATE INP=1\n");
        bridge.ingest(b"SELECTOR_LABELS INP1=\"CD\"\n");

        assert_eq!(
            bridge.replay_lines(),
            vec!["SELECTOR_LABELS INP1=\"CD\"", "STATE INP=1"]
        );
    }
}
