//! Log sinks the resize engine writes through.

use super::Level;

/// Destination for engine log events.
///
/// The background worker owns a clone of the sink, so implementations must
/// be shareable across threads.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: Level, code: &str, message: &str, data: Option<serde_json::Value>);

    fn debug(&self, code: &str, message: &str) {
        self.emit(Level::Debug, code, message, None);
    }

    fn warn(&self, code: &str, message: &str) {
        self.emit(Level::Warn, code, message, None);
    }
}

/// Forwards events to the process-wide renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl LogSink for Console {
    fn emit(&self, level: Level, code: &str, message: &str, data: Option<serde_json::Value>) {
        super::emit(level, code, message, data);
    }
}
