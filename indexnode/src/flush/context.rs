use std::fmt;
use std::sync::Arc;

use utils::serial::SerialNum;

use super::handler::FlushHandler;
use super::target::FlushTarget;

/// One (handler, target) candidate for flushing.
///
/// Besides the pairing itself, the context captures the handler's last
/// assigned serial number as of when the candidate set was collected, so a
/// whole selection pass works on one consistent snapshot.
#[derive(Clone)]
pub struct FlushContext {
    handler: Arc<dyn FlushHandler>,
    target: Arc<dyn FlushTarget>,
    last_serial: SerialNum,
}

impl FlushContext {
    pub fn new(
        handler: Arc<dyn FlushHandler>,
        target: Arc<dyn FlushTarget>,
        last_serial: SerialNum,
    ) -> FlushContext {
        FlushContext {
            handler,
            target,
            last_serial,
        }
    }

    pub fn handler(&self) -> &Arc<dyn FlushHandler> {
        &self.handler
    }

    pub fn target(&self) -> &Arc<dyn FlushTarget> {
        &self.target
    }

    pub fn last_serial(&self) -> SerialNum {
        self.last_serial
    }

    /// "handler.target", the name used in log messages.
    pub fn name(&self) -> String {
        format!("{}.{}", self.handler.name(), self.target.name())
    }
}

impl fmt::Debug for FlushContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushContext")
            .field("name", &self.name())
            .field("last_serial", &self.last_serial)
            .finish()
    }
}
