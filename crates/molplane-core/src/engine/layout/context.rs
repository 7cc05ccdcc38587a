use crate::engine::cancellation::CancellationHandler;
use crate::engine::config::LayoutConfig;
use crate::engine::error::LayoutError;

/// Read-only inputs shared by every layout phase.
pub struct LayoutContext<'a> {
    pub config: &'a LayoutConfig,
    pub cancellation: Option<&'a dyn CancellationHandler>,
}

impl<'a> LayoutContext<'a> {
    pub fn new(config: &'a LayoutConfig, cancellation: Option<&'a dyn CancellationHandler>) -> Self {
        Self {
            config,
            cancellation,
        }
    }

    /// Fails with [`LayoutError::Cancelled`] once the handler asks to stop.
    pub fn check_cancelled(&self) -> Result<(), LayoutError> {
        match self.cancellation {
            Some(handler) if handler.is_cancelled() => Err(LayoutError::Cancelled {
                reason: handler.reason(),
            }),
            _ => Ok(()),
        }
    }
}
