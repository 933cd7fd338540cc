use std::fmt;
use tracing::subscriber::NoSubscriber;
use tracing::Dispatch;

/// Per-component log sink.
///
/// Components log through `tracing` macros wrapped in [`Logger::scope`].
/// The default logger forwards to whatever subscriber is current; a
/// structured logger pins a specific [`Dispatch`]; the discard logger
/// routes events to a no-op subscriber.
#[derive(Clone, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    pub fn structured(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    pub fn discard() -> Self {
        Self::structured(Dispatch::new(NoSubscriber::default()))
    }

    /// `None` falls back to discarding, matching how setters treat a
    /// missing logger.
    pub fn or_discard(logger: Option<Logger>) -> Self {
        logger.unwrap_or_else(Self::discard)
    }

    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("pinned", &self.dispatch.is_some())
            .finish()
    }
}
