//! Device position sources.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::provider::PositionProvider;
use crate::types::{LocationFix, PositionError};
use townpick_core::ManualPosition;

/// Position source for desktops: reports the configured manual position,
/// or `PositionUnavailable` when none is set.
#[derive(Debug, Clone, Default)]
pub struct SystemPositionProvider {
    manual: Option<ManualPosition>,
}

impl SystemPositionProvider {
    pub fn new(manual: Option<ManualPosition>) -> Self {
        Self { manual }
    }

    pub fn is_available(&self) -> bool {
        self.manual.is_some()
    }
}

#[async_trait]
impl PositionProvider for SystemPositionProvider {
    async fn current_position(&self, _timeout: Duration) -> Result<LocationFix, PositionError> {
        match self.manual {
            Some(position) => Ok(LocationFix {
                latitude: position.latitude,
                longitude: position.longitude,
                accuracy_meters: None,
            }),
            None => Err(PositionError::PositionUnavailable),
        }
    }
}

/// One-shot completion handle handed to a callback-style position source.
///
/// Exactly one of `success`/`failure` can be called. Both return `false` when
/// the request was already abandoned (timed out or superseded), in which case
/// the result goes nowhere.
#[derive(Debug)]
pub struct PositionCallback {
    tx: oneshot::Sender<Result<LocationFix, PositionError>>,
}

impl PositionCallback {
    pub fn success(self, fix: LocationFix) -> bool {
        self.tx.send(Ok(fix)).is_ok()
    }

    pub fn failure(self, error: PositionError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// True once the waiting side has gone away.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Adapts a `get_current_position(on_done, timeout)` style API to `PositionProvider`.
pub struct CallbackPosition<F> {
    start: F,
}

impl<F> CallbackPosition<F>
where
    F: Fn(PositionCallback, Duration) + Send + Sync,
{
    pub fn new(start: F) -> Self {
        Self { start }
    }
}

#[async_trait]
impl<F> PositionProvider for CallbackPosition<F>
where
    F: Fn(PositionCallback, Duration) + Send + Sync,
{
    async fn current_position(&self, timeout: Duration) -> Result<LocationFix, PositionError> {
        let (tx, rx) = oneshot::channel();
        (self.start)(PositionCallback { tx }, timeout);

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(PositionError::Other(
                "position source dropped the request".to_string(),
            )),
        }
    }
}
