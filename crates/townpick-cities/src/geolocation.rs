//! Geolocation resolver: device position to city, bounded by a hard timeout.
//!
//! State machine: `Idle -> Locating -> (Resolving | Failed) -> Idle`.
//! Starting a new resolution supersedes the one in flight; the superseded
//! call returns `LocationError::Superseded` and leaves the state alone.
//! Dropping an unfinished `resolve` future returns the state to `Idle`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::provider::{PositionProvider, ReverseGeocoder};
use crate::types::{FoundCity, LocationError};

/// Why the last resolution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Other,
    ReverseLookup,
}

impl LocationError {
    /// Classification stored in `ResolverState::Failed`.
    pub fn kind(&self) -> FailureKind {
        match self {
            LocationError::PermissionDenied => FailureKind::PermissionDenied,
            LocationError::PositionUnavailable => FailureKind::PositionUnavailable,
            LocationError::Timeout => FailureKind::Timeout,
            LocationError::ReverseLookup(_) => FailureKind::ReverseLookup,
            LocationError::Other(_) | LocationError::Superseded => FailureKind::Other,
        }
    }
}

/// Resolver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverState {
    #[default]
    Idle,
    Locating,
    Resolving,
    Failed(FailureKind),
}

impl ResolverState {
    /// True while a position fix or reverse lookup is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, ResolverState::Locating | ResolverState::Resolving)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: ResolverState,
    /// Incremented by every `resolve`; only the latest attempt may write state
    attempt: u64,
}

/// Resets a still-busy attempt to `Idle` when its `resolve` future is dropped.
struct AttemptGuard<'a> {
    inner: &'a Mutex<Inner>,
    attempt: u64,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.attempt == self.attempt && inner.state.is_busy() {
            tracing::debug!("Geolocation attempt {} abandoned by caller", self.attempt);
            inner.state = ResolverState::Idle;
        }
    }
}

pub struct GeolocationResolver {
    positions: Arc<dyn PositionProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    locale: String,
    inner: Mutex<Inner>,
}

impl GeolocationResolver {
    pub fn new(
        positions: Arc<dyn PositionProvider>,
        geocoder: Arc<dyn ReverseGeocoder>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            positions,
            geocoder,
            locale: locale.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.inner.lock().state
    }

    /// Returns a failed resolver to `Idle`.
    pub fn dismiss(&self) {
        let mut inner = self.inner.lock();
        if matches!(inner.state, ResolverState::Failed(_)) {
            inner.state = ResolverState::Idle;
        }
    }

    /// Finds the device position and translates it to a city.
    ///
    /// `timeout` bounds the position acquisition; a fix arriving later is
    /// dropped.
    pub async fn resolve(&self, timeout: Duration) -> Result<FoundCity, LocationError> {
        let attempt = {
            let mut inner = self.inner.lock();
            if inner.state.is_busy() {
                tracing::info!("Superseding geolocation attempt {}", inner.attempt);
            }
            inner.attempt += 1;
            inner.state = ResolverState::Locating;
            inner.attempt
        };
        let _guard = AttemptGuard {
            inner: &self.inner,
            attempt,
        };

        let acquisition = self.positions.current_position(timeout);
        let fix = match tokio::time::timeout(timeout, acquisition).await {
            Ok(Ok(fix)) => fix,
            Ok(Err(e)) => return self.fail(attempt, e.into()),
            Err(_) => return self.fail(attempt, LocationError::Timeout),
        };

        if !self.transition(attempt, ResolverState::Resolving) {
            return Err(LocationError::Superseded);
        }
        tracing::info!("Got location: {}, {}", fix.latitude, fix.longitude);

        match self
            .geocoder
            .reverse_lookup(fix.latitude, fix.longitude, &self.locale)
            .await
        {
            Ok(city) => {
                if !self.transition(attempt, ResolverState::Idle) {
                    return Err(LocationError::Superseded);
                }
                Ok(city)
            }
            Err(e) => self.fail(attempt, LocationError::ReverseLookup(e)),
        }
    }

    /// Moves to `next` if `attempt` is still the latest one.
    fn transition(&self, attempt: u64, next: ResolverState) -> bool {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt {
            tracing::debug!("Ignoring completion of superseded geolocation attempt {}", attempt);
            return false;
        }
        inner.state = next;
        true
    }

    fn fail(&self, attempt: u64, error: LocationError) -> Result<FoundCity, LocationError> {
        if !self.transition(attempt, ResolverState::Failed(error.kind())) {
            return Err(LocationError::Superseded);
        }
        match &error {
            LocationError::ReverseLookup(e) => {
                tracing::error!("Unable to get city from coords: {}", e)
            }
            other => tracing::warn!("Unable to get location: {}", other),
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{CallbackPosition, PositionCallback};
    use crate::types::{GeocodeError, LocationFix, PositionError};
    use async_trait::async_trait;

    /// Names the city after the coordinates it was asked about.
    #[derive(Default)]
    struct CoordsGeocoder {
        calls: Mutex<Vec<(f64, f64)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReverseGeocoder for CoordsGeocoder {
        async fn reverse_lookup(
            &self,
            latitude: f64,
            longitude: f64,
            _locale: &str,
        ) -> Result<FoundCity, GeocodeError> {
            self.calls.lock().push((latitude, longitude));
            if self.fail {
                return Err(GeocodeError::NotFound {
                    latitude,
                    longitude,
                });
            }
            Ok(FoundCity::new(
                format!("{latitude},{longitude}"),
                "XX",
                latitude,
                longitude,
            ))
        }
    }

    type Pending = Arc<Mutex<Vec<PositionCallback>>>;

    /// Position source whose callbacks are completed by the test.
    fn parked_positions() -> (Arc<dyn PositionProvider>, Pending) {
        let pending: Pending = Arc::default();
        let slot = Arc::clone(&pending);
        let provider = CallbackPosition::new(move |done: PositionCallback, _timeout| {
            slot.lock().push(done);
        });
        (Arc::new(provider), pending)
    }

    fn immediate(result: Result<LocationFix, PositionError>) -> Arc<dyn PositionProvider> {
        Arc::new(CallbackPosition::new(move |done: PositionCallback, _timeout| {
            match result.clone() {
                Ok(fix) => done.success(fix),
                Err(e) => done.failure(e),
            };
        }))
    }

    fn fix(latitude: f64, longitude: f64) -> LocationFix {
        LocationFix {
            latitude,
            longitude,
            accuracy_meters: None,
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(15);

    #[tokio::test]
    async fn test_resolves_city_and_returns_to_idle() {
        let geocoder = Arc::new(CoordsGeocoder::default());
        let resolver =
            GeolocationResolver::new(immediate(Ok(fix(59.93, 30.31))), geocoder.clone(), "en");

        let city = resolver.resolve(TIMEOUT).await.unwrap();
        assert_eq!(city.latitude, 59.93);
        assert_eq!(city.longitude, 30.31);
        assert_eq!(resolver.state(), ResolverState::Idle);
        assert_eq!(geocoder.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_is_classified() {
        let geocoder = Arc::new(CoordsGeocoder::default());
        let resolver = GeolocationResolver::new(
            immediate(Err(PositionError::PermissionDenied)),
            geocoder.clone(),
            "en",
        );

        let err = resolver.resolve(TIMEOUT).await.unwrap_err();
        assert!(matches!(err, LocationError::PermissionDenied));
        assert_eq!(
            resolver.state(),
            ResolverState::Failed(FailureKind::PermissionDenied)
        );
        assert!(geocoder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_position_unavailable_is_classified() {
        let resolver = GeolocationResolver::new(
            immediate(Err(PositionError::PositionUnavailable)),
            Arc::new(CoordsGeocoder::default()),
            "en",
        );
        let err = resolver.resolve(TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::PositionUnavailable);
    }

    #[tokio::test]
    async fn test_reverse_lookup_failure() {
        let geocoder = Arc::new(CoordsGeocoder {
            fail: true,
            ..CoordsGeocoder::default()
        });
        let resolver = GeolocationResolver::new(immediate(Ok(fix(1.0, 2.0))), geocoder, "en");

        let err = resolver.resolve(TIMEOUT).await.unwrap_err();
        assert!(matches!(err, LocationError::ReverseLookup(_)));
        assert_eq!(
            resolver.state(),
            ResolverState::Failed(FailureKind::ReverseLookup)
        );

        resolver.dismiss();
        assert_eq!(resolver.state(), ResolverState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_ignores_late_position() {
        let (positions, pending) = parked_positions();
        let geocoder = Arc::new(CoordsGeocoder::default());
        let resolver = GeolocationResolver::new(positions, geocoder.clone(), "en");

        let err = resolver.resolve(TIMEOUT).await.unwrap_err();
        assert!(matches!(err, LocationError::Timeout));
        assert_eq!(resolver.state(), ResolverState::Failed(FailureKind::Timeout));

        let late = pending.lock().pop().unwrap();
        assert!(late.is_abandoned());
        assert!(!late.success(fix(1.0, 2.0)));

        tokio::task::yield_now().await;
        assert_eq!(resolver.state(), ResolverState::Failed(FailureKind::Timeout));
        assert!(geocoder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_new_resolve_supersedes_previous() {
        let (positions, pending) = parked_positions();
        let geocoder = Arc::new(CoordsGeocoder::default());
        let resolver = Arc::new(GeolocationResolver::new(positions, geocoder.clone(), "en"));

        let first = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move { resolver.resolve(TIMEOUT).await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move { resolver.resolve(TIMEOUT).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(resolver.state(), ResolverState::Locating);

        let mut callbacks: Vec<_> = pending.lock().drain(..).collect();
        assert_eq!(callbacks.len(), 2);
        let stale = callbacks.remove(0);
        let latest = callbacks.remove(0);

        latest.success(fix(30.0, 40.0));
        let city = second.await.unwrap().unwrap();
        assert_eq!((city.latitude, city.longitude), (30.0, 40.0));

        stale.success(fix(10.0, 20.0));
        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, LocationError::Superseded));

        assert_eq!(resolver.state(), ResolverState::Idle);
        assert_eq!(geocoder.calls.lock().as_slice(), [(30.0, 40.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_resolve_returns_to_idle() {
        let (positions, pending) = parked_positions();
        let geocoder = Arc::new(CoordsGeocoder::default());
        let resolver = GeolocationResolver::new(positions, geocoder.clone(), "en");

        let outer = tokio::time::timeout(Duration::from_millis(10), resolver.resolve(TIMEOUT)).await;
        assert!(outer.is_err());
        assert_eq!(resolver.state(), ResolverState::Idle);

        let abandoned = pending.lock().pop().unwrap();
        assert!(abandoned.is_abandoned());
        assert!(!abandoned.success(fix(1.0, 2.0)));
        assert!(geocoder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_superseded_resolve_keeps_latest_state() {
        let (positions, pending) = parked_positions();
        let resolver = Arc::new(GeolocationResolver::new(
            positions,
            Arc::new(CoordsGeocoder::default()),
            "en",
        ));

        let first = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move { resolver.resolve(TIMEOUT).await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move { resolver.resolve(TIMEOUT).await }
        });
        tokio::task::yield_now().await;

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(resolver.state(), ResolverState::Locating);

        let latest = pending.lock().pop().unwrap();
        latest.success(fix(5.0, 6.0));
        assert!(second.await.unwrap().is_ok());
        assert_eq!(resolver.state(), ResolverState::Idle);
    }

    #[test]
    fn test_busy_states() {
        assert!(!ResolverState::Idle.is_busy());
        assert!(ResolverState::Locating.is_busy());
        assert!(ResolverState::Resolving.is_busy());
        assert!(!ResolverState::Failed(FailureKind::Other).is_busy());
    }
}
