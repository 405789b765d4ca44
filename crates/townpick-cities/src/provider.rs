//! Collaborator interfaces the resolution core depends on.
//!
//! Remote lookups and the device position source are injected so the
//! controllers can be driven by the Nominatim client in production and by
//! scripted fakes in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{FoundCity, GeocodeError, LocationFix, PositionError, SearchError};

/// Free-text city search.
#[async_trait]
pub trait CitySearch: Send + Sync {
    async fn search(&self, query: &str, locale: &str) -> Result<Vec<FoundCity>, SearchError>;
}

/// Coordinates to city translation.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_lookup(
        &self,
        latitude: f64,
        longitude: f64,
        locale: &str,
    ) -> Result<FoundCity, GeocodeError>;
}

/// Source of the device position.
///
/// `timeout` is passed through to the platform; callers still enforce their
/// own hard bound around the call.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(&self, timeout: Duration) -> Result<LocationFix, PositionError>;
}
