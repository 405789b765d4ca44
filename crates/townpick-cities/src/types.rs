use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A city produced by a search or a reverse lookup.
///
/// Two cities are the same place when their coordinates match; the name is
/// only for display (several towns share a name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundCity {
    pub name: String,
    /// ISO 3166-1 alpha-2 code, or a display name when the source had no code
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl FoundCity {
    pub fn new(
        name: impl Into<String>,
        country: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            latitude,
            longitude,
        }
    }
}

/// A city persisted in the saved cities store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCity {
    /// Store-assigned id; increases with insertion order
    pub id: i64,
    pub city: FoundCity,
    /// True for the single "current device location" entry
    pub is_geolocation: bool,
    pub saved_at: DateTime<Utc>,
}

impl SavedCity {
    pub fn latitude(&self) -> f64 {
        self.city.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.city.longitude
    }
}

/// Device coordinates returned by a position provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Coarse failure classification reported by a position provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Position request timed out")]
    Timeout,
    #[error("Position error: {0}")]
    Other(String),
}

/// Remote city search errors. Never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(#[from] townpick_core::NetworkError),
    #[error("Search timed out after {0} ms")]
    Timeout(u64),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Reverse geocoding errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(#[from] townpick_core::NetworkError),
    #[error("No place found at {latitude}, {longitude}")]
    NotFound { latitude: f64, longitude: f64 },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Geolocation resolution errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
    #[error("Reverse lookup failed: {0}")]
    ReverseLookup(#[from] GeocodeError),
    /// A newer resolution was started while this one was in flight
    #[error("Location request superseded")]
    Superseded,
}

impl From<PositionError> for LocationError {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::PermissionDenied => Self::PermissionDenied,
            PositionError::PositionUnavailable => Self::PositionUnavailable,
            PositionError::Timeout => Self::Timeout,
            PositionError::Other(msg) => Self::Other(msg),
        }
    }
}

/// Saved cities store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] townpick_core::DatabaseError),
    #[error("Storage task failed: {0}")]
    Task(String),
}
