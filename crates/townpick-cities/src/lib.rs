//! City selection for Townpick
//!
//! City search and reverse geocoding via Nominatim, device geolocation,
//! the popular cities catalog and a SQLite store of saved cities.

pub mod catalog;
pub mod error_mapping;
pub mod geocode;
pub mod geolocation;
pub mod location;
pub mod provider;
pub mod reconcile;
pub mod search;
pub mod session;
pub mod store;
pub mod types;

pub use catalog::{filter_cities_by_query, popular_cities, readable_country};
pub use geocode::NominatimClient;
pub use geolocation::{FailureKind, GeolocationResolver, ResolverState};
pub use location::{CallbackPosition, PositionCallback, SystemPositionProvider};
pub use provider::{CitySearch, PositionProvider, ReverseGeocoder};
pub use reconcile::{exclude_saved, is_duplicate_save, CoordinateMatch};
pub use search::{Delivery, SearchController, SearchSettings, Submitted};
pub use session::{Outcome, Services, SessionSettings, TownSelectSession};
pub use store::{CityStore, SavedCitiesStore, SqliteCityStore, GEOLOCATION_ID};
pub use types::*;
