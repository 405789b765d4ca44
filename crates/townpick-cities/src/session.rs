//! Town selection session.
//!
//! Ties the search controller, the geolocation resolver and the saved cities
//! store together the way the town selection screen uses them. Every failure
//! ends here: either logged, or turned into the single dismissible message.

use std::sync::Arc;
use std::time::Duration;

use townpick_core::{AppError, CitiesConfig};

use crate::catalog::popular_cities;
use crate::geolocation::{GeolocationResolver, ResolverState};
use crate::provider::{CitySearch, PositionProvider, ReverseGeocoder};
use crate::reconcile::{exclude_saved, is_duplicate_save, CoordinateMatch};
use crate::search::{Delivery, SearchController, SearchSettings, Submitted};
use crate::store::SavedCitiesStore;
use crate::types::{FoundCity, LocationError, SavedCity};

/// Settings for a town selection session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub search: SearchSettings,
    pub geolocation_timeout: Duration,
    pub coordinate_match: CoordinateMatch,
}

impl SessionSettings {
    pub fn from_config(config: &CitiesConfig) -> Self {
        Self {
            search: SearchSettings::from_config(config),
            geolocation_timeout: config.geolocation_timeout(),
            coordinate_match: CoordinateMatch::from_tolerance(config.coordinate_tolerance),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&CitiesConfig::default())
    }
}

/// Result of a user action that may finish the town selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A city is saved; the caller can leave the screen
    Done,
    /// Stay on the screen (see `message()` for why)
    Stay,
}

/// The external services a session works with
pub struct Services {
    pub store: Arc<dyn SavedCitiesStore>,
    pub search: Arc<dyn CitySearch>,
    pub positions: Arc<dyn PositionProvider>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

pub struct TownSelectSession {
    store: Arc<dyn SavedCitiesStore>,
    search: SearchController,
    resolver: GeolocationResolver,
    settings: SessionSettings,
    saved: Vec<SavedCity>,
    popular: Vec<FoundCity>,
    message: Option<&'static str>,
}

impl TownSelectSession {
    pub fn new(services: Services, settings: SessionSettings) -> Self {
        let search = SearchController::new(services.search, settings.search.clone());
        let resolver = GeolocationResolver::new(
            services.positions,
            services.geocoder,
            settings.search.locale.clone(),
        );

        Self {
            store: services.store,
            search,
            resolver,
            settings,
            saved: Vec::new(),
            popular: popular_cities(),
            message: None,
        }
    }

    /// Creates a session and loads the saved cities.
    pub async fn open(services: Services, settings: SessionSettings) -> Self {
        let mut session = Self::new(services, settings);
        session.refresh_saved().await;
        session
    }

    pub fn saved(&self) -> &[SavedCity] {
        &self.saved
    }

    /// Popular cities not already saved
    pub fn popular(&self) -> &[FoundCity] {
        &self.popular
    }

    /// Current search results, minus cities already saved
    pub fn found(&self) -> Vec<FoundCity> {
        exclude_saved(self.search.found(), &self.saved, self.settings.coordinate_match)
    }

    /// Text of the search field
    pub fn query(&self) -> &str {
        self.search.query()
    }

    /// Search results replace the popular/saved lists while the field has text.
    pub fn is_searching(&self) -> bool {
        !self.search.query().is_empty()
    }

    pub fn is_finding_location(&self) -> bool {
        self.resolver.state().is_busy()
    }

    pub fn resolver_state(&self) -> ResolverState {
        self.resolver.state()
    }

    /// The user-visible error, if any
    pub fn message(&self) -> Option<&'static str> {
        self.message
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
        self.resolver.dismiss();
    }

    fn show(&mut self, error: impl Into<AppError>) {
        self.message = Some(error.into().user_message());
    }

    /// Reloads saved cities and recomputes the popular list.
    pub async fn refresh_saved(&mut self) {
        match self.store.list().await {
            Ok(saved) => {
                self.popular =
                    exclude_saved(&popular_cities(), &saved, self.settings.coordinate_match);
                self.saved = saved;
            }
            Err(e) => {
                tracing::error!("Unable to load saved cities: {}", e);
                self.show(e);
            }
        }
    }

    pub fn submit_query(&mut self, query: &str) -> Submitted {
        self.message = None;
        self.search.submit_query(query)
    }

    /// Waits for the next search reply and applies it.
    pub async fn next_search_update(&mut self) -> Delivery {
        self.search.next_update().await
    }

    /// Applies search replies that already arrived.
    pub fn process_search_updates(&mut self) -> usize {
        self.search.process_pending()
    }

    /// Saves a found or popular city.
    pub async fn select_city(&mut self, city: &FoundCity) -> Outcome {
        self.message = None;

        if is_duplicate_save(city, &self.saved, self.settings.coordinate_match) {
            tracing::info!("{} is already saved", city.name);
            return Outcome::Done;
        }

        match self.store.add_city(city).await {
            Ok(saved) => {
                tracing::info!("Saved city {} (id {})", saved.city.name, saved.id);
                self.refresh_saved().await;
                Outcome::Done
            }
            Err(e) => {
                tracing::error!("Unable to add found city: {}", e);
                self.show(e);
                Outcome::Stay
            }
        }
    }

    /// Resolves the device location and stores it as the geolocation city.
    pub async fn locate(&mut self) -> Outcome {
        self.message = None;

        let city = match self.resolver.resolve(self.settings.geolocation_timeout).await {
            Ok(city) => city,
            Err(LocationError::Superseded) => return Outcome::Stay,
            Err(e) => {
                self.show(e);
                return Outcome::Stay;
            }
        };

        match self.store.update_geolocation_city(&city).await {
            Ok(_) => {
                self.refresh_saved().await;
                Outcome::Done
            }
            Err(e) => {
                tracing::error!("Unable to add city from geolocation: {}", e);
                self.show(e);
                Outcome::Stay
            }
        }
    }

    pub async fn delete_city(&mut self, city: &SavedCity) {
        if let Err(e) = self.store.remove_city(city).await {
            tracing::warn!("Unable to remove {}: {}", city.city.name, e);
        }
        self.refresh_saved().await;
    }
}
