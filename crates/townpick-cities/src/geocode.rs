//! City search and reverse geocoding against Nominatim (OpenStreetMap).
//! Free, no API key required, but a descriptive user agent is mandatory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use townpick_core::{CitiesConfig, NetworkError, ReqwestErrorExt};

use crate::provider::{CitySearch, ReverseGeocoder};
use crate::types::{FoundCity, GeocodeError, SearchError};

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    // Absent on `{"error": "Unable to geocode"}` replies
    #[serde(default)]
    lat: String,
    #[serde(default)]
    lon: String,
    name: Option<String>,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl NominatimAddress {
    /// Prefer city > town > village > municipality for the primary place name
    fn settlement(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .or(self.municipality.as_deref())
    }

    fn country(&self) -> Option<String> {
        self.country_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .or_else(|| self.country.clone())
    }
}

impl NominatimPlace {
    fn coordinates(&self) -> Option<(f64, f64)> {
        let latitude: f64 = self.lat.trim().parse().ok()?;
        let longitude: f64 = self.lon.trim().parse().ok()?;
        // "NaN" and "inf" parse, but would never match a saved city
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        Some((latitude, longitude))
    }

    /// Name shown for a search hit: the place's own name, then its settlement,
    /// then the leading part of the display name.
    fn search_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.address.as_ref().and_then(NominatimAddress::settlement))
            .or_else(|| {
                self.display_name
                    .as_deref()
                    .and_then(|d| d.split(',').next())
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
            })
            .map(str::to_string)
    }

    fn country(&self) -> String {
        self.address
            .as_ref()
            .and_then(NominatimAddress::country)
            .unwrap_or_default()
    }
}

/// HTTP client for the Nominatim `search` and `reverse` endpoints.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Arc<Client>,
    search_url: String,
    reverse_url: String,
    result_limit: u32,
}

impl NominatimClient {
    pub fn new(
        search_url: impl Into<String>,
        reverse_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        result_limit: u32,
    ) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
            search_url: search_url.into(),
            reverse_url: reverse_url.into(),
            result_limit,
        })
    }

    pub fn from_config(config: &CitiesConfig) -> Result<Self, NetworkError> {
        Self::new(
            config.search_url.clone(),
            config.reverse_url.clone(),
            &config.user_agent,
            config.search_timeout(),
            config.result_limit,
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Network(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            }));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

/// Shared failure shape of both endpoints before it is classified per caller
enum FetchError {
    Network(NetworkError),
    Parse(String),
}

impl From<FetchError> for SearchError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Network(n) => SearchError::Network(n),
            FetchError::Parse(p) => SearchError::Parse(p),
        }
    }
}

impl From<FetchError> for GeocodeError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Network(n) => GeocodeError::Network(n),
            FetchError::Parse(p) => GeocodeError::Parse(p),
        }
    }
}

#[async_trait]
impl CitySearch for NominatimClient {
    async fn search(&self, query: &str, locale: &str) -> Result<Vec<FoundCity>, SearchError> {
        let params = [
            ("q", query.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
            ("featureType", "settlement".to_string()),
            ("limit", self.result_limit.to_string()),
            ("accept-language", locale.to_string()),
        ];

        let places: Vec<NominatimPlace> = self.get_json(&self.search_url, &params).await?;

        let cities: Vec<FoundCity> = places
            .iter()
            .filter_map(|place| {
                let (latitude, longitude) = place.coordinates()?;
                let name = place.search_name()?;
                Some(FoundCity::new(name, place.country(), latitude, longitude))
            })
            .collect();

        tracing::debug!(
            "Search for {:?} returned {} of {} places",
            query,
            cities.len(),
            places.len()
        );
        Ok(cities)
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse_lookup(
        &self,
        latitude: f64,
        longitude: f64,
        locale: &str,
    ) -> Result<FoundCity, GeocodeError> {
        let params = [
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("format", "jsonv2".to_string()),
            ("addressdetails", "1".to_string()),
            ("zoom", "10".to_string()),
            ("accept-language", locale.to_string()),
        ];

        let place: NominatimPlace = self.get_json(&self.reverse_url, &params).await?;
        let not_found = || GeocodeError::NotFound {
            latitude,
            longitude,
        };

        let address = place.address.as_ref().ok_or_else(not_found)?;

        // Fall back to broader areas so rural fixes still resolve to something
        let name = address
            .settlement()
            .or(address.county.as_deref())
            .or(address.state.as_deref())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| place.name.clone().filter(|n| !n.is_empty()))
            .ok_or_else(not_found)?;

        let city = FoundCity::new(name, place.country(), latitude, longitude);
        tracing::info!("Reverse geocoded to: {} ({})", city.name, city.country);
        Ok(city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(json: serde_json::Value) -> NominatimPlace {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_settlement_preference() {
        let p = place(serde_json::json!({
            "lat": "1", "lon": "2",
            "address": { "town": "Smalltown", "village": "Tiny", "country_code": "de" }
        }));
        let address = p.address.as_ref().unwrap();
        assert_eq!(address.settlement(), Some("Smalltown"));
        assert_eq!(p.country(), "DE");
    }

    #[test]
    fn test_country_falls_back_to_name() {
        let p = place(serde_json::json!({
            "lat": "1", "lon": "2",
            "address": { "city": "Somewhere", "country": "Atlantis" }
        }));
        assert_eq!(p.country(), "Atlantis");
    }

    #[test]
    fn test_search_name_from_display_name() {
        let p = place(serde_json::json!({
            "lat": "1", "lon": "2",
            "display_name": "Parikia, Paros, Greece"
        }));
        assert_eq!(p.search_name().as_deref(), Some("Parikia"));
    }

    #[test]
    fn test_unparseable_coordinates() {
        let p = place(serde_json::json!({ "lat": "north", "lon": "2" }));
        assert!(p.coordinates().is_none());
    }

    #[test]
    fn test_non_finite_coordinates_are_rejected() {
        for (lat, lon) in [("NaN", "2"), ("1", "inf"), ("-infinity", "NaN")] {
            let p = place(serde_json::json!({ "lat": lat, "lon": lon }));
            assert!(p.coordinates().is_none(), "accepted {lat}, {lon}");
        }
        let p = place(serde_json::json!({ "lat": "-0.0", "lon": "12.5" }));
        assert_eq!(p.coordinates(), Some((0.0, 12.5)));
    }
}
