//! Static city catalog: popular cities, country names and local filtering.

use crate::types::FoundCity;

/// Pre-curated cities offered before the user types anything.
/// (name, country code, latitude, longitude)
const POPULAR_CITIES: &[(&str, &str, f64, f64)] = &[
    ("Moscow", "RU", 55.7558, 37.6173),
    ("Saint Petersburg", "RU", 59.9386, 30.3141),
    ("London", "GB", 51.5072, -0.1276),
    ("Paris", "FR", 48.8566, 2.3522),
    ("Berlin", "DE", 52.5200, 13.4050),
    ("Madrid", "ES", 40.4168, -3.7038),
    ("Rome", "IT", 41.9028, 12.4964),
    ("Istanbul", "TR", 41.0082, 28.9784),
    ("Dubai", "AE", 25.2048, 55.2708),
    ("New York", "US", 40.7128, -74.0060),
    ("Tokyo", "JP", 35.6762, 139.6503),
    ("Beijing", "CN", 39.9042, 116.4074),
];

/// ISO 3166-1 alpha-2 codes with their English short names.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("AE", "United Arab Emirates"),
    ("AM", "Armenia"),
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("AZ", "Azerbaijan"),
    ("BE", "Belgium"),
    ("BG", "Bulgaria"),
    ("BR", "Brazil"),
    ("BY", "Belarus"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CN", "China"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EE", "Estonia"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GE", "Georgia"),
    ("GR", "Greece"),
    ("HR", "Croatia"),
    ("HU", "Hungary"),
    ("ID", "Indonesia"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KG", "Kyrgyzstan"),
    ("KR", "South Korea"),
    ("KZ", "Kazakhstan"),
    ("LT", "Lithuania"),
    ("LV", "Latvia"),
    ("MD", "Moldova"),
    ("MX", "Mexico"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RS", "Serbia"),
    ("RU", "Russia"),
    ("SE", "Sweden"),
    ("TH", "Thailand"),
    ("TJ", "Tajikistan"),
    ("TR", "Turkey"),
    ("UA", "Ukraine"),
    ("US", "United States"),
    ("UZ", "Uzbekistan"),
    ("VN", "Vietnam"),
    ("ZA", "South Africa"),
];

/// Returns the fixed list of popular cities.
pub fn popular_cities() -> Vec<FoundCity> {
    POPULAR_CITIES
        .iter()
        .map(|&(name, country, latitude, longitude)| {
            FoundCity::new(name, country, latitude, longitude)
        })
        .collect()
}

/// Display form of a city's country.
///
/// Known ISO codes map to their English name; anything else (unknown codes,
/// values that already are display names) is returned unchanged.
pub fn readable_country(city: &FoundCity) -> String {
    let code = city.country.trim();
    COUNTRY_NAMES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| city.country.clone())
}

/// Keeps the cities whose name contains `query`, ignoring case.
///
/// The query is trimmed first; an empty query keeps everything. Input order
/// is preserved.
pub fn filter_cities_by_query(cities: &[FoundCity], query: &str) -> Vec<FoundCity> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return cities.to_vec();
    }

    cities
        .iter()
        .filter(|city| city.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FoundCity> {
        vec![
            FoundCity::new("Paris", "FR", 48.8566, 2.3522),
            FoundCity::new("Parikia", "GR", 37.0853, 25.1515),
            FoundCity::new("Comparini", "IT", 45.0, 9.0),
            FoundCity::new("Berlin", "DE", 52.52, 13.405),
        ]
    }

    #[test]
    fn test_popular_cities_are_deterministic() {
        assert_eq!(popular_cities(), popular_cities());
        assert!(!popular_cities().is_empty());
    }

    #[test]
    fn test_popular_cities_have_unique_coordinates() {
        let cities = popular_cities();
        for (i, a) in cities.iter().enumerate() {
            for b in &cities[i + 1..] {
                assert!(
                    a.latitude != b.latitude || a.longitude != b.longitude,
                    "{} and {} share coordinates",
                    a.name,
                    b.name
                );
            }
        }
    }

    #[test]
    fn test_readable_country_known_code() {
        let city = FoundCity::new("Paris", "FR", 0.0, 0.0);
        assert_eq!(readable_country(&city), "France");
    }

    #[test]
    fn test_readable_country_is_case_insensitive() {
        let city = FoundCity::new("Kazan", "ru", 0.0, 0.0);
        assert_eq!(readable_country(&city), "Russia");
    }

    #[test]
    fn test_readable_country_falls_back_to_raw() {
        let unknown = FoundCity::new("Somewhere", "XQ", 0.0, 0.0);
        assert_eq!(readable_country(&unknown), "XQ");

        let display = FoundCity::new("Lyon", "France", 0.0, 0.0);
        assert_eq!(readable_country(&display), "France");

        let empty = FoundCity::new("Nowhere", "", 0.0, 0.0);
        assert_eq!(readable_country(&empty), "");
    }

    #[test]
    fn test_filter_empty_query_returns_input() {
        let cities = sample();
        assert_eq!(filter_cities_by_query(&cities, ""), cities);
        assert_eq!(filter_cities_by_query(&cities, "   "), cities);
    }

    #[test]
    fn test_filter_matches_substring_case_insensitive() {
        let cities = sample();
        let names: Vec<_> = filter_cities_by_query(&cities, "PAR")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Paris", "Parikia", "Comparini"]);
    }

    #[test]
    fn test_filter_trims_query() {
        let cities = sample();
        let filtered = filter_cities_by_query(&cities, "  berl ");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Berlin");
    }

    #[test]
    fn test_filter_is_idempotent() {
        let cities = sample();
        let once = filter_cities_by_query(&cities, "pari");
        let twice = filter_cities_by_query(&once, "pari");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_handles_non_ascii() {
        let cities = vec![
            FoundCity::new("Москва", "RU", 55.75, 37.61),
            FoundCity::new("München", "DE", 48.13, 11.58),
        ];
        assert_eq!(filter_cities_by_query(&cities, "МОС").len(), 1);
        assert_eq!(filter_cities_by_query(&cities, "münch").len(), 1);
    }
}
