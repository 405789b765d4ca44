//! Coordinate-based reconciliation between candidate cities and saved cities.

use crate::types::{FoundCity, SavedCity};

/// How two coordinate pairs are compared.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CoordinateMatch {
    /// `==` on latitude and longitude (so `0.0` matches `-0.0`)
    #[default]
    Exact,
    /// Both components within the given number of degrees
    Within(f64),
}

impl CoordinateMatch {
    /// Builds the match rule from an optional configured tolerance.
    pub fn from_tolerance(tolerance: Option<f64>) -> Self {
        match tolerance {
            Some(epsilon) if epsilon > 0.0 => Self::Within(epsilon),
            _ => Self::Exact,
        }
    }

    /// True when both latitude and longitude agree.
    pub fn matches(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        match *self {
            Self::Exact => a.0 == b.0 && a.1 == b.1,
            Self::Within(epsilon) => (a.0 - b.0).abs() <= epsilon && (a.1 - b.1).abs() <= epsilon,
        }
    }
}

fn coords(city: &FoundCity) -> (f64, f64) {
    (city.latitude, city.longitude)
}

/// Removes every candidate that sits at the same coordinates as a saved city.
pub fn exclude_saved(
    candidates: &[FoundCity],
    saved: &[SavedCity],
    rule: CoordinateMatch,
) -> Vec<FoundCity> {
    candidates
        .iter()
        .filter(|candidate| !is_duplicate_save(candidate, saved, rule))
        .cloned()
        .collect()
}

/// True when `candidate` is already present in `saved`.
pub fn is_duplicate_save(candidate: &FoundCity, saved: &[SavedCity], rule: CoordinateMatch) -> bool {
    saved
        .iter()
        .any(|entry| rule.matches((entry.latitude(), entry.longitude()), coords(candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn saved(id: i64, name: &str, latitude: f64, longitude: f64) -> SavedCity {
        SavedCity {
            id,
            city: FoundCity::new(name, "XX", latitude, longitude),
            is_geolocation: false,
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_exclude_saved_example() {
        let popular = vec![
            FoundCity::new("City A", "XX", 10.0, 20.0),
            FoundCity::new("City B", "XX", 30.0, 40.0),
        ];
        let saved_list = vec![saved(1, "Somewhere", 10.0, 20.0)];

        let remaining = exclude_saved(&popular, &saved_list, CoordinateMatch::Exact);
        assert_eq!(remaining, vec![FoundCity::new("City B", "XX", 30.0, 40.0)]);
    }

    #[test]
    fn test_partial_coordinate_match_does_not_exclude() {
        let popular = vec![
            FoundCity::new("Same latitude", "XX", 10.0, 99.0),
            FoundCity::new("Same longitude", "XX", 99.0, 20.0),
        ];
        let saved_list = vec![saved(1, "Saved", 10.0, 20.0)];

        let remaining = exclude_saved(&popular, &saved_list, CoordinateMatch::Exact);
        assert_eq!(remaining, popular);
    }

    #[test]
    fn test_components_must_match_the_same_entry() {
        let candidate = FoundCity::new("Mixed", "XX", 10.0, 40.0);
        let saved_list = vec![saved(1, "A", 10.0, 20.0), saved(2, "B", 30.0, 40.0)];
        assert!(!is_duplicate_save(&candidate, &saved_list, CoordinateMatch::Exact));
    }

    #[test]
    fn test_duplicate_ignores_name() {
        let candidate = FoundCity::new("Other name", "YY", 55.75, 37.61);
        let saved_list = vec![saved(1, "Moscow", 55.75, 37.61)];
        assert!(is_duplicate_save(&candidate, &saved_list, CoordinateMatch::Exact));
    }

    #[test]
    fn test_empty_saved_list_excludes_nothing() {
        let popular = crate::catalog::popular_cities();
        assert_eq!(exclude_saved(&popular, &[], CoordinateMatch::Exact), popular);
    }

    #[test]
    fn test_match_is_reflexive_and_symmetric() {
        let pairs = [((10.0, 20.0), (10.0, 20.0)), ((10.0, 20.0), (10.00005, 19.99995))];
        for rule in [CoordinateMatch::Exact, CoordinateMatch::Within(0.0001)] {
            for (a, b) in pairs {
                assert!(rule.matches(a, a));
                assert_eq!(rule.matches(a, b), rule.matches(b, a));
            }
        }
    }

    #[test]
    fn test_tolerance_absorbs_float_drift() {
        let candidate = FoundCity::new("Paris", "FR", 48.856_600_000_1, 2.352_2);
        let saved_list = vec![saved(1, "Paris", 48.8566, 2.3522)];
        assert!(!is_duplicate_save(&candidate, &saved_list, CoordinateMatch::Exact));
        assert!(is_duplicate_save(
            &candidate,
            &saved_list,
            CoordinateMatch::Within(1e-6)
        ));
    }

    #[test]
    fn test_from_tolerance() {
        assert_eq!(CoordinateMatch::from_tolerance(None), CoordinateMatch::Exact);
        assert_eq!(CoordinateMatch::from_tolerance(Some(0.0)), CoordinateMatch::Exact);
        assert_eq!(
            CoordinateMatch::from_tolerance(Some(0.001)),
            CoordinateMatch::Within(0.001)
        );
    }
}
