//! Maps city errors to townpick_core::AppError for consistent user-facing messages.

use townpick_core::{AppError, DatabaseError, LocationFailure};

use crate::types::{LocationError, StoreError};

impl From<LocationError> for AppError {
    fn from(e: LocationError) -> Self {
        let failure = match e {
            LocationError::PermissionDenied => LocationFailure::PermissionDenied,
            LocationError::PositionUnavailable => LocationFailure::PositionUnavailable,
            LocationError::Timeout
            | LocationError::Other(_)
            | LocationError::ReverseLookup(_)
            | LocationError::Superseded => LocationFailure::Failed,
        };
        AppError::Location(failure)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(db) => AppError::Database(db),
            StoreError::Task(msg) => AppError::Database(DatabaseError::WriteFailed(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeocodeError;

    #[test]
    fn test_permission_denied_keeps_its_message() {
        let app: AppError = LocationError::PermissionDenied.into();
        assert_eq!(
            app.user_message(),
            LocationFailure::PermissionDenied.user_message()
        );
    }

    #[test]
    fn test_timeout_and_lookup_share_generic_message() {
        let timeout: AppError = LocationError::Timeout.into();
        let lookup: AppError = LocationError::ReverseLookup(GeocodeError::NotFound {
            latitude: 0.0,
            longitude: 0.0,
        })
        .into();
        assert_eq!(timeout.user_message(), lookup.user_message());
        assert_eq!(timeout.user_message(), LocationFailure::Failed.user_message());
    }

    #[test]
    fn test_write_failure_message() {
        let app: AppError = StoreError::Database(DatabaseError::WriteFailed("locked".into())).into();
        assert_eq!(app.user_message(), "Unable to add the city. Please try again.");

        let task: AppError = StoreError::Task("panicked".into()).into();
        assert_eq!(task.user_message(), app.user_message());
    }
}
