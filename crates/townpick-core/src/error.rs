//! Centralized error types for Townpick.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Errors surfaced to the town selection screen are converted to this type.
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Location error: {0}")]
    Location(#[from] LocationFailure),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    ///
    /// These messages are designed to be actionable and non-technical.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Database(e) => e.user_message(),
            AppError::Location(e) => e.user_message(),
        }
    }
}

/// Network-related errors (HTTP, connectivity).
///
/// Search and reverse lookup failures are only logged, so these carry no UI text.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Database/storage errors (saved cities).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => {
                "Unable to access saved cities. Try restarting the app."
            }
            DatabaseError::QueryFailed(_) => "Unable to load saved cities. Please try again.",
            DatabaseError::WriteFailed(_) => "Unable to add the city. Please try again.",
            DatabaseError::Corruption(_) => {
                "Saved cities may be corrupted. Consider resetting app data."
            }
        }
    }
}

/// User-facing location failure categories.
///
/// Timeouts, unclassified provider failures and reverse lookup failures all
/// collapse into `Failed`; the detailed cause is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationFailure {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    PositionUnavailable,

    #[error("Unable to determine location")]
    Failed,
}

impl LocationFailure {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationFailure::PermissionDenied => {
                "Location access was denied. Allow location access in your settings."
            }
            LocationFailure::PositionUnavailable => {
                "Your position is currently unavailable. Please try again later."
            }
            LocationFailure::Failed => "Unable to determine your city. Please try again.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                DatabaseError::Corruption(self.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..) => {
                DatabaseError::Corruption(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}
