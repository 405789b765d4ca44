//! Saved cities storage.
//!
//! `SavedCitiesStore` is the interface the town selection flow relies on.
//! `SqliteCityStore` keeps manual cities in insertion order and the device
//! location in a dedicated single-row table, so there can never be two
//! geolocation entries. `CityStore` wraps it for async callers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use townpick_core::{DatabaseError, RusqliteErrorExt};

use crate::types::{FoundCity, SavedCity, StoreError};

/// Id reported for the geolocation entry; manual ids start at 1.
pub const GEOLOCATION_ID: i64 = 0;

/// Operations the town selection flow needs from persistent storage.
#[async_trait]
pub trait SavedCitiesStore: Send + Sync {
    /// All saved cities: the geolocation entry first, then manual cities in
    /// the order they were added.
    async fn list(&self) -> Result<Vec<SavedCity>, StoreError>;

    /// Appends a manually chosen city.
    async fn add_city(&self, city: &FoundCity) -> Result<SavedCity, StoreError>;

    /// Removes a saved city. Removing an entry that no longer exists succeeds.
    async fn remove_city(&self, city: &SavedCity) -> Result<(), StoreError>;

    /// Replaces (or creates) the single geolocation entry.
    async fn update_geolocation_city(&self, city: &FoundCity) -> Result<SavedCity, StoreError>;
}

fn write_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(DatabaseError::WriteFailed(e.to_string()))
}

fn read_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.into_database_error())
}

/// SQLite-backed saved cities.
pub struct SqliteCityStore {
    conn: Connection,
}

impl SqliteCityStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Database(DatabaseError::ConnectionFailed(e.to_string())))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Database(DatabaseError::ConnectionFailed(e.to_string())))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS saved_cities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS geolocation_city (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
            )
            .map_err(|e| StoreError::Database(DatabaseError::ConnectionFailed(e.to_string())))
    }

    /// Reads (id, city, saved_at) from a row laid out as
    /// `id, name, country, latitude, longitude, saved_at`. An unreadable
    /// `saved_at` fails the row as a conversion error.
    fn row_to_city(row: &rusqlite::Row, is_geolocation: bool) -> rusqlite::Result<SavedCity> {
        let saved_at_str: String = row.get(5)?;
        let saved_at = DateTime::parse_from_rfc3339(&saved_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(SavedCity {
            id: row.get(0)?,
            city: FoundCity {
                name: row.get(1)?,
                country: row.get(2)?,
                latitude: row.get(3)?,
                longitude: row.get(4)?,
            },
            is_geolocation,
            saved_at,
        })
    }

    pub fn list(&self) -> Result<Vec<SavedCity>, StoreError> {
        let mut cities = Vec::new();

        let geolocation = self
            .conn
            .query_row(
                "SELECT ?1, name, country, latitude, longitude, saved_at
                 FROM geolocation_city WHERE slot = 1",
                params![GEOLOCATION_ID],
                |row| Self::row_to_city(row, true),
            )
            .optional()
            .map_err(read_error)?;
        cities.extend(geolocation);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, country, latitude, longitude, saved_at
                 FROM saved_cities ORDER BY id ASC",
            )
            .map_err(read_error)?;
        let manual = stmt
            .query_map([], |row| Self::row_to_city(row, false))
            .map_err(read_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_error)?;
        cities.extend(manual);

        Ok(cities)
    }

    pub fn add_city(&self, city: &FoundCity) -> Result<SavedCity, StoreError> {
        let saved_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO saved_cities (name, country, latitude, longitude, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    city.name,
                    city.country,
                    city.latitude,
                    city.longitude,
                    saved_at.to_rfc3339()
                ],
            )
            .map_err(write_error)?;

        Ok(SavedCity {
            id: self.conn.last_insert_rowid(),
            city: city.clone(),
            is_geolocation: false,
            saved_at,
        })
    }

    pub fn remove_city(&self, city: &SavedCity) -> Result<(), StoreError> {
        let removed = if city.is_geolocation {
            self.conn
                .execute("DELETE FROM geolocation_city WHERE slot = 1", [])
        } else {
            self.conn
                .execute("DELETE FROM saved_cities WHERE id = ?1", params![city.id])
        }
        .map_err(write_error)?;

        if removed == 0 {
            tracing::debug!("Saved city {} was already removed", city.id);
        }
        Ok(())
    }

    pub fn update_geolocation_city(&self, city: &FoundCity) -> Result<SavedCity, StoreError> {
        let saved_at = Utc::now();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO geolocation_city
                 (slot, name, country, latitude, longitude, saved_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)",
                params![
                    city.name,
                    city.country,
                    city.latitude,
                    city.longitude,
                    saved_at.to_rfc3339()
                ],
            )
            .map_err(write_error)?;

        Ok(SavedCity {
            id: GEOLOCATION_ID,
            city: city.clone(),
            is_geolocation: true,
            saved_at,
        })
    }
}

/// Thread-safe async handle to a `SqliteCityStore`.
///
/// SQLite calls run on the blocking pool.
#[derive(Clone)]
pub struct CityStore {
    inner: Arc<Mutex<SqliteCityStore>>,
}

impl CityStore {
    pub fn new(store: SqliteCityStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteCityStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            op(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SavedCitiesStore for CityStore {
    async fn list(&self) -> Result<Vec<SavedCity>, StoreError> {
        self.run(|store| store.list()).await
    }

    async fn add_city(&self, city: &FoundCity) -> Result<SavedCity, StoreError> {
        let city = city.clone();
        self.run(move |store| store.add_city(&city)).await
    }

    async fn remove_city(&self, city: &SavedCity) -> Result<(), StoreError> {
        let city = city.clone();
        self.run(move |store| store.remove_city(&city)).await
    }

    async fn update_geolocation_city(&self, city: &FoundCity) -> Result<SavedCity, StoreError> {
        let city = city.clone();
        self.run(move |store| store.update_geolocation_city(&city)).await
    }
}
