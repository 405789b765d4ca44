//! Keystroke-driven city search.
//!
//! Every submitted query narrows the held results locally right away and, when
//! long enough, starts a remote search on the runtime. Replies come back over
//! a channel tagged with the generation that issued them; only a reply from the
//! latest generation may replace the visible results, so network ordering never
//! decides what the user sees.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::catalog::filter_cities_by_query;
use crate::provider::CitySearch;
use crate::types::{FoundCity, SearchError};

/// Settings for the search controller
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub locale: String,
    pub timeout: Duration,
    /// Trimmed queries shorter than this (in characters) stay local
    pub min_query_len: usize,
}

impl SearchSettings {
    pub fn from_config(config: &townpick_core::CitiesConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            timeout: config.search_timeout(),
            min_query_len: config.min_query_len,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&townpick_core::CitiesConfig::default())
    }
}

/// Completion of one remote search, sent back to the controller
#[derive(Debug)]
pub struct SearchReply {
    pub generation: u64,
    pub query: String,
    pub result: Result<Vec<FoundCity>, SearchError>,
}

/// What happened to a reply when it reached the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Reply replaced the visible results
    Applied,
    /// A newer query was submitted since; reply dropped
    Stale,
    /// Latest search failed; the local filter result stands
    Failed,
}

/// Result of a single `submit_query` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub generation: u64,
    pub remote: bool,
}

pub struct SearchController {
    search: Arc<dyn CitySearch>,
    settings: SearchSettings,
    generation: u64,
    /// Untrimmed text, as shown in the input field
    query: String,
    found: Vec<FoundCity>,
    tx: mpsc::UnboundedSender<SearchReply>,
    rx: mpsc::UnboundedReceiver<SearchReply>,
}

impl SearchController {
    pub fn new(search: Arc<dyn CitySearch>, settings: SearchSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            search,
            settings,
            generation: 0,
            query: String::new(),
            found: Vec::new(),
            tx,
            rx,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn found(&self) -> &[FoundCity] {
        &self.found
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.settings.locale = locale.into();
    }

    /// True when the trimmed query is long enough for a remote search.
    pub fn is_long_enough(&self, query: &str) -> bool {
        query.trim().chars().count() >= self.settings.min_query_len
    }

    /// Handles one edit of the search field.
    ///
    /// Must be called from within a tokio runtime when the query is long
    /// enough, since the remote search is spawned onto it.
    pub fn submit_query(&mut self, query: &str) -> Submitted {
        self.query = query.to_string();
        let trimmed = query.trim();

        // Short queries advance the generation too, so an older reply can't
        // overwrite their local filter.
        self.generation += 1;
        let generation = self.generation;

        self.found = filter_cities_by_query(&self.found, trimmed);

        if !self.is_long_enough(trimmed) {
            return Submitted {
                generation,
                remote: false,
            };
        }

        let search = Arc::clone(&self.search);
        let tx = self.tx.clone();
        let locale = self.settings.locale.clone();
        let timeout = self.settings.timeout;
        let query = trimmed.to_string();

        tracing::debug!("Searching for {:?} (generation {})", query, generation);
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, search.search(&query, &locale)).await
            {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout(timeout.as_millis() as u64)),
            };
            // The receiver lives as long as the controller
            let _ = tx.send(SearchReply {
                generation,
                query,
                result,
            });
        });

        Submitted {
            generation,
            remote: true,
        }
    }

    /// Applies a reply if it belongs to the latest submitted query.
    pub fn apply(&mut self, reply: SearchReply) -> Delivery {
        if reply.generation != self.generation {
            tracing::debug!(
                "Discarding results for {:?} (generation {}, current {})",
                reply.query,
                reply.generation,
                self.generation
            );
            return Delivery::Stale;
        }

        match reply.result {
            Ok(cities) => {
                tracing::debug!("Showing {} results for {:?}", cities.len(), reply.query);
                self.found = cities;
                Delivery::Applied
            }
            Err(e) => {
                tracing::warn!("City search for {:?} failed: {}", reply.query, e);
                Delivery::Failed
            }
        }
    }

    /// Waits for the next search reply and applies it.
    pub async fn next_update(&mut self) -> Delivery {
        match self.rx.recv().await {
            Some(reply) => self.apply(reply),
            // Unreachable while `self.tx` is alive
            None => Delivery::Stale,
        }
    }

    /// Applies every reply that has already arrived. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(reply) = self.rx.try_recv() {
            if self.apply(reply) == Delivery::Applied {
                applied += 1;
            }
        }
        applied
    }
}
