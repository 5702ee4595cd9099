// src/loader.rs

use crate::config::Config;
use crate::error::{LoadError, Result};
use crate::fetch::{self, locations::LocationOptions, LocationTable, SchoolTableOptions};
use crate::table::EnrollmentTable;
use futures::future::try_join_all;
use reqwest::Client;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Everything the dashboard reads: all schools of every level, plus the
/// facility locations. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub schools: EnrollmentTable,
    pub locations: LocationTable,
}

/// Fetch every enrollment page and the location CSV, concurrently.
/// Any failure fails the whole load.
#[instrument(level = "info", skip_all)]
pub async fn load_dataset(client: &Client, config: &Config) -> Result<Dataset> {
    let school_opts = SchoolTableOptions::from(config);
    let location_opts = LocationOptions::from(config);

    let schools = try_join_all(config.school_urls().into_iter().map(|(level, url)| {
        debug!(school_level = level, url, "queueing school page");
        fetch::fetch_school(client, url, &school_opts)
    }));
    let locations = fetch::fetch_locations(client, &config.location_url, &location_opts);

    let (levels, locations) = futures::try_join!(schools, locations)?;
    let schools = EnrollmentTable::concat(&levels);
    Ok(Dataset { schools, locations })
}

/// Single-slot cache for the [`Dataset`].
///
/// The first caller runs the fetch; callers arriving while it is in flight
/// wait on it and get the same `Arc`. A failed load leaves the slot empty
/// so the next call tries again.
#[derive(Debug, Default)]
pub struct DatasetCache {
    slot: OnceCell<Arc<Dataset>>,
    loads: AtomicUsize,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load(&self, client: &Client, config: &Config) -> Result<Arc<Dataset>> {
        let loads = &self.loads;
        self.slot
            .get_or_try_init(|| async move {
                loads.fetch_add(1, Ordering::SeqCst);
                let start = Instant::now();
                let ds = load_dataset(client, config).await?;
                info!(
                    schools = ds.schools.len(),
                    locations = ds.locations.len(),
                    elapsed = ?start.elapsed(),
                    "dataset loaded"
                );
                Ok::<_, LoadError>(Arc::new(ds))
            })
            .await
            .cloned()
    }

    /// The cached value, if a load has completed.
    pub fn get(&self) -> Option<Arc<Dataset>> {
        self.slot.get().cloned()
    }

    /// How many times a load has been started.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Application context: configuration, HTTP client, and the dataset cache
/// whose lifetime is tied to this value.
#[derive(Debug)]
pub struct App {
    pub config: Config,
    client: Client,
    cache: DatasetCache,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = fetch::build_client(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: Client) -> Self {
        Self {
            config,
            client,
            cache: DatasetCache::new(),
        }
    }

    pub async fn dataset(&self) -> Result<Arc<Dataset>> {
        self.cache.get_or_load(&self.client, &self.config).await
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }
}
