// src/fetch/locations.rs

use crate::coerce::coerce_float;
use crate::config::Config;
use crate::error::{LoadError, Result};
use csv::ReaderBuilder;
use reqwest::Client;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

/// Source header → canonical field, for the columns the pipeline relies on.
pub static LOCATION_COLUMNS: &[(&str, &str)] = &[
    ("施設名", "name"),
    ("所在地", "address"),
    ("電話番号", "tel"),
    ("緯度", "lat"),
    ("経度", "lon"),
];

/// One facility. `extra` carries every column not in [`LOCATION_COLUMNS`]
/// untouched, keyed by its source header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub name: String,
    pub address: String,
    pub tel: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Facilities indexed by (prefix-stripped) name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationTable {
    pub records: Vec<LocationRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl LocationTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&LocationRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    /// Insert unless the name is already taken; the first record wins.
    pub fn insert(&mut self, record: LocationRecord) -> bool {
        if self.index.contains_key(&record.name) {
            warn!(name = %record.name, "duplicate facility name; keeping first");
            return false;
        }
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        true
    }
}

impl PartialEq for LocationTable {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

/// Knobs for the location dataset.
#[derive(Debug, Clone)]
pub struct LocationOptions {
    /// Organisation prefix removed from every facility name (`今治市立`).
    pub org_prefix: String,
    /// Charset used when the server does not name one.
    pub encoding: String,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            org_prefix: "今治市立".into(),
            encoding: "shift_jis".into(),
        }
    }
}

impl From<&Config> for LocationOptions {
    fn from(config: &Config) -> Self {
        Self {
            org_prefix: config.org_prefix.clone(),
            encoding: config.location_encoding.clone(),
        }
    }
}

/// Fetch the facility CSV.
#[instrument(level = "info", skip(client, opts))]
pub async fn fetch_locations(
    client: &Client,
    url: &str,
    opts: &LocationOptions,
) -> Result<LocationTable> {
    let text = super::get_text_with_charset(client, url, &opts.encoding).await?;
    let table = parse_locations(url, &text, opts)?;
    info!(rows = table.len(), "parsed location table");
    Ok(table)
}

/// Parse already-decoded CSV text. `url` is only used in error messages.
pub fn parse_locations(url: &str, text: &str, opts: &LocationOptions) -> Result<LocationTable> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let csv_err = |source: csv::Error| LoadError::Csv {
        url: url.to_string(),
        source,
    };

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut positions = [0usize; 5];
    for (slot, &(label, field)) in positions.iter_mut().zip(LOCATION_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == label)
            .ok_or_else(|| LoadError::parse(url, format!("missing column {label} ({field})")))?;
    }
    let [name_at, address_at, tel_at, lat_at, lon_at] = positions;
    debug!(?headers, "location header");

    let mut out = LocationTable::default();
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let cell = |i: usize| record.get(i).unwrap_or("");

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !positions.contains(i))
            .map(|(i, h)| (h.clone(), cell(i).to_string()))
            .collect();

        out.insert(LocationRecord {
            name: strip_prefix_all(cell(name_at), &opts.org_prefix),
            address: cell(address_at).to_string(),
            tel: cell(tel_at).trim().to_string(),
            lat: coerce_float(cell(lat_at)),
            lon: coerce_float(cell(lon_at)),
            extra,
        });
    }
    Ok(out)
}

/// Remove every occurrence of `prefix`, then trim.
fn strip_prefix_all(name: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return name.trim().to_string();
    }
    name.replace(prefix, "").trim().to_string()
}
