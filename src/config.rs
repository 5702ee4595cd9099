// src/config.rs

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use serde::Deserialize;
use std::{fs, path::Path};
use url::Url;

/// Runtime settings. Every field has a default, so a YAML file only needs
/// the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub elementary_url: String,
    pub middle_url: String,
    pub location_url: String,
    /// Charset of the location CSV when the server sends none.
    pub location_encoding: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Treat a missing `合計` row as fatal.
    pub strict_total_row: bool,
    pub org_prefix: String,
    pub total_row_label: String,
    pub count_unit: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elementary_url: "https://www.city.imabari.ehime.jp/gakukyou/shogakkou.html".into(),
            middle_url: "https://www.city.imabari.ehime.jp/gakukyou/chugakkou.html".into(),
            location_url: "https://www.city.imabari.ehime.jp/opendata/data/school.csv".into(),
            location_encoding: "shift_jis".into(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("imabari-schools/", env!("CARGO_PKG_VERSION")).into(),
            strict_total_row: false,
            org_prefix: "今治市立".into(),
            total_row_label: "合計".into(),
            count_unit: "人".into(),
        }
    }
}

impl Config {
    /// Read a YAML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Every endpoint must be an absolute http(s) URL and the location
    /// charset a known encoding label.
    pub fn validate(&self) -> Result<()> {
        for (what, raw) in [
            ("elementary_url", &self.elementary_url),
            ("middle_url", &self.middle_url),
            ("location_url", &self.location_url),
        ] {
            let url = Url::parse(raw).with_context(|| format!("{what}: {raw:?}"))?;
            anyhow::ensure!(
                matches!(url.scheme(), "http" | "https"),
                "{what}: unsupported scheme {:?}",
                url.scheme()
            );
        }
        anyhow::ensure!(
            Encoding::for_label(self.location_encoding.trim().as_bytes()).is_some(),
            "location_encoding: unknown encoding {:?}",
            self.location_encoding
        );
        Ok(())
    }

    /// `(level, url)` for every enrollment page, in concatenation order.
    pub fn school_urls(&self) -> [(&'static str, &str); 2] {
        [
            ("elementary", self.elementary_url.as_str()),
            ("middle", self.middle_url.as_str()),
        ]
    }
}
