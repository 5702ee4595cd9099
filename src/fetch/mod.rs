// src/fetch/mod.rs

use crate::config::Config;
use crate::error::{LoadError, Result};
use encoding_rs::{Encoding, UTF_8};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, warn};

pub mod locations;
pub mod schools;

pub use locations::{fetch_locations, parse_locations, LocationOptions, LocationRecord, LocationTable};
pub use schools::{fetch_school, parse_school_table, SchoolTableOptions};

/// How far into an HTML body to look for a `<meta>` charset declaration.
const META_PRESCAN: usize = 1024;

/// Build the shared HTTP client. No retries are layered on top: a failed
/// fetch fails the load cycle.
pub fn build_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| LoadError::network("<client>", e))
}

async fn get(client: &Client, url: &str) -> Result<reqwest::Response> {
    debug!("Fetching {}", url);
    client
        .get(url)
        .send()
        .await
        .map_err(|e| LoadError::network(url, e))?
        .error_for_status()
        .map_err(|e| LoadError::network(url, e))
}

/// GET an HTML page and decode it. The charset comes from the response
/// header, else from the page's own `<meta>` tag, else UTF-8.
pub(crate) async fn get_html(client: &Client, url: &str) -> Result<String> {
    let resp = get(client, url).await?;
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = resp.bytes().await.map_err(|e| LoadError::network(url, e))?;
    Ok(decode_html(url, content_type.as_deref(), &body))
}

/// GET `url` and decode the body with `encoding` unless the response names
/// its own charset.
pub(crate) async fn get_text_with_charset(
    client: &Client,
    url: &str,
    encoding: &str,
) -> Result<String> {
    get(client, url)
        .await?
        .text_with_charset(encoding)
        .await
        .map_err(|e| LoadError::network(url, e))
}

pub(crate) fn decode_html(url: &str, content_type: Option<&str>, body: &[u8]) -> String {
    let declared = content_type
        .and_then(header_charset)
        .or_else(|| meta_charset(body))
        .unwrap_or(UTF_8);
    // A BOM still wins over whatever was declared.
    let (text, used, had_errors) = declared.decode(body);
    if had_errors {
        warn!(url, encoding = used.name(), "page had undecodable bytes");
    } else {
        debug!(url, encoding = used.name(), "decoded page");
    }
    text.into_owned()
}

/// `charset` parameter of a `Content-Type` value.
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

/// Charset declared by `<meta charset=..>` or `<meta http-equiv=.. content="..; charset=..">`
/// near the top of an HTML body.
pub(crate) fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_PRESCAN)];
    // Labels are ASCII, so a lossy view is enough to find them.
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let mut rest = head.as_str();
    while let Some(start) = rest.find("<meta") {
        let tag = &rest[start..];
        let (tag, after) = tag.split_at(tag.find('>').unwrap_or(tag.len()));
        if let Some(encoding) = tag_charset(tag) {
            // UTF-16 in a meta tag cannot be right for a page we could read.
            return Some(encoding.output_encoding());
        }
        rest = after;
    }
    None
}

fn tag_charset(tag: &str) -> Option<&'static Encoding> {
    let pos = tag.find("charset")?;
    let value = tag[pos + "charset".len()..].trim_start().strip_prefix('=')?;
    let label = value
        .trim_start()
        .trim_start_matches(['"', '\''])
        .split(|c: char| matches!(c, '"' | '\'' | ';' | '/') || c.is_ascii_whitespace())
        .next()?;
    Encoding::for_label(label.as_bytes())
}
