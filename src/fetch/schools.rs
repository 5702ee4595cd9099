// src/fetch/schools.rs

use crate::coerce::coerce_count;
use crate::config::Config;
use crate::error::{LoadError, Result};
use crate::fields::LABEL_ALIASES;
use crate::table::EnrollmentTable;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, trace, warn};

static TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("CSS selector for tables should be valid"));
static ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("CSS selector for rows should be valid"));
static CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("CSS selector for cells should be valid"));

/// Knobs for turning an enrollment page into a table.
#[derive(Debug, Clone)]
pub struct SchoolTableOptions {
    /// Row label of the across-schools aggregate (`合計`).
    pub total_row_label: String,
    /// Unit suffix on every count (`人`).
    pub unit: String,
    /// Fail with `MissingRow` when the aggregate row is absent.
    pub strict_total_row: bool,
}

impl Default for SchoolTableOptions {
    fn default() -> Self {
        Self {
            total_row_label: "合計".into(),
            unit: "人".into(),
            strict_total_row: false,
        }
    }
}

impl From<&Config> for SchoolTableOptions {
    fn from(config: &Config) -> Self {
        Self {
            total_row_label: config.total_row_label.clone(),
            unit: config.count_unit.clone(),
            strict_total_row: config.strict_total_row,
        }
    }
}

/// Fetch one school level's enrollment page.
#[instrument(level = "info", skip(client, opts))]
pub async fn fetch_school(
    client: &Client,
    url: &str,
    opts: &SchoolTableOptions,
) -> Result<EnrollmentTable> {
    let html = super::get_html(client, url).await?;
    let table = parse_school_table(url, &html, opts)?;
    info!(rows = table.len(), cols = table.columns.len(), "parsed school table");
    Ok(table)
}

/// Parse the first `<table>` of `html`.
///
/// The first row is the header; its first cell labels the index and is
/// ignored. Every later row is `school name, count, count, ...`. `url` is
/// only used in error messages.
pub fn parse_school_table(url: &str, html: &str, opts: &SchoolTableOptions) -> Result<EnrollmentTable> {
    let doc = Html::parse_document(html);
    let table = doc
        .select(&TABLE)
        .next()
        .ok_or_else(|| LoadError::parse(url, "no <table> element"))?;

    let mut rows = table
        .select(&ROW)
        .map(row_cells)
        .filter(|cells| !cells.is_empty());

    let header = rows
        .next()
        .ok_or_else(|| LoadError::parse(url, "table has no rows"))?;
    if header.len() < 2 {
        return Err(LoadError::parse(
            url,
            format!("header has {} cell(s); need a label column and data", header.len()),
        ));
    }
    let columns: Vec<String> = header.into_iter().skip(1).collect();
    trace!(?columns, "header");

    let mut out = EnrollmentTable::new(columns);
    for (idx, mut cells) in rows.enumerate() {
        let name = cells.remove(0);
        if cells.len() > out.columns.len() {
            return Err(LoadError::parse(
                url,
                format!(
                    "row {} ({:?}) has {} values, header has {}",
                    idx + 1,
                    name,
                    cells.len(),
                    out.columns.len()
                ),
            ));
        }
        let counts = cells.iter().map(|c| coerce_count(c, &opts.unit)).collect();
        out.push(name, counts);
    }

    if !out.drop_row(&opts.total_row_label) {
        if opts.strict_total_row {
            return Err(LoadError::MissingRow {
                url: url.to_string(),
                label: opts.total_row_label.clone(),
            });
        }
        warn!(label = %opts.total_row_label, "aggregate row not found; nothing dropped");
    }

    for &(alias, canonical) in LABEL_ALIASES {
        out.rename_column(alias, canonical);
    }
    debug!(rows = out.len(), "normalised school table");
    Ok(out)
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.select(&CELL).map(cell_text).collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Field;

    const ELEMENTARY: &str = r#"<html><body>
<h1>児童数</h1>
<table>
  <thead>
    <tr><th>学校名</th><th>新1年</th><th>2年</th><th>3年</th><th>4年</th><th>5年</th><th>6年</th><th>計</th></tr>
  </thead>
  <tbody>
    <tr><td>A小学校</td><td>10人</td><td>10人</td><td>10人</td><td>10人</td><td>10人</td><td>10人</td><td>60人</td></tr>
    <tr><td>B小学校</td><td>1,001人</td><td>-</td><td>3人</td><td></td><td>5人</td><td>6人</td><td>1,015人</td></tr>
    <tr><td>合計</td><td>999人</td><td>0人</td><td>0人</td><td>0人</td><td>0人</td><td>0人</td><td>9,999人</td></tr>
  </tbody>
</table>
<table><tr><td>unrelated</td><td>1</td></tr></table>
</body></html>"#;

    #[test]
    fn total_row_is_dropped_and_counts_coerced() -> anyhow::Result<()> {
        crate::init_test_logging();
        let t = parse_school_table("fixture", ELEMENTARY, &SchoolTableOptions::default())?;
        assert_eq!(t.len(), 2);
        assert!(t.get("合計").is_none());
        assert_eq!(t.value("A小学校", "1年"), Some(10));
        assert_eq!(t.value("A小学校", "計"), Some(60));
        assert_eq!(t.value("B小学校", "1年"), Some(1001));
        assert_eq!(t.value("B小学校", "2年"), None);
        assert_eq!(t.value("B小学校", "4年"), None);
        assert_eq!(t.value("B小学校", "計"), Some(1015));
        Ok(())
    }

    #[test]
    fn new_first_grade_is_renamed() -> anyhow::Result<()> {
        let t = parse_school_table("fixture", ELEMENTARY, &SchoolTableOptions::default())?;
        assert_eq!(t.columns[0], Field::Grade(1).label());
        assert!(!t.columns.iter().any(|c| c == "新1年"));
        assert_eq!(t.columns.iter().filter(|c| *c == "1年").count(), 1);
        Ok(())
    }

    #[test]
    fn aggregate_row_fixture_yields_single_school() -> anyhow::Result<()> {
        let html = r#"<table>
<tr><th></th><th>1年</th><th>計</th></tr>
<tr><th>A Elementary</th><td>10人</td><td>60人</td></tr>
<tr><th>Total</th><td>999人</td><td>9999人</td></tr>
</table>"#;
        let opts = SchoolTableOptions {
            total_row_label: "Total".into(),
            ..Default::default()
        };
        let t = parse_school_table("fixture", html, &opts)?;
        assert_eq!(t.len(), 1);
        assert_eq!(t.records[0].name, "A Elementary");
        assert_eq!(t.value("A Elementary", "1年"), Some(10));
        assert_eq!(t.value("A Elementary", "計"), Some(60));
        Ok(())
    }

    #[test]
    fn missing_total_row_is_tolerated() -> anyhow::Result<()> {
        crate::init_test_logging();
        let html = "<table><tr><th>学校名</th><th>1年</th></tr><tr><td>C中学校</td><td>5人</td></tr></table>";
        let t = parse_school_table("fixture", html, &SchoolTableOptions::default())?;
        assert_eq!(t.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_total_row_fails_in_strict_mode() {
        let html = "<table><tr><th>学校名</th><th>1年</th></tr><tr><td>C中学校</td><td>5人</td></tr></table>";
        let opts = SchoolTableOptions {
            strict_total_row: true,
            ..Default::default()
        };
        let err = parse_school_table("fixture", html, &opts).unwrap_err();
        assert!(matches!(err, LoadError::MissingRow { ref label, .. } if label == "合計"));
    }

    #[test]
    fn page_without_table_is_a_parse_failure() {
        let err = parse_school_table("fixture", "<p>工事中</p>", &SchoolTableOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn too_many_cells_is_a_parse_failure() {
        let html = "<table><tr><th>学校名</th><th>1年</th></tr><tr><td>X</td><td>1人</td><td>2人</td></tr></table>";
        let err = parse_school_table("fixture", html, &SchoolTableOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn header_only_table_is_empty() -> anyhow::Result<()> {
        let html = "<table><tr><th>学校名</th><th>1年</th><th>計</th></tr></table>";
        let t = parse_school_table("fixture", html, &SchoolTableOptions::default())?;
        assert!(t.is_empty());
        assert_eq!(t.columns, vec!["1年", "計"]);
        Ok(())
    }
}
