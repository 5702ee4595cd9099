// src/view.rs
//
// Chart-ready data for one school level and one selected field. Drawing the
// charts is left to whatever consumes these values.

use crate::fields::{key_for_label, Field};
use crate::fetch::{LocationRecord, LocationTable};
use crate::loader::Dataset;
use crate::table::EnrollmentTable;
use serde::Serialize;
use std::{collections::BTreeMap, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchoolLevel {
    Elementary,
    Middle,
}

impl SchoolLevel {
    /// Every school name of this level ends with this.
    pub fn suffix(self) -> &'static str {
        match self {
            SchoolLevel::Elementary => "小学校",
            SchoolLevel::Middle => "中学校",
        }
    }
}

impl fmt::Display for SchoolLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchoolLevel::Elementary => "elementary",
            SchoolLevel::Middle => "middle",
        })
    }
}

impl FromStr for SchoolLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elementary" | "小学校" => Ok(SchoolLevel::Elementary),
            "middle" | "中学校" => Ok(SchoolLevel::Middle),
            other => Err(format!("unknown school level {other:?}")),
        }
    }
}

/// The enrollment rows of one level, minus columns nobody at that level has.
pub fn level_table(schools: &EnrollmentTable, level: SchoolLevel) -> EnrollmentTable {
    let mut t = schools.filter_rows(|name| name.ends_with(level.suffix()));
    t.drop_empty_columns();
    t
}

/// Column the selector resolves to in `table`: a known label or key maps
/// through the field table, any other page column is taken as is, and
/// everything else is the total. No selector means the last column.
pub fn selected_column(table: &EnrollmentTable, selector: Option<&str>) -> String {
    let Some(s) = selector.map(str::trim) else {
        return table
            .columns
            .last()
            .cloned()
            .unwrap_or_else(|| Field::Total.label().to_string());
    };
    match Field::parse(s) {
        Some(field) => field.label().to_string(),
        None if table.column_index(s).is_some() => s.to_string(),
        None => Field::Total.label().to_string(),
    }
}

/// One school with its location, if any. Counts are keyed canonically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    pub name: String,
    pub counts: BTreeMap<String, Option<u64>>,
    pub address: Option<String>,
    pub tel: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl JoinedRow {
    pub fn value(&self, field: Field) -> Option<u64> {
        self.counts.get(field.key()).copied().flatten()
    }
}

/// Left join of a level table against the locations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedView {
    /// Canonical keys, in table order.
    pub columns: Vec<String>,
    pub rows: Vec<JoinedRow>,
}

impl JoinedView {
    pub fn build(table: &EnrollmentTable, locations: &LocationTable) -> Self {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| key_for_label(c).to_string())
            .collect();
        let rows = table
            .records
            .iter()
            .map(|r| {
                let loc: Option<&LocationRecord> = locations.get(&r.name);
                JoinedRow {
                    name: r.name.clone(),
                    counts: columns.iter().cloned().zip(r.counts.iter().copied()).collect(),
                    address: loc.map(|l| l.address.clone()),
                    tel: loc.map(|l| l.tel.clone()),
                    lat: loc.and_then(|l| l.lat),
                    lon: loc.and_then(|l| l.lon),
                }
            })
            .collect();
        Self { columns, rows }
    }
}

/// `(school, value)` pairs for one column of the level table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    /// Source label, as on the page.
    pub column: String,
    pub bars: Vec<(String, Option<u64>)>,
}

impl BarSeries {
    /// Every value is `None` when `column` is not in `table`.
    pub fn new(table: &EnrollmentTable, column: &str) -> Self {
        let idx = table.column_index(column);
        let bars = table
            .records
            .iter()
            .map(|r| (r.name.clone(), idx.and_then(|i| r.counts[i])))
            .collect();
        Self {
            column: column.to_string(),
            bars,
        }
    }

    /// One series per column except the total, for the stacked overview.
    pub fn per_grade(table: &EnrollmentTable) -> Vec<BarSeries> {
        table
            .columns
            .iter()
            .filter(|c| c.as_str() != Field::Total.label())
            .map(|c| BarSeries::new(table, c))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnPoint {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub elevation: Option<u64>,
}

/// A 3D column layer over the map: one extruded column per located school.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMap {
    /// `None` when no school has coordinates.
    pub view: Option<ViewState>,
    pub elevation_field: Field,
    pub elevation_scale: f64,
    pub radius: f64,
    pub fill_color: [u8; 4],
    pub points: Vec<ColumnPoint>,
}

impl ColumnMap {
    pub fn new(view: &JoinedView, field: Field) -> Self {
        let lats: Vec<f64> = view.rows.iter().filter_map(|r| r.lat).collect();
        let lons: Vec<f64> = view.rows.iter().filter_map(|r| r.lon).collect();
        let state = match (mean(&lats), mean(&lons)) {
            (Some(latitude), Some(longitude)) => Some(ViewState {
                latitude,
                longitude,
                zoom: 12.0,
                pitch: 50.0,
            }),
            _ => None,
        };
        let points = view
            .rows
            .iter()
            .filter_map(|r| {
                Some(ColumnPoint {
                    name: r.name.clone(),
                    lon: r.lon?,
                    lat: r.lat?,
                    elevation: r.value(field),
                })
            })
            .collect();
        Self {
            view: state,
            elevation_field: field,
            elevation_scale: 5.0,
            radius: 100.0,
            fill_color: [180, 0, 200, 140],
            points,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Everything a dashboard page needs for one level and selector value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub level: SchoolLevel,
    /// Field the map extrudes; columns outside the field table map to the total.
    pub grade: Field,
    pub table: JoinedView,
    pub overview: Vec<BarSeries>,
    pub bars: BarSeries,
    pub map: ColumnMap,
}

impl Dashboard {
    /// `selector` is a source label or canonical key; `None` picks the last
    /// column. The bars chart any column of the level table; the map only
    /// knows the field table and charts the total for anything else.
    pub fn build(dataset: &Dataset, level: SchoolLevel, selector: Option<&str>) -> Self {
        let table = level_table(&dataset.schools, level);
        let column = selected_column(&table, selector);
        let grade = Field::select(&column);
        let joined = JoinedView::build(&table, &dataset.locations);
        Self {
            level,
            grade,
            overview: BarSeries::per_grade(&table),
            bars: BarSeries::new(&table, &column),
            map: ColumnMap::new(&joined, grade),
            table: joined,
        }
    }
}
