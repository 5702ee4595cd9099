use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use imabari_schools::{
    view::{Dashboard, SchoolLevel},
    App, Config,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Enrollment and location data for Imabari's municipal schools"
)]
struct Args {
    /// YAML config file; unset keys use built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// `elementary` or `middle`
    #[arg(short, long, default_value = "elementary")]
    level: SchoolLevel,
    /// Column to chart: a source label (`3年`, `計`) or key (`gr3`, `total`)
    #[arg(short, long)]
    grade: Option<String>,
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    format: Format,
    /// Fail if an enrollment page has no aggregate row
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,imabari_schools=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) configure ────────────────────────────────────────────────
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if args.strict {
        config.strict_total_row = true;
    }
    let app = App::new(config).context("building HTTP client")?;

    // ─── 3) load (cached for the life of `app`) ──────────────────────
    let dataset = app
        .dataset()
        .await
        .context("loading school data; nothing to show")?;
    info!(
        schools = dataset.schools.len(),
        locations = dataset.locations.len(),
        "loaded"
    );

    // ─── 4) build the view ───────────────────────────────────────────
    let dashboard = Dashboard::build(&dataset, args.level, args.grade.as_deref());
    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
        Format::Table => print_table(&dashboard),
    }
    Ok(())
}

fn print_table(d: &Dashboard) {
    println!(
        "# {} ({})  selected: {}  map: {}",
        d.level,
        d.level.suffix(),
        d.bars.column,
        d.grade
    );

    let mut header = vec!["name".to_string()];
    header.extend(d.table.columns.iter().cloned());
    header.extend(["address", "lat", "lon"].map(String::from));
    println!("{}", header.join("\t"));

    let blank = || "".to_string();
    for row in &d.table.rows {
        let mut line = vec![row.name.clone()];
        line.extend(d.table.columns.iter().map(|c| {
            row.counts
                .get(c)
                .copied()
                .flatten()
                .map_or_else(blank, |v| v.to_string())
        }));
        line.push(row.address.clone().unwrap_or_else(blank));
        line.push(row.lat.map_or_else(blank, |v| v.to_string()));
        line.push(row.lon.map_or_else(blank, |v| v.to_string()));
        println!("{}", line.join("\t"));
    }

    if d.map.view.is_none() {
        println!("(no coordinates for any {} school)", d.level);
    }
}
