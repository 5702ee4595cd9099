pub mod coerce;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fields;
pub mod loader;
pub mod table;
pub mod view;

pub use config::Config;
pub use error::LoadError;
pub use loader::{App, Dataset, DatasetCache};

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,imabari_schools=debug")),
        )
        .with_test_writer()
        .finish();
    // another test may already have set it
    let _ = tracing::subscriber::set_global_default(subscriber);
}
