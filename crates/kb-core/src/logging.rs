//! Process-wide tracing setup. Binaries call `init` once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Install the fmt subscriber. `RUST_LOG` takes precedence over the
/// configured filter. Returns an error if a subscriber is already set.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.filter))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if settings.json {
        builder.json().try_init().map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
    }
}
