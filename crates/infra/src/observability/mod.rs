//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; the embedding application calls
//! [`init_tracing`] once at startup. The level is taken from `RUST_LOG` and
//! defaults to `info`.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for terminals
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// `json` selects [`LogFormat::Json`]; anything else is pretty
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Install the global subscriber
///
/// # Errors
/// Fails if a global subscriber is already installed
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(?format, "Tracing initialized");
    Ok(())
}
