//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Start from the first config file found by [`probe_config_paths`], or
//!    from [`Config::default`] when there is none
//! 2. Apply environment variable overrides
//! 3. Validate the API base URL
//!
//! ## Environment Variables
//! - `HABITFLOW_API_URL`: API base URL
//! - `HABITFLOW_API_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `HABITFLOW_RENEW_BEFORE_EXPIRY_MS`: Renewal lead time
//! - `HABITFLOW_MIN_RENEWAL_DELAY_MS`: Floor for the renewal timer
//! - `HABITFLOW_STORAGE_PATH`: Session file; unset keeps it in memory
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./habitflow.toml` or `./habitflow.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use habitflow_domain::{Config, HabitflowError, Result};

pub const ENV_API_URL: &str = "HABITFLOW_API_URL";
pub const ENV_API_TIMEOUT_SECS: &str = "HABITFLOW_API_TIMEOUT_SECS";
pub const ENV_RENEW_BEFORE_EXPIRY_MS: &str = "HABITFLOW_RENEW_BEFORE_EXPIRY_MS";
pub const ENV_MIN_RENEWAL_DELAY_MS: &str = "HABITFLOW_MIN_RENEWAL_DELAY_MS";
pub const ENV_STORAGE_PATH: &str = "HABITFLOW_STORAGE_PATH";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["habitflow.toml", "habitflow.json", "config.toml", "config.json"];

/// Load configuration from the probed file (if any) and the environment
///
/// # Errors
/// Returns `HabitflowError::Config` if:
/// - A config file exists but cannot be read or parsed
/// - An environment variable holds an unparsable number
/// - The resulting API base URL is invalid
pub fn load() -> Result<Config> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Defaults plus environment overrides, ignoring config files
///
/// # Errors
/// Returns `HabitflowError::Config` if a variable is invalid
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports both JSON
/// and TOML formats (detected by file extension). Missing fields take their
/// defaults.
///
/// # Errors
/// Returns `HabitflowError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HabitflowError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            HabitflowError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HabitflowError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Overlay variables from `lookup` onto `config`
///
/// Empty values are ignored.
///
/// # Errors
/// Returns `HabitflowError::Config` if a numeric variable does not parse
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = get(ENV_API_URL) {
        config.api.base_url = url;
    }
    if let Some(raw) = get(ENV_API_TIMEOUT_SECS) {
        config.api.timeout_secs = parse_number(ENV_API_TIMEOUT_SECS, &raw)?;
    }
    if let Some(raw) = get(ENV_RENEW_BEFORE_EXPIRY_MS) {
        config.session.renew_before_expiry_ms = parse_number(ENV_RENEW_BEFORE_EXPIRY_MS, &raw)?;
    }
    if let Some(raw) = get(ENV_MIN_RENEWAL_DELAY_MS) {
        config.session.minimum_renewal_delay_ms = parse_number(ENV_MIN_RENEWAL_DELAY_MS, &raw)?;
    }
    if let Some(path) = get(ENV_STORAGE_PATH) {
        config.storage.path = Some(PathBuf::from(path));
    }

    Ok(())
}

/// Check values serde cannot
///
/// # Errors
/// Returns `HabitflowError::Config` if the base URL is not an absolute
/// http(s) URL or the timeout is zero
pub fn validate(config: &Config) -> Result<()> {
    let url = url::Url::parse(&config.api.base_url).map_err(|e| {
        HabitflowError::Config(format!("Invalid API base URL '{}': {e}", config.api.base_url))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HabitflowError::Config(format!(
            "Unsupported API URL scheme: {}",
            url.scheme()
        )));
    }
    if config.api.timeout_secs == 0 {
        return Err(HabitflowError::Config("API timeout must be greater than zero".to_string()));
    }
    Ok(())
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HabitflowError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HabitflowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(HabitflowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the working directory, then the executable's directory
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| HabitflowError::Config(format!("Invalid value for {key} ('{raw}'): {e}")))
}
