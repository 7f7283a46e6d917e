//! Configuration loading
//!
//! Reads [`habitflow_domain::Config`] from a TOML or JSON file and the
//! environment.

pub mod loader;

pub use loader::{
    apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths, validate,
};
