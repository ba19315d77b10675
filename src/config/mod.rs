//! Configuration module
//!
//! Settings are read from `config.toml` in the user's config directory.
//! Command line flags override them.

pub mod config;

pub use config::Config;
