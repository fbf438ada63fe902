//! Shared utility functions used across the codebase.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::ConfigError;

/// Return the value of `$HOME`, falling back to `/root`.
pub fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "/root".to_string())
}

/// Expand a leading `~` or `~/` to the home directory.
///
/// `~user` forms are left untouched.
pub fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, &home_dir())
}

fn expand_tilde_with(path: &str, home: &str) -> PathBuf {
    if path == "~" {
        PathBuf::from(home)
    } else if let Some(rest) = path.strip_prefix("~/") {
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Parse an environment variable, returning `default` if unset or blank.
pub fn env_var_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => parse_value(name, &value),
        _ => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
