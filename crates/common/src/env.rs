use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid value `{value}` for {key}: {reason}")]
pub struct EnvError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Non-empty value of an environment variable.
pub fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|e| EnvError {
            key: key.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}

pub fn parse_flag(key: &str, raw: Option<String>, default: bool) -> Result<bool, EnvError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
        Some(v) => Err(EnvError {
            key: key.to_string(),
            value: v,
            reason: "expected true or false".to_string(),
        }),
    }
}
