//! Field parsers shared by the environment loader.

use std::net::IpAddr;
use std::time::Duration;

use crate::defaults::MIN_HANDLE_SECRET_LEN;
use crate::error::{ConfigError, ConfigResult};

/// Parse a listener IP.
///
/// # Errors
///
/// Returns `InvalidField` when the value is not an IPv4 or IPv6 address.
pub fn parse_bind_addr(field: &'static str, raw: &str) -> ConfigResult<IpAddr> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, Some(raw), "invalid_ip"))
}

/// Parse a TCP port in `1..=65535`.
///
/// # Errors
///
/// Returns `InvalidField` for non-numeric or out-of-range values.
pub fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let port: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, Some(raw), "not_a_number"))?;
    if !(1..=65_535).contains(&port) {
        return Err(ConfigError::invalid(field, Some(raw), "out_of_range"));
    }
    u16::try_from(port).map_err(|_| ConfigError::invalid(field, Some(raw), "out_of_range"))
}

/// Parse a whole number of seconds.
///
/// # Errors
///
/// Returns `InvalidField` for non-numeric values, or for zero when
/// `allow_zero` is false.
pub fn parse_seconds(field: &'static str, raw: &str, allow_zero: bool) -> ConfigResult<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, Some(raw), "not_a_number"))?;
    if secs == 0 && !allow_zero {
        return Err(ConfigError::invalid(field, Some(raw), "must_be_positive"));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate a handle signing secret. The value is never echoed in errors.
///
/// # Errors
///
/// Returns `InvalidField` when the secret is shorter than the minimum length.
pub fn validate_secret(field: &'static str, raw: &str) -> ConfigResult<String> {
    if raw.len() < MIN_HANDLE_SECRET_LEN {
        return Err(ConfigError::invalid(field, None, "too_short"));
    }
    Ok(raw.to_string())
}

/// Validate an optional log format name.
///
/// # Errors
///
/// Returns `InvalidField` for anything other than `json` or `pretty`.
pub fn parse_log_format(field: &'static str, raw: &str) -> ConfigResult<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "json" | "pretty" => Ok(normalized),
        _ => Err(ConfigError::invalid(field, Some(raw), "unknown_format")),
    }
}
