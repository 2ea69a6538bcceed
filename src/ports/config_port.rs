//! Configuration access port trait.

use crate::domain::error::TradesimError;

/// Read-only access to sectioned key/value configuration.
///
/// The typed getters return `default` only when the key is absent. A value
/// that is present but does not parse is `ConfigInvalid`.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, TradesimError> {
        parse_or(self.get_string(section, key), section, key, default, |v| {
            v.parse::<i64>().ok()
        })
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, TradesimError> {
        parse_or(self.get_string(section, key), section, key, default, |v| {
            v.parse::<f64>().ok()
        })
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, TradesimError> {
        parse_or(self.get_string(section, key), section, key, default, parse_bool)
    }
}

/// `true`/`yes`/`1`/`on` and `false`/`no`/`0`/`off`, case-insensitive.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<T>(
    value: Option<String>,
    section: &str,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, TradesimError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    parse(raw.trim()).ok_or_else(|| TradesimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("cannot parse '{raw}' as {}", std::any::type_name::<T>()),
    })
}
