//! Parsing helpers shared by the environment and YAML loaders.

use std::str::FromStr;

/// Parse a boolean from common string forms.
///
/// Accepts `true/false`, `1/0`, `yes/no`, `on/off` (case-insensitive).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read an environment variable, treating empty values as unset.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an environment variable.
///
/// Returns `Ok(None)` when unset and an error naming the variable when the
/// value does not parse.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: '{raw}' ({e})").into()),
        None => Ok(None),
    }
}

/// Read a boolean environment variable.
pub fn env_bool(key: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_string(key) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid boolean for {key}: '{raw}'").into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_env_parse() {
        unsafe {
            std::env::set_var("CALLBRIDGE_TEST_NUMBER", "42");
            std::env::set_var("CALLBRIDGE_TEST_BAD", "forty");
            std::env::set_var("CALLBRIDGE_TEST_EMPTY", "  ");
        }

        assert_eq!(env_parse::<u16>("CALLBRIDGE_TEST_NUMBER").unwrap(), Some(42));
        let err = env_parse::<u16>("CALLBRIDGE_TEST_BAD").unwrap_err();
        assert!(err.to_string().contains("CALLBRIDGE_TEST_BAD"));
        assert_eq!(env_parse::<u16>("CALLBRIDGE_TEST_EMPTY").unwrap(), None);
        assert_eq!(env_string("CALLBRIDGE_TEST_UNSET_XYZ"), None);

        unsafe {
            std::env::remove_var("CALLBRIDGE_TEST_NUMBER");
            std::env::remove_var("CALLBRIDGE_TEST_BAD");
            std::env::remove_var("CALLBRIDGE_TEST_EMPTY");
        }
    }
}
