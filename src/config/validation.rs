//! Configuration validation.

use url::{Host, Url};

/// Temperature range accepted by the realtime API.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

/// Validate the transcript webhook URL.
///
/// Must be http(s) with a host; plain http is accepted only for loopback
/// targets.
pub fn validate_webhook_url(url: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(raw) = url else {
        return Ok(());
    };

    let parsed = Url::parse(raw).map_err(|e| format!("Invalid FRONTEND_WEBHOOK_URL '{raw}': {e}"))?;

    let host = parsed
        .host()
        .ok_or_else(|| format!("FRONTEND_WEBHOOK_URL '{raw}' has no host"))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&host) => Ok(()),
        "http" => Err(format!(
            "FRONTEND_WEBHOOK_URL '{raw}' must use https for non-local hosts"
        )
        .into()),
        other => Err(format!("FRONTEND_WEBHOOK_URL scheme '{other}' is not supported").into()),
    }
}

fn is_loopback(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(addr) => addr.is_loopback(),
        Host::Ipv6(addr) => addr.is_loopback(),
    }
}

/// Validate the sampling temperature.
pub fn validate_temperature(temperature: f32) -> Result<(), Box<dyn std::error::Error>> {
    if TEMPERATURE_RANGE.contains(&temperature) {
        Ok(())
    } else {
        Err(format!(
            "OPENAI_TEMPERATURE must be between {} and {}, got {temperature}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end()
        )
        .into())
    }
}

/// Validate webhook retry and queue settings.
pub fn validate_webhook_delivery(
    max_attempts: u32,
    queue_capacity: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if max_attempts == 0 {
        return Err("WEBHOOK_MAX_ATTEMPTS must be at least 1".into());
    }
    if queue_capacity == 0 {
        return Err("WEBHOOK_QUEUE_CAPACITY must be at least 1".into());
    }
    Ok(())
}

/// Validate the per-client rate limit.
///
/// Both values must be at least 1; rates of 100000 and above switch the
/// limiter off.
pub fn validate_rate_limit(
    requests_per_second: u32,
    burst_size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if requests_per_second == 0 {
        return Err("RATE_LIMIT_REQUESTS_PER_SECOND must be at least 1".into());
    }
    if burst_size == 0 {
        return Err("RATE_LIMIT_BURST_SIZE must be at least 1".into());
    }
    Ok(())
}

/// Validate the realtime endpoint URL.
pub fn validate_realtime_url(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid OPENAI_REALTIME_URL '{url}': {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!("OPENAI_REALTIME_URL scheme '{other}' must be ws or wss").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_rules() {
        assert!(validate_webhook_url(&None).is_ok());
        assert!(validate_webhook_url(&Some("https://hooks.example.com/x".to_string())).is_ok());
        assert!(validate_webhook_url(&Some("http://localhost:3000/api/webhook".to_string())).is_ok());
        assert!(validate_webhook_url(&Some("http://127.0.0.1:3000/api".to_string())).is_ok());
        assert!(validate_webhook_url(&Some("http://[::1]:3000/api".to_string())).is_ok());
        assert!(validate_webhook_url(&Some("http://hooks.example.com/x".to_string())).is_err());
        assert!(validate_webhook_url(&Some("ftp://hooks.example.com/x".to_string())).is_err());
        assert!(validate_webhook_url(&Some("not a url".to_string())).is_err());
    }

    #[test]
    fn test_temperature_range() {
        assert!(validate_temperature(0.8).is_ok());
        assert!(validate_temperature(0.6).is_ok());
        assert!(validate_temperature(1.2).is_ok());
        assert!(validate_temperature(0.2).is_err());
        assert!(validate_temperature(1.5).is_err());
    }

    #[test]
    fn test_webhook_delivery_limits() {
        assert!(validate_webhook_delivery(3, 1024).is_ok());
        assert!(validate_webhook_delivery(0, 1024).is_err());
        assert!(validate_webhook_delivery(1, 0).is_err());
    }

    #[test]
    fn test_rate_limit_bounds() {
        assert!(validate_rate_limit(60, 10).is_ok());
        assert!(validate_rate_limit(1, 1).is_ok());
        assert!(validate_rate_limit(100_000, 1).is_ok());
        assert!(validate_rate_limit(0, 10).is_err());
        assert!(validate_rate_limit(60, 0).is_err());
    }

    #[test]
    fn test_realtime_url_scheme() {
        assert!(validate_realtime_url("wss://api.openai.com/v1/realtime").is_ok());
        assert!(validate_realtime_url("ws://127.0.0.1:9000").is_ok());
        assert!(validate_realtime_url("https://api.openai.com").is_err());
    }
}
