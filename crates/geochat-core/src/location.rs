//! One-shot position lookup
//!
//! A terminal has no permission-gated geolocation, so the capability is a
//! trait: fixed coordinates, an IP-based lookup, or nothing at all.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, GeolocationMode};
use crate::error::LocationError;
use crate::state::UserLocation;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Read the current position once
    async fn current_position(&self) -> Result<UserLocation, LocationError>;
}

/// Coordinates supplied by the user
pub struct FixedLocation(pub UserLocation);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<UserLocation, LocationError> {
        let UserLocation { latitude, longitude } = self.0;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::Denied(format!(
                "coordinates out of range ({}, {})",
                latitude, longitude
            )));
        }
        Ok(self.0)
    }
}

/// No capability on this host
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_position(&self) -> Result<UserLocation, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Approximate position from a public IP geolocation service
#[derive(Clone)]
pub struct IpLocation {
    client: Client,
    url: String,
}

/// Accepts both `latitude/longitude` and `lat/lon` style payloads
#[derive(Deserialize)]
struct IpLookupResponse {
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon")]
    longitude: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default, alias = "message")]
    reason: Option<String>,
}

impl IpLocation {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    fn parse(body: &str) -> Result<UserLocation, LocationError> {
        let response: IpLookupResponse = serde_json::from_str(body)
            .map_err(|e| LocationError::Unavailable(format!("unreadable lookup response: {}", e)))?;

        let refused = matches!(response.error, Some(serde_json::Value::Bool(true)))
            || matches!(response.error, Some(serde_json::Value::String(_)))
            || response.status.as_deref() == Some("fail");
        if refused {
            let reason = response
                .reason
                .or_else(|| response.error.as_ref().and_then(|e| e.as_str().map(str::to_string)))
                .unwrap_or_else(|| "lookup refused".to_string());
            return Err(LocationError::Denied(reason));
        }

        match (response.latitude, response.longitude) {
            (Some(latitude), Some(longitude)) => Ok(UserLocation { latitude, longitude }),
            _ => Err(LocationError::Unavailable(
                "lookup response had no coordinates".to_string(),
            )),
        }
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn current_position(&self) -> Result<UserLocation, LocationError> {
        debug!(url = %self.url, "looking up position");

        let response = self
            .client
            .get(&self.url)
            .header("User-Agent", concat!("geochat/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "position lookup failed");
            return Err(LocationError::Unavailable(format!("lookup failed with status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;
        Self::parse(&body)
    }
}

/// Pick the provider the config asks for
pub fn provider_from_config(config: &Config) -> Box<dyn LocationProvider> {
    match &config.geolocation {
        GeolocationMode::Auto => Box::new(IpLocation::new(&config.ip_lookup_url)),
        GeolocationMode::Fixed { latitude, longitude } => Box::new(FixedLocation(UserLocation {
            latitude: *latitude,
            longitude: *longitude,
        })),
        GeolocationMode::Off => Box::new(NoLocation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_location() {
        let provider = FixedLocation(UserLocation { latitude: 37.77, longitude: -122.41 });
        let location = provider.current_position().await.unwrap();
        assert_eq!(location, UserLocation { latitude: 37.77, longitude: -122.41 });
    }

    #[tokio::test]
    async fn test_fixed_location_out_of_range() {
        let provider = FixedLocation(UserLocation { latitude: 137.0, longitude: 0.0 });
        assert!(matches!(provider.current_position().await, Err(LocationError::Denied(_))));
    }

    #[tokio::test]
    async fn test_disabled_is_unsupported() {
        assert_eq!(NoLocation.current_position().await, Err(LocationError::Unsupported));
    }

    #[test]
    fn test_parse_ipapi_payload() {
        let location = IpLocation::parse(r#"{"ip": "1.2.3.4", "latitude": 37.77, "longitude": -122.41}"#).unwrap();
        assert_eq!(location, UserLocation { latitude: 37.77, longitude: -122.41 });

        let location = IpLocation::parse(r#"{"status": "success", "lat": 51.5, "lon": -0.12}"#).unwrap();
        assert_eq!(location, UserLocation { latitude: 51.5, longitude: -0.12 });
    }

    #[test]
    fn test_parse_refusal_keeps_reason() {
        let err = IpLocation::parse(r#"{"error": true, "reason": "RateLimited"}"#).unwrap_err();
        assert_eq!(err, LocationError::Denied("RateLimited".to_string()));

        let err = IpLocation::parse(r#"{"status": "fail", "message": "reserved range"}"#).unwrap_err();
        assert_eq!(err, LocationError::Denied("reserved range".to_string()));
    }

    #[test]
    fn test_parse_without_coordinates() {
        assert!(matches!(IpLocation::parse("{}"), Err(LocationError::Unavailable(_))));
        assert!(matches!(IpLocation::parse("<html>"), Err(LocationError::Unavailable(_))));
    }

    #[test]
    fn test_provider_selection() {
        let mut config = Config::new();
        config.geolocation = GeolocationMode::Off;
        let provider = provider_from_config(&config);
        let rt = tokio::runtime::Runtime::new().unwrap();
        assert_eq!(rt.block_on(provider.current_position()), Err(LocationError::Unsupported));
    }
}
