// service/geocoding.rs
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::utils::geo::GeoPoint;

const NOMINATIM_SEARCH: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "shrambandhu_app_v1";

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoder returned an unusable coordinate: {0}")]
    BadCoordinate(String),
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    http: reqwest::Client,
}

impl Geocoder {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn lookup(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let places: Vec<NominatimPlace> = self
            .http
            .get(NOMINATIM_SEARCH)
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        parse_place(&place).map(Some)
    }

    /// Best-effort address lookup; errors are logged and read as "not found".
    pub async fn geocode(&self, address: &str) -> Option<GeoPoint> {
        if address.trim().is_empty() {
            return None;
        }

        match self.lookup(address).await {
            Ok(point) => point,
            Err(e) => {
                tracing::error!("Geocoding '{}' failed: {}", address, e);
                None
            }
        }
    }
}

fn parse_place(place: &NominatimPlace) -> Result<GeoPoint, GeocodeError> {
    let lat = place
        .lat
        .parse::<f64>()
        .map_err(|_| GeocodeError::BadCoordinate(place.lat.clone()))?;
    let lng = place
        .lon
        .parse::<f64>()
        .map_err(|_| GeocodeError::BadCoordinate(place.lon.clone()))?;
    Ok(GeoPoint::new(lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_place() {
        let place: Vec<NominatimPlace> =
            serde_json::from_str(r#"[{"lat":"17.385044","lon":"78.486671","display_name":"Hyderabad"}]"#).unwrap();
        let point = parse_place(&place[0]).unwrap();
        assert!((point.lat - 17.385044).abs() < 1e-9);
        assert!((point.lng - 78.486671).abs() < 1e-9);

        let bad = NominatimPlace { lat: "north".into(), lon: "1".into() };
        assert!(parse_place(&bad).is_err());
    }

    #[tokio::test]
    async fn test_blank_address_skips_lookup() {
        let geocoder = Geocoder::new(reqwest::Client::new());
        assert!(geocoder.geocode("   ").await.is_none());
    }
}
