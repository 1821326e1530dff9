use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::config::GeocoderConfig;
use crate::errors::{GeoError, GeoResult};

/// A successful lookup: the typed fields the pipeline cares about, plus the
/// raw response payload preserved opaquely for persistence and debugging.
#[derive(Debug, Clone)]
pub struct GeocodedPlace {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: Option<String>,
    pub place_id: Option<String>,
    pub location_type: Option<String>,
    pub global_plus_code: Option<String>,
    pub raw: Map<String, Value>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> GeoResult<GeocodedPlace>;
}

#[derive(Clone)]
pub struct GeocodingService {
    inner: Arc<dyn Geocoder>,
}

impl GeocodingService {
    pub fn new(config: &GeocoderConfig) -> GeoResult<Self> {
        let key = config.google_maps_api_key.clone().ok_or_else(|| {
            GeoError::Config("GOOGLE_MAPS_API_KEY is required for geocoding".into())
        })?;
        let client = HttpGeocoder::new(
            config.geocode_endpoint.clone(),
            key,
            config.request_timeout_secs,
        )?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    #[cfg(test)]
    pub fn from_geocoder(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { inner: geocoder }
    }

    pub async fn geocode(&self, query: &str) -> GeoResult<GeocodedPlace> {
        self.inner.geocode(query).await
    }
}

struct HttpGeocoder {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl HttpGeocoder {
    fn new(endpoint: String, api_key: SecretString, timeout_secs: u64) -> GeoResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, query: &str) -> GeoResult<GeocodedPlace> {
        #[derive(serde::Deserialize)]
        struct Response {
            status: String,
            #[serde(default)]
            results: Vec<Map<String, Value>>,
            error_message: Option<String>,
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("address", query), ("key", self.api_key.expose_secret())])
            .send()
            .await?
            .error_for_status()?;

        let parsed: Response = response.json().await?;
        if parsed.status != "OK" {
            let detail = parsed.error_message.unwrap_or(parsed.status);
            return Err(GeoError::Geocode(detail));
        }

        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GeoError::Geocode("response contained no results".into()))?;

        place_from_raw(result)
    }
}

fn place_from_raw(raw: Map<String, Value>) -> GeoResult<GeocodedPlace> {
    let location = raw.get("geometry").and_then(|g| g.get("location"));
    let latitude = location
        .and_then(|l| l.get("lat"))
        .and_then(Value::as_f64)
        .ok_or_else(|| GeoError::Geocode("result missing geometry.location.lat".into()))?;
    let longitude = location
        .and_then(|l| l.get("lng"))
        .and_then(Value::as_f64)
        .ok_or_else(|| GeoError::Geocode("result missing geometry.location.lng".into()))?;

    Ok(GeocodedPlace {
        latitude,
        longitude,
        formatted_address: string_field(raw.get("formatted_address")),
        place_id: string_field(raw.get("place_id")),
        location_type: string_field(raw.get("geometry").and_then(|g| g.get("location_type"))),
        global_plus_code: string_field(raw.get("plus_code").and_then(|p| p.get("global_code"))),
        raw,
    })
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}
