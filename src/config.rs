use std::path::PathBuf;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CACHE_DIR: &str = "geocode-cache";

#[derive(Clone, Debug)]
pub struct GeocoderConfig {
    pub geocode_endpoint: String,
    pub request_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub use_slug_keys: bool,
    pub google_maps_api_key: Option<SecretString>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicGeocoderConfig {
    pub geocode_endpoint: String,
    pub request_timeout_secs: u64,
    pub cache_dir: String,
    pub use_slug_keys: bool,
    pub has_google_maps_key: bool,
}

impl GeocoderConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            geocode_endpoint: env::var("GEOCODE_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEOCODE_ENDPOINT.to_string()),
            request_timeout_secs: parse_u64("GEOCODE_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            cache_dir: env::var("GEOCODE_CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            use_slug_keys: parse_bool("GEOCODE_SLUG_KEYS", false),
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
        }
    }

    pub fn public_profile(&self) -> PublicGeocoderConfig {
        PublicGeocoderConfig {
            geocode_endpoint: self.geocode_endpoint.clone(),
            request_timeout_secs: self.request_timeout_secs,
            cache_dir: self.cache_dir.to_string_lossy().to_string(),
            use_slug_keys: self.use_slug_keys,
            has_google_maps_key: self.google_maps_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
