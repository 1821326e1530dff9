use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::GeoResult;
use crate::geocoder::GeocodingService;

/// One deduplicated (key, normalized address) pair awaiting a cache entry.
#[derive(Debug, Clone)]
pub struct KeyedAddress {
    pub key: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FillStats {
    pub total: usize,
    pub skipped: usize,
    pub geocoded: usize,
    pub failed: usize,
}

/// File-backed geocode cache: one `<key>.json` per address, holding either
/// the raw service payload or an `{"error": true}` marker. Entries are
/// written once and never overwritten; an error marker counts as settled,
/// not as a retry candidate.
pub struct GeocodeCache {
    dir: PathBuf,
    service: GeocodingService,
}

impl GeocodeCache {
    pub fn new(dir: impl Into<PathBuf>, service: GeocodingService) -> Self {
        Self {
            dir: dir.into(),
            service,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Keys that already have a cache file, error markers included.
    pub fn existing_keys(&self) -> GeoResult<HashSet<String>> {
        let mut keys = HashSet::new();
        if !self.dir.exists() {
            return Ok(keys);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.insert(stem.to_string());
            }
        }
        Ok(keys)
    }

    /// Geocode every pair that has no cache file yet, one request at a time.
    /// A failed lookup writes an error marker and moves on; afterwards every
    /// input key has exactly one file unless the process dies mid-call.
    pub async fn fill(&self, pairs: &[KeyedAddress]) -> GeoResult<FillStats> {
        let existing = self.existing_keys()?;
        let (cached, pending): (Vec<_>, Vec<_>) = pairs
            .iter()
            .partition(|pair| existing.contains(&pair.key));

        let mut stats = FillStats {
            total: pairs.len(),
            skipped: cached.len(),
            ..FillStats::default()
        };
        info!(
            "{} already geocoded, will geocode {} addresses",
            cached.len(),
            pending.len()
        );

        fs::create_dir_all(&self.dir)?;

        let total = pending.len();
        for (i, pair) in pending.into_iter().enumerate() {
            info!("{}/{} || {}: {}", i + 1, total, pair.key, pair.address);
            match self.service.geocode(&pair.address).await {
                Ok(place) => {
                    let mut payload = place.raw;
                    payload.insert("geocode".into(), Value::String(pair.address.clone()));
                    payload.insert("geocode_hash".into(), Value::String(pair.key.clone()));
                    self.write_entry(&pair.key, &Value::Object(payload))?;
                    stats.geocoded += 1;
                }
                Err(err) => {
                    warn!(%err, key = %pair.key, "lookup failed; writing error marker");
                    self.write_entry(&pair.key, &json!({ "error": true }))?;
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    fn write_entry(&self, key: &str, payload: &Value) -> GeoResult<()> {
        fs::write(self.entry_path(key), serde_json::to_vec(payload)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::errors::GeoError;
    use crate::geocoder::{GeocodedPlace, Geocoder};

    use super::*;

    struct ScriptedGeocoder {
        responses: Mutex<Vec<GeoResult<GeocodedPlace>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGeocoder {
        fn new(mut responses: Vec<GeoResult<GeocodedPlace>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn geocode(&self, query: &str) -> GeoResult<GeocodedPlace> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(place(query, 1.0, 2.0)))
        }
    }

    fn place(address: &str, lat: f64, lng: f64) -> GeocodedPlace {
        let raw = json!({
            "formatted_address": address,
            "geometry": { "location": { "lat": lat, "lng": lng } }
        })
        .as_object()
        .unwrap()
        .clone();
        GeocodedPlace {
            latitude: lat,
            longitude: lng,
            formatted_address: Some(address.to_string()),
            place_id: None,
            location_type: None,
            global_plus_code: None,
            raw,
        }
    }

    fn pair(key: &str, address: &str) -> KeyedAddress {
        KeyedAddress {
            key: key.into(),
            address: address.into(),
        }
    }

    #[tokio::test]
    async fn skips_existing_entries_without_calling_the_service() {
        let dir = tempdir().unwrap();
        let success = dir.path().join("abc.json");
        let marker = dir.path().join("def.json");
        std::fs::write(&success, r#"{"formatted_address":"kept"}"#).unwrap();
        std::fs::write(&marker, r#"{"error":true}"#).unwrap();

        let geocoder = ScriptedGeocoder::new(vec![]);
        let cache = GeocodeCache::new(
            dir.path(),
            GeocodingService::from_geocoder(geocoder.clone()),
        );

        let stats = cache
            .fill(&[pair("abc", "123 MAIN ST"), pair("def", "NOWHERE")])
            .await
            .unwrap();

        assert_eq!(geocoder.calls(), 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.geocoded, 0);
        assert_eq!(
            std::fs::read_to_string(&success).unwrap(),
            r#"{"formatted_address":"kept"}"#
        );
        assert_eq!(
            std::fs::read_to_string(&marker).unwrap(),
            r#"{"error":true}"#
        );
    }

    #[tokio::test]
    async fn writes_one_file_per_pending_pair() {
        let dir = tempdir().unwrap();
        let geocoder = ScriptedGeocoder::new(vec![
            Ok(place("123 MAIN ST", 39.78, -89.65)),
            Ok(place("456 OAK AVE", 41.88, -87.63)),
        ]);
        let cache = GeocodeCache::new(
            dir.path().join("nested"),
            GeocodingService::from_geocoder(geocoder.clone()),
        );

        let pairs = [pair("k1", "123 MAIN ST"), pair("k2", "456 OAK AVE")];
        let stats = cache.fill(&pairs).await.unwrap();

        assert_eq!(stats.geocoded, 2);
        assert_eq!(geocoder.calls(), 2);
        for p in &pairs {
            let body = std::fs::read_to_string(cache.entry_path(&p.key)).unwrap();
            let value: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(value["geocode"], p.address);
            assert_eq!(value["geocode_hash"], p.key);
            assert!(value["geometry"]["location"]["lat"].is_f64());
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let dir = tempdir().unwrap();
        let geocoder = ScriptedGeocoder::new(vec![
            Ok(place("FIRST", 1.0, 1.0)),
            Err(GeoError::Geocode("ZERO_RESULTS".into())),
            Ok(place("THIRD", 3.0, 3.0)),
        ]);
        let cache = GeocodeCache::new(
            dir.path(),
            GeocodingService::from_geocoder(geocoder.clone()),
        );

        let pairs = [
            pair("k1", "FIRST"),
            pair("k2", "SECOND"),
            pair("k3", "THIRD"),
        ];
        let stats = cache.fill(&pairs).await.unwrap();

        assert_eq!(geocoder.calls(), 3);
        assert_eq!(stats.geocoded, 2);
        assert_eq!(stats.failed, 1);
        for p in &pairs {
            assert!(cache.entry_path(&p.key).exists());
        }
        assert_eq!(
            std::fs::read_to_string(cache.entry_path("k2")).unwrap(),
            r#"{"error":true}"#
        );
    }

    #[tokio::test]
    async fn error_markers_are_settled_not_retried() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("k1.json"), r#"{"error":true}"#).unwrap();

        let geocoder = ScriptedGeocoder::new(vec![]);
        let cache = GeocodeCache::new(
            dir.path(),
            GeocodingService::from_geocoder(geocoder.clone()),
        );

        let stats = cache.fill(&[pair("k1", "FAILED BEFORE")]).await.unwrap();

        assert_eq!(geocoder.calls(), 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
    }
}
