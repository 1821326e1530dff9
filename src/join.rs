use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::KeyedAddress;
use crate::errors::{GeoError, GeoResult};
use crate::table::AddressTable;

/// Columns appended to the original table by [`merge`], in output order.
pub const GEOCODED_COLUMNS: [&str; 8] = [
    "geocode",
    "geocode_hash",
    "google_formatted_address",
    "lat",
    "lng",
    "location_type",
    "place_id",
    "types",
];

/// One usable cache entry, flattened to the columns the join needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedRecord {
    pub geocode_hash: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_type: Option<String>,
    pub google_formatted_address: Option<String>,
    pub place_id: Option<String>,
    pub types: Vec<String>,
}

/// Load every cache entry in `cache_dir`, dropping error markers. An
/// unreadable directory, a malformed entry, or zero usable entries is a
/// setup problem and propagates.
pub fn load_all(cache_dir: &Path) -> GeoResult<Vec<GeocodedRecord>> {
    let mut records = Vec::new();
    for entry in fs::read_dir(cache_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let value: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let Value::Object(payload) = value else {
            return Err(GeoError::Parse(format!(
                "cache entry {} is not a JSON object",
                path.display()
            )));
        };
        if payload.contains_key("error") {
            debug!(key = stem, "skipping error marker");
            continue;
        }
        records.push(flatten(stem, &payload));
    }

    if records.is_empty() {
        return Err(GeoError::Cache(format!(
            "no usable geocoded entries in {}",
            cache_dir.display()
        )));
    }
    Ok(records)
}

fn flatten(key: &str, payload: &Map<String, Value>) -> GeocodedRecord {
    let geometry = payload.get("geometry");
    let location = geometry.and_then(|g| g.get("location"));
    GeocodedRecord {
        geocode_hash: key.to_string(),
        lat: location.and_then(|l| l.get("lat")).and_then(Value::as_f64),
        lng: location.and_then(|l| l.get("lng")).and_then(Value::as_f64),
        location_type: string_field(geometry.and_then(|g| g.get("location_type"))),
        google_formatted_address: string_field(payload.get("formatted_address")),
        place_id: string_field(payload.get("place_id")),
        types: payload
            .get("types")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Join cached results back onto the original rows. The dedup pairs are
/// left-joined against the loaded records on the cache key, then fanned out
/// onto every original row through `row_keys` (one entry per original row,
/// `None` where the address was null). Rows whose key matched only an error
/// marker, or no entry at all, keep nulls in every geocoded column.
pub fn merge(
    original: &AddressTable,
    row_keys: &[Option<KeyedAddress>],
    dedup: &[KeyedAddress],
    records: &[GeocodedRecord],
) -> GeoResult<AddressTable> {
    if row_keys.len() != original.len() {
        return Err(GeoError::Parse(format!(
            "have {} row keys for {} rows",
            row_keys.len(),
            original.len()
        )));
    }

    let by_hash: HashMap<&str, &GeocodedRecord> = records
        .iter()
        .map(|r| (r.geocode_hash.as_str(), r))
        .collect();
    let joined: HashMap<&str, Option<&GeocodedRecord>> = dedup
        .iter()
        .map(|pair| (pair.key.as_str(), by_hash.get(pair.key.as_str()).copied()))
        .collect();

    let mut columns = original.columns().to_vec();
    columns.extend(GEOCODED_COLUMNS.iter().map(|c| c.to_string()));
    let mut out = AddressTable::new(columns);

    for (index, keyed) in row_keys.iter().enumerate() {
        let mut cells = original
            .row(index)
            .map(|row| row.to_vec())
            .unwrap_or_default();
        let record = keyed
            .as_ref()
            .and_then(|k| joined.get(k.key.as_str()).copied().flatten());
        cells.push(cell(keyed.as_ref().map(|k| k.address.clone())));
        cells.push(cell(keyed.as_ref().map(|k| k.key.clone())));
        cells.push(cell(record.and_then(|r| r.google_formatted_address.clone())));
        cells.push(cell(record.and_then(|r| r.lat).map(|v| v.to_string())));
        cells.push(cell(record.and_then(|r| r.lng).map(|v| v.to_string())));
        cells.push(cell(record.and_then(|r| r.location_type.clone())));
        cells.push(cell(record.and_then(|r| r.place_id.clone())));
        cells.push(cell(record.and_then(|r| serialize_types(&r.types))));
        out.push_row(cells)?;
    }

    Ok(out)
}

fn cell(value: Option<String>) -> String {
    value.unwrap_or_default()
}

fn serialize_types(types: &[String]) -> Option<String> {
    if types.is_empty() {
        None
    } else {
        Some(serde_json::to_string(types).unwrap_or_default())
    }
}
