use std::collections::HashSet;

use tracing::info;

use crate::cache::{GeocodeCache, KeyedAddress};
use crate::config::GeocoderConfig;
use crate::errors::{GeoError, GeoResult};
use crate::geocoder::GeocodingService;
use crate::join;
use crate::key;
use crate::table::AddressTable;

/// Run the full batch: normalize and key every address, fill the cache for
/// the misses, then join the cached results back onto the original rows.
/// The output keeps the input's row count and order; rows with a null
/// address come back with nulls in every geocoded column.
pub async fn geocode_table(
    table: &AddressTable,
    address_col: &str,
    config: &GeocoderConfig,
    service: GeocodingService,
) -> GeoResult<AddressTable> {
    let address_idx = table.column_index(address_col).ok_or_else(|| {
        GeoError::Config(format!("input table has no column named {address_col}"))
    })?;

    let row_keys: Vec<Option<KeyedAddress>> = (0..table.len())
        .map(|row| {
            table.value(row, address_idx).map(|address| {
                let normalized = key::normalize(address);
                let hash = key::derive_key(&normalized, config.use_slug_keys);
                KeyedAddress {
                    key: hash,
                    address: normalized,
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let dedup: Vec<KeyedAddress> = row_keys
        .iter()
        .flatten()
        .filter(|pair| seen.insert(pair.address.clone()))
        .cloned()
        .collect();
    info!(
        rows = table.len(),
        unique = dedup.len(),
        "geocoding {} addresses",
        dedup.len()
    );

    let cache = GeocodeCache::new(config.cache_dir.clone(), service);
    let stats = cache.fill(&dedup).await?;
    info!(
        skipped = stats.skipped,
        geocoded = stats.geocoded,
        failed = stats.failed,
        "cache fill done"
    );

    let records = join::load_all(&config.cache_dir)?;
    join::merge(table, &row_keys, &dedup, &records)
}
