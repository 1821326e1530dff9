mod cache;
mod config;
mod errors;
mod geocoder;
mod join;
mod key;
mod pipeline;
mod table;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use cache::{FillStats, GeocodeCache, KeyedAddress};
pub use config::{GeocoderConfig, PublicGeocoderConfig};
pub use errors::{GeoError, GeoResult};
pub use geocoder::{GeocodedPlace, Geocoder, GeocodingService};
pub use join::{load_all, merge, GeocodedRecord, GEOCODED_COLUMNS};
pub use key::{derive_key, normalize};
pub use pipeline::geocode_table;
pub use table::AddressTable;

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,batch_geocoder=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
