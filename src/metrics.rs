use lazy_static::lazy_static;
use prometheus::{Gauge, register_gauge};

use crate::cache::ResponseCache;

// Chat path counters live next to the chat handler; only the cache gauge is
// shared between startup and request handling.
lazy_static! {
    static ref CACHE_SIZE: Gauge =
        register_gauge!("gateway_cache_size", "Current number of items in cache").unwrap();
}

pub fn record_cache_size(cache: &dyn ResponseCache) {
    CACHE_SIZE.set(cache.len() as f64);
}
