use crate::models::context::ContextPointer;
use log::info;
use meetup_client::cache::CacheStats;
use rocket::serde::json::Json;
use rocket::{delete, get, State};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub cache_stats: CacheStats,
    pub cache_enabled: bool,
}

/// Get current cache statistics
#[get("/cache/stats")]
pub fn cache_stats(context: &State<ContextPointer>) -> Json<CacheStatsResponse> {
    let store = context.store();

    Json(CacheStatsResponse {
        cache_stats: store.stats(),
        cache_enabled: store.config.enabled,
    })
}

/// Clear the cache (useful for debugging/admin)
#[delete("/cache")]
pub fn clear_cache(context: &State<ContextPointer>) -> Json<bool> {
    info!("Cache clear requested");
    context.store().clear();
    Json(true)
}
