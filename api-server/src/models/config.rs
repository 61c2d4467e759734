use chrono::Duration;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use getset::Getters;
use meetup_client::cache::StoreConfig;
use meetup_client::config::{
    default_forced_continents, CacheTtls, ClientConfig, FanoutConfig, DEFAULT_FEED_URL,
    DEFAULT_FREEBASE_URL, DEFAULT_GROUP_URL_TEMPLATE,
};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use simplelog::LevelFilter;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;

pub const CONFIG_PATH: &str = "Config.yaml";
pub const ENV_PREFIX: &str = "MEETUP_";

#[serde_inline_default]
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct Config {
    #[serde(default)]
    api_key: String,
    #[serde_inline_default(DEFAULT_GROUP_URL_TEMPLATE.to_string())]
    group_url_template: String,
    #[serde_inline_default(DEFAULT_FEED_URL.to_string())]
    feed_url: String,
    #[serde_inline_default(DEFAULT_FREEBASE_URL.to_string())]
    freebase_url: String,
    #[serde(default)]
    freebase_key: String,
    /// Country code to continent, checked before anything else
    #[serde_inline_default(default_forced_continents())]
    forced_continents: HashMap<String, String>,

    #[serde_inline_default(24 * 60 * 60)]
    ids_ttl_secs: i64,
    #[serde_inline_default(24 * 60 * 60)]
    group_ttl_secs: i64,
    #[serde_inline_default(60 * 60)]
    failure_ttl_secs: i64,
    #[serde_inline_default(30 * 24 * 60 * 60)]
    continent_ttl_secs: i64,
    #[serde_inline_default(1000)]
    cache_max_entries: usize,
    /// When off every lookup misses and nothing is stored
    #[serde_inline_default(true)]
    cache_enabled: bool,

    #[serde_inline_default(16)]
    max_concurrency: usize,
    #[serde_inline_default(20)]
    request_deadline_secs: u64,
    #[serde_inline_default(10)]
    http_timeout_secs: u64,

    #[serde_inline_default("info".to_string())]
    log_level: String,
}

impl Config {
    /// Yaml file if present, overridden by `MEETUP_` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["forced_continents"]))
    }

    pub fn log_level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_entries: self.cache_max_entries,
            enabled: self.cache_enabled,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_key, &self.freebase_key)
            .with_group_url_template(&self.group_url_template)
            .with_feed_url(&self.feed_url)
            .with_freebase_url(&self.freebase_url)
            .with_forced_continents(self.forced_continents.clone())
            .with_ttls(CacheTtls {
                ids: Duration::seconds(self.ids_ttl_secs),
                group: Duration::seconds(self.group_ttl_secs),
                failure: Duration::seconds(self.failure_ttl_secs),
                continent: Duration::seconds(self.continent_ttl_secs),
            })
            .with_fanout(FanoutConfig {
                max_concurrency: self.max_concurrency,
                request_deadline: StdDuration::from_secs(self.request_deadline_secs),
            })
            .with_http_timeout(StdDuration::from_secs(self.http_timeout_secs))
    }
}
