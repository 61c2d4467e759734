pub mod aggregate;
pub mod cache;
pub mod config;
pub mod continent;
mod error;
pub mod feed;
pub mod group;
mod http;


use aggregate::{Aggregator, GroupLoader};
use cache::{Cache, KeyValueStore};
use config::ClientConfig;
use continent::{ContinentLookup, ContinentResolver, Freebase};
use feed::{FeedDiscoverer, FeedSource, HttpFeed};
use group::{GroupFetcher, MeetupApi};
use std::sync::Arc;

pub use aggregate::AggregateResult;
pub use error::{Error, ErrorKind, Result};
pub use group::Group;
pub use http::http_client;

/// Aggregates meetup groups discovered from the feed.
#[derive(Clone)]
pub struct MeetupClient {
    aggregator: Arc<Aggregator>,
}

impl MeetupClient {
    /// Client talking to the real Meetup API, feed and Freebase.
    pub fn new(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let http = http_client();
        let timeout = *config.http_timeout();

        let feed = HttpFeed::new(http.clone(), config.feed_url(), timeout);
        let fetcher = MeetupApi::new(
            http.clone(),
            config.group_url_template(),
            config.meetup_api_key(),
            timeout,
        );
        let lookup = Freebase::new(http, config.freebase_url(), config.freebase_key(), timeout);

        Self::with_sources(config, store, Arc::new(feed), Arc::new(fetcher), Arc::new(lookup))
    }

    /// Client over arbitrary collaborators.
    pub fn with_sources(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
        feed: Arc<dyn FeedSource>,
        fetcher: Arc<dyn GroupFetcher>,
        lookup: Arc<dyn ContinentLookup>,
    ) -> Self {
        let cache = Cache::new(store);
        let ttls = config.ttls().clone();

        let discoverer = FeedDiscoverer::new(feed, cache.clone(), ttls.ids);
        let resolver = ContinentResolver::new(
            config.forced_continents().clone(),
            cache.clone(),
            lookup,
            ttls.continent,
        );
        let loader = GroupLoader::new(fetcher, cache, ttls);

        Self {
            aggregator: Arc::new(Aggregator::new(
                discoverer,
                loader,
                resolver,
                config.fanout().clone(),
            )),
        }
    }

    /// See [`Aggregator::build_aggregate`].
    pub async fn build_aggregate(&self) -> Result<AggregateResult> {
        self.aggregator.build_aggregate().await
    }
}
