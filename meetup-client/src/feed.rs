use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::http;
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use surf::Client;
use url::Url;

pub const GUIDS_KEY: &str = "guids";

/// Source of the raw feed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self) -> Result<String>;
}

pub struct HttpFeed {
    http: Client,
    url: String,
    timeout: StdDuration,
}

impl HttpFeed {
    pub fn new(http: Client, url: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch_feed(&self) -> Result<String> {
        let res = http::get(&self.http, &self.url, self.timeout, "fetch xml feed").await?;
        if !res.status.is_success() {
            return Err(Error::transport("fetch xml feed", res.status));
        }
        Ok(res.body)
    }
}

#[derive(Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Deserialize)]
struct Channel {
    #[serde(default, rename = "item")]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    guid: Option<Guid>,
}

#[derive(Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Group id carried by a feed item url, the last non-empty path segment.
pub fn group_id(item_url: &str) -> Option<String> {
    let url = Url::parse(item_url.trim()).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Extract group ids from an RSS document. Items without a usable url are
/// skipped.
pub fn parse_feed(body: &str) -> Result<Vec<String>> {
    let rss: Rss = quick_xml::de::from_str(body).map_err(|e| Error::decode("decode xml feed", e))?;

    let mut ids = Vec::with_capacity(rss.channel.items.len());
    for item in rss.channel.items {
        let guid = item.guid.map(|g| g.value).unwrap_or_default();
        match group_id(&guid) {
            Some(id) => ids.push(id),
            None => log::warn!("bad url {:?}: no group id", guid),
        }
    }
    Ok(ids)
}

/// Finds the groups to aggregate, the list is cached as a whole.
pub struct FeedDiscoverer {
    source: Arc<dyn FeedSource>,
    cache: Cache,
    ttl: Duration,
}

impl FeedDiscoverer {
    pub fn new(source: Arc<dyn FeedSource>, cache: Cache, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }

    /// Cached ids are returned as is until they expire, the feed is not
    /// consulted in the meantime.
    pub async fn discover_ids(&self) -> Result<Vec<String>> {
        if let Some(ids) = self.cache.get::<Vec<String>>(GUIDS_KEY).await {
            return Ok(ids);
        }

        let body = self.source.fetch_feed().await?;
        let ids = parse_feed(&body)?;
        log::info!("Discovered {} groups from feed", ids.len());

        self.cache.set(GUIDS_KEY, &ids, self.ttl).await;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::tests::{FailingStore, StaticFeed, FEED};
    use crate::ErrorKind;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_group_id_takes_last_segment() {
        assert_eq!(group_id("http://www.meetup.com/golangsf/").as_deref(), Some("golangsf"));
        assert_eq!(group_id("http://www.meetup.com/golangsv").as_deref(), Some("golangsv"));
        assert_eq!(group_id("http://www.meetup.com/a/b/").as_deref(), Some("b"));
        assert_eq!(group_id("http://www.meetup.com/"), None);
        assert_eq!(group_id("not a url"), None);
    }

    #[test]
    fn test_parse_feed_skips_bad_items() {
        let ids = parse_feed(FEED).unwrap();
        assert_eq!(ids, vec!["golangsf", "golangsv", "golangsf"]);
    }

    #[test]
    fn test_parse_feed_rejects_non_rss() {
        let err = parse_feed("{\"not\": \"xml\"}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_ids_are_cached_for_a_day() {
        let source = Arc::new(StaticFeed::ok(FEED));
        let cache = Cache::new(Arc::new(MemoryStore::default()));
        let discoverer = FeedDiscoverer::new(source.clone(), cache.clone(), Duration::hours(24));

        let first = discoverer.discover_ids().await.unwrap();
        let second = discoverer.discover_ids().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get::<Vec<String>>(GUIDS_KEY).await, Some(first));
    }

    #[tokio::test]
    async fn test_transport_failure_is_propagated() {
        let source = Arc::new(StaticFeed::failing("connection refused"));
        let discoverer = FeedDiscoverer::new(
            source,
            Cache::new(Arc::new(MemoryStore::default())),
            Duration::hours(24),
        );

        let err = discoverer.discover_ids().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_broken_cache_still_discovers() {
        let source = Arc::new(StaticFeed::ok(FEED));
        let cache = Cache::new(Arc::new(FailingStore));
        let discoverer = FeedDiscoverer::new(source.clone(), cache, Duration::hours(24));

        assert_eq!(discoverer.discover_ids().await.unwrap().len(), 3);
        assert_eq!(discoverer.discover_ids().await.unwrap().len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
