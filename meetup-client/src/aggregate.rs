use crate::cache::Cache;
use crate::config::{CacheTtls, FanoutConfig};
use crate::continent::ContinentResolver;
use crate::error::{Error, Result};
use crate::feed::FeedDiscoverer;
use crate::group::{CachedGroup, Group, GroupFetcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// Response body of the groups endpoint.
///
/// Groups come in completion order of their loads, which is not stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateResult {
    pub groups: Vec<Group>,
    pub errors: Vec<String>,
}

/// Cache-then-fetch-then-cache for a single group id.
pub struct GroupLoader {
    fetcher: Arc<dyn GroupFetcher>,
    cache: Cache,
    ttls: CacheTtls,
}

impl GroupLoader {
    pub fn new(fetcher: Arc<dyn GroupFetcher>, cache: Cache, ttls: CacheTtls) -> Self {
        Self {
            fetcher,
            cache,
            ttls,
        }
    }

    /// A failed fetch is cached as well, with the shorter failure TTL, so a
    /// broken group is not retried on every request.
    pub async fn load(&self, id: &str) -> Result<Group> {
        if let Some(entry) = self.cache.get::<CachedGroup>(id).await {
            return entry.into();
        }

        let result = self.fetcher.fetch(id).await;
        let ttl = match &result {
            Ok(_) => self.ttls.group,
            Err(e) => {
                log::error!(
                    "error fetching {:?}: {}: will retry in {}s",
                    id,
                    e,
                    self.ttls.failure.num_seconds()
                );
                self.ttls.failure
            }
        };

        self.cache.set(id, &CachedGroup::from(&result), ttl).await;
        result
    }
}

/// Everything one fan-out task needs, shared by all tasks of a request.
struct Unit {
    loader: Arc<GroupLoader>,
    resolver: Arc<ContinentResolver>,
    permits: Arc<Semaphore>,
    deadline: Instant,
}

impl Unit {
    /// Load then enrich one group, both bounded by the request deadline.
    ///
    /// A load still running at the deadline is an error. A group whose
    /// continent lookup is still running is kept without a continent.
    async fn run(&self, id: &str) -> Result<Group> {
        let load = async {
            let _permit = self.permits.acquire().await;
            let mut group = self.loader.load(id).await?;

            let continent = self.resolver.resolve_continent(&group.country);
            // The group is kept either way, only without a continent
            match timeout_at(self.deadline, continent).await {
                Ok(Ok(continent)) => group.continent = continent,
                Ok(Err(e)) => log::error!("continent of {:?} ({}): {}", id, group.country, e),
                Err(_) => {
                    log::warn!("continent of {:?} ({}): {}", id, group.country, DEADLINE_EXCEEDED)
                }
            }
            Ok(group)
        };

        timeout_at(self.deadline, load)
            .await
            .unwrap_or_else(|_| Err(Error::Transport(DEADLINE_EXCEEDED.to_string())))
    }
}

pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Slack given to tasks to report their own deadline outcome before the
/// collector stops waiting for them.
const COLLECT_GRACE: StdDuration = StdDuration::from_millis(100);

pub struct Aggregator {
    discoverer: FeedDiscoverer,
    loader: Arc<GroupLoader>,
    resolver: Arc<ContinentResolver>,
    fanout: FanoutConfig,
}

impl Aggregator {
    pub fn new(
        discoverer: FeedDiscoverer,
        loader: GroupLoader,
        resolver: ContinentResolver,
        fanout: FanoutConfig,
    ) -> Self {
        Self {
            discoverer,
            loader: Arc::new(loader),
            resolver: Arc::new(resolver),
            fanout,
        }
    }

    /// Discover every group, load and enrich them concurrently.
    ///
    /// Only a discovery failure fails the whole call. Per-group failures and
    /// loads still running at the deadline end up in `errors`.
    pub async fn build_aggregate(&self) -> Result<AggregateResult> {
        let ids = self
            .discoverer
            .discover_ids()
            .await
            .map_err(|e| Error::Discovery(Box::new(e)))?;

        let deadline = Instant::now() + self.fanout.request_deadline;
        let unit = Arc::new(Unit {
            loader: self.loader.clone(),
            resolver: self.resolver.clone(),
            permits: Arc::new(Semaphore::new(self.fanout.max_concurrency.max(1))),
            deadline,
        });

        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(ids.len());
        for id in ids {
            let unit = unit.clone();
            let task_group = id.clone();
            let handle = tasks.spawn(async move {
                let result = unit.run(&task_group).await;
                (task_group, result)
            });
            pending.insert(handle.id(), id);
        }

        let mut aggregate = AggregateResult::default();
        loop {
            match timeout_at(deadline + COLLECT_GRACE, tasks.join_next_with_id()).await {
                Ok(None) => break,
                Ok(Some(Ok((task, (id, result))))) => {
                    pending.remove(&task);
                    match result {
                        Ok(group) => aggregate.groups.push(group),
                        Err(e) => aggregate.errors.push(format!("fetch {}: {}", id, e)),
                    }
                }
                Ok(Some(Err(e))) => {
                    let id = pending.remove(&e.id()).unwrap_or_default();
                    log::error!("load {:?}: {}", id, e);
                    aggregate.errors.push(format!("fetch {}: {}", id, e));
                }
                Err(_) => {
                    tasks.abort_all();
                    log::warn!(
                        "Deadline of {:?} reached with {} groups outstanding",
                        self.fanout.request_deadline,
                        pending.len()
                    );
                    for (_, id) in pending.drain() {
                        aggregate.errors.push(format!("fetch {}: {}", id, DEADLINE_EXCEEDED));
                    }
                    break;
                }
            }
        }

        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::tests::{gosf, StubFetcher};
    use chrono::Duration;

    fn loader(fetcher: Arc<StubFetcher>, failure_ttl: Duration) -> GroupLoader {
        let ttls = CacheTtls {
            failure: failure_ttl,
            ..CacheTtls::default()
        };
        GroupLoader::new(fetcher, Cache::new(Arc::new(MemoryStore::default())), ttls)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetcher() {
        let fetcher = Arc::new(StubFetcher::default().with_group("golangsf", gosf()));
        let loader = loader(fetcher.clone(), Duration::hours(1));

        assert_eq!(loader.load("golangsf").await.unwrap(), gosf());
        assert_eq!(loader.load("golangsf").await.unwrap(), gosf());
        assert_eq!(fetcher.calls_for("golangsf"), 1);
    }

    #[tokio::test]
    async fn test_failure_marker_is_replayed_within_ttl() {
        let fetcher = Arc::new(
            StubFetcher::default()
                .with_error("golangsv", Error::transport("get", "connection reset")),
        );
        let loader = loader(fetcher.clone(), Duration::hours(1));

        let first = loader.load("golangsv").await.unwrap_err();
        let second = loader.load("golangsv").await.unwrap_err();
        assert_eq!(first, second);
        assert_eq!(second.to_string(), "get: connection reset");
        assert_eq!(fetcher.calls_for("golangsv"), 1);
    }

    #[tokio::test]
    async fn test_expired_failure_marker_is_retried() {
        let fetcher = Arc::new(
            StubFetcher::default().with_error("golangsv", Error::Provider("not found".to_string())),
        );
        let loader = loader(fetcher.clone(), Duration::zero());

        assert!(loader.load("golangsv").await.is_err());
        assert!(loader.load("golangsv").await.is_err());
        assert_eq!(fetcher.calls_for("golangsv"), 2);
    }

    #[test]
    fn test_aggregate_json_shape() {
        let aggregate = AggregateResult {
            groups: vec![gosf()],
            errors: vec!["fetch golangsv: get: connection reset".to_string()],
        };
        let value = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(value["Groups"][0]["Name"], "GoSF");
        assert_eq!(value["Errors"][0], "fetch golangsv: get: connection reset");

        let back: AggregateResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, aggregate);
    }
}
