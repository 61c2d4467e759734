use chrono::Duration;
use getset::Getters;
use std::collections::HashMap;
use std::time::Duration as StdDuration;

pub const DEFAULT_GROUP_URL_TEMPLATE: &str = "https://api.meetup.com/{id}?sign=true&key={key}";
pub const DEFAULT_FEED_URL: &str = "http://golang.meetup.com/newest/rss/New+golang+Groups";
pub const DEFAULT_FREEBASE_URL: &str = "https://www.googleapis.com/freebase/v1/mqlread";

/// Expirations of the three kinds of cache entries
#[derive(Clone, Debug)]
pub struct CacheTtls {
    /// Discovered identifier list
    pub ids: Duration,
    /// Successfully fetched group
    pub group: Duration,
    /// Failure marker for a group whose fetch failed
    pub failure: Duration,
    /// Resolved continent of a country
    pub continent: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            ids: Duration::hours(24),
            group: Duration::hours(24),
            failure: Duration::hours(1),
            continent: Duration::days(30),
        }
    }
}

/// Limits applied to the per-request fan-out
#[derive(Clone, Debug)]
pub struct FanoutConfig {
    /// Number of group loads allowed in flight at once
    pub max_concurrency: usize,
    /// Time after which outstanding loads are reported as failed
    pub request_deadline: StdDuration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            request_deadline: StdDuration::from_secs(20),
        }
    }
}

/// Everything the client needs, loaded once at startup.
#[derive(Clone, Debug, Getters)]
#[get = "pub"]
pub struct ClientConfig {
    meetup_api_key: String,
    group_url_template: String,
    feed_url: String,
    freebase_url: String,
    freebase_key: String,
    forced_continents: HashMap<String, String>,
    ttls: CacheTtls,
    fanout: FanoutConfig,
    http_timeout: StdDuration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            meetup_api_key: String::new(),
            group_url_template: DEFAULT_GROUP_URL_TEMPLATE.to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            freebase_url: DEFAULT_FREEBASE_URL.to_string(),
            freebase_key: String::new(),
            forced_continents: default_forced_continents(),
            ttls: CacheTtls::default(),
            fanout: FanoutConfig::default(),
            http_timeout: StdDuration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(meetup_api_key: impl Into<String>, freebase_key: impl Into<String>) -> Self {
        Self {
            meetup_api_key: meetup_api_key.into(),
            freebase_key: freebase_key.into(),
            ..Self::default()
        }
    }

    pub fn with_group_url_template(mut self, template: impl Into<String>) -> Self {
        self.group_url_template = template.into();
        self
    }

    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    pub fn with_freebase_url(mut self, url: impl Into<String>) -> Self {
        self.freebase_url = url.into();
        self
    }

    /// Replaces the whole override table.
    pub fn with_forced_continents(mut self, table: HashMap<String, String>) -> Self {
        self.forced_continents = table;
        self
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn with_fanout(mut self, fanout: FanoutConfig) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_http_timeout(mut self, timeout: StdDuration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Countries the knowledge graph query gets wrong.
pub fn default_forced_continents() -> HashMap<String, String> {
    [
        ("US", "North America"), // instead of Americas
        ("RU", "Europe, Asia"),  // instead of Eurasia
        ("NL", "Europe"),        // contained by the Kingdom of the Netherlands
        ("TR", "Europe, Asia"),
    ]
    .into_iter()
    .map(|(code, continent)| (code.to_string(), continent.to_string()))
    .collect()
}
