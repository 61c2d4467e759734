use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::http;
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use surf::Client;

const AMERICAS: &str = "Americas";

/// Knowledge graph string that may be absent.
///
/// An absent value is written as JSON `null` and displays as the literal
/// `null`, which is what ends up as the continent of such an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MaybeString {
    Present(String),
    #[default]
    Absent,
}

impl fmt::Display for MaybeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeString::Present(s) => f.write_str(s),
            MaybeString::Absent => f.write_str("null"),
        }
    }
}

impl Serialize for MaybeString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            MaybeString::Present(s) => serializer.serialize_str(s),
            MaybeString::Absent => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for MaybeString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(MaybeString::Present)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: MaybeString,
}

impl Location {
    pub fn continent(name: MaybeString) -> Self {
        Self {
            kind: "/location/continent".to_string(),
            name,
        }
    }
}

/// Query and result share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Country {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "iso3166_1_alpha2")]
    country_code: String,
    #[serde(rename = "/location/location/containedby", default)]
    contained_by: Vec<Location>,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    result: Vec<Country>,
}

/// Looks up which locations contain a country.
#[async_trait]
pub trait ContinentLookup: Send + Sync {
    async fn contained_by(&self, country_code: &str) -> Result<Vec<Location>>;
}

/// Freebase MQL read endpoint
pub struct Freebase {
    http: Client,
    endpoint: String,
    key: String,
    timeout: StdDuration,
}

impl Freebase {
    pub fn new(
        http: Client,
        endpoint: impl Into<String>,
        key: impl Into<String>,
        timeout: StdDuration,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            key: key.into(),
            timeout,
        }
    }

    pub fn query_url(&self, country_code: &str) -> Result<String> {
        let query = vec![Country {
            kind: "/location/country".to_string(),
            country_code: country_code.to_string(),
            contained_by: vec![Location::continent(MaybeString::Absent)],
        }];
        let query = serde_json::to_string(&query)
            .map_err(|e| Error::decode("encode freebase query", e))?;

        Ok(format!(
            "{}?key={}&query={}",
            self.endpoint,
            urlencoding::encode(&self.key),
            urlencoding::encode(&query)
        ))
    }
}

/// Decode an MQL read response for `country_code`.
pub fn decode_containment(country_code: &str, body: &str) -> Result<Vec<Location>> {
    let res: QueryResult = serde_json::from_str(body).map_err(|e| Error::decode("decode body", e))?;
    res.result
        .into_iter()
        .next()
        .map(|country| country.contained_by)
        .ok_or_else(|| Error::NotFound(format!("cannot find country with code {}", country_code)))
}

#[async_trait]
impl ContinentLookup for Freebase {
    async fn contained_by(&self, country_code: &str) -> Result<Vec<Location>> {
        let url = self.query_url(country_code)?;
        let res = http::get(&self.http, &url, self.timeout, "get freebase").await?;
        if !res.status.is_success() {
            return Err(Error::transport("get freebase", res.status));
        }
        decode_containment(country_code, &res.body)
    }
}

/// Pick the continent among containing locations.
///
/// A leading "Americas" gives way to the second candidate when there is one.
/// Only the first two candidates are ever looked at.
pub fn pick_continent(country_code: &str, candidates: &[Location]) -> Result<String> {
    let first = candidates
        .first()
        .ok_or_else(|| Error::NotFound(format!("cannot find continent for {}", country_code)))?;

    let name = first.name.to_string();
    match candidates.get(1) {
        Some(second) if name == AMERICAS => Ok(second.name.to_string()),
        _ => Ok(name),
    }
}

pub fn cache_key(country_code: &str) -> String {
    format!("cc:{}", country_code.to_lowercase())
}

pub struct ContinentResolver {
    forced: HashMap<String, String>,
    cache: Cache,
    lookup: Arc<dyn ContinentLookup>,
    ttl: Duration,
}

impl ContinentResolver {
    pub fn new(
        forced: HashMap<String, String>,
        cache: Cache,
        lookup: Arc<dyn ContinentLookup>,
        ttl: Duration,
    ) -> Self {
        Self {
            forced,
            cache,
            lookup,
            ttl,
        }
    }

    /// Overrides first, then the cache, then the knowledge graph.
    pub async fn resolve_continent(&self, country_code: &str) -> Result<String> {
        if let Some(continent) = self.forced.get(country_code) {
            return Ok(continent.clone());
        }

        let key = cache_key(country_code);
        if let Some(continent) = self.cache.get::<String>(&key).await {
            return Ok(continent);
        }

        let candidates = self.lookup.contained_by(country_code).await?;
        let continent = pick_continent(country_code, &candidates)?;

        self.cache.set(&key, &continent, self.ttl).await;
        Ok(continent)
    }
}
