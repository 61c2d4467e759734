use crate::error::{Error, Result};
use crate::http;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use surf::Client;

/// A meetup group as served to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub members: u32,
    pub city: String,
    /// ISO 3166-1 alpha-2 code
    pub country: String,
    /// Filled in during enrichment, empty when resolution failed
    #[serde(default)]
    pub continent: String,
}

/// Per-group cache entry, failures are cached too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedGroup {
    Found(Group),
    Failed(Error),
}

impl From<CachedGroup> for Result<Group> {
    fn from(entry: CachedGroup) -> Self {
        match entry {
            CachedGroup::Found(group) => Ok(group),
            CachedGroup::Failed(e) => Err(e),
        }
    }
}

impl From<&Result<Group>> for CachedGroup {
    fn from(result: &Result<Group>) -> Self {
        match result {
            Ok(group) => CachedGroup::Found(group.clone()),
            Err(e) => CachedGroup::Failed(e.clone()),
        }
    }
}

#[async_trait]
pub trait GroupFetcher: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Group>;
}

#[derive(Deserialize)]
struct ProviderMessage {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct GroupResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    members: u32,
    #[serde(default)]
    errors: Vec<ProviderMessage>,
}

impl From<GroupResponse> for Group {
    fn from(res: GroupResponse) -> Self {
        Group {
            name: res.name,
            url: res.link,
            members: res.members,
            city: res.city,
            country: res.country,
            continent: String::new(),
        }
    }
}

/// Decode a group-details body. Provider reported errors win over any
/// group fields present alongside them.
pub fn decode_group(body: &str) -> Result<Group> {
    let res: GroupResponse = serde_json::from_str(body).map_err(|e| Error::decode("decode", e))?;

    if !res.errors.is_empty() {
        let messages: Vec<_> = res.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::Provider(messages.join("\n")));
    }

    Ok(res.into())
}

/// Group details from the Meetup API
pub struct MeetupApi {
    http: Client,
    url_template: String,
    api_key: String,
    timeout: Duration,
}

impl MeetupApi {
    pub fn new(
        http: Client,
        url_template: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            url_template: url_template.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn group_url(&self, id: &str) -> String {
        self.url_template
            .replace("{id}", &urlencoding::encode(id))
            .replace("{key}", &urlencoding::encode(&self.api_key))
    }
}

#[async_trait]
impl GroupFetcher for MeetupApi {
    async fn fetch(&self, id: &str) -> Result<Group> {
        let res = http::get(&self.http, &self.group_url(id), self.timeout, "get").await?;

        match decode_group(&res.body) {
            Err(Error::Decode(_)) if !res.status.is_success() => {
                Err(Error::transport("get", res.status))
            }
            other => other,
        }
    }
}
