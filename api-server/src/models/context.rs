use getset::Getters;
use log::info;
use meetup_client::cache::MemoryStore;
use meetup_client::MeetupClient;
use std::sync::Arc;

use super::config::Config;

#[derive(Getters)]
#[get = "pub"]
pub struct Context {
    meetup_client: MeetupClient,
    store: Arc<MemoryStore>,
    config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new(config.store_config()));
        let meetup_client = MeetupClient::new(&config.client_config(), store.clone());

        info!(
            "Initialized MeetupClient (cache: {}, max entries: {}, concurrency: {}, deadline: {}s)",
            config.cache_enabled(),
            config.cache_max_entries(),
            config.max_concurrency(),
            config.request_deadline_secs()
        );

        Self::with_client(meetup_client, store, config)
    }

    pub fn with_client(
        meetup_client: MeetupClient,
        store: Arc<MemoryStore>,
        config: Config,
    ) -> Self {
        Self {
            meetup_client,
            store,
            config,
        }
    }
}

pub type ContextPointer = Arc<Context>;
