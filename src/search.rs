use crate::{config::AppConfig, record::PreviewItem, site::SiteId};
use anyhow::{bail, Context, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        mpsc::{self, Receiver},
        Arc,
    },
    thread,
    time::Duration,
};
use url::Url;

const USER_AGENT: &str = "galpost";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    #[default]
    NotStarted,
    Searching,
    Completed,
}

pub trait SourceFetcher: Send + Sync {
    fn fetch_raw(&self, site: SiteId, query: &str) -> Result<Vec<PreviewItem>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Vec<PreviewItem>>,
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    api_url: String,
    dlsite_cookie: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &AppConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(60))
            .timeout_write(Duration::from_secs(10))
            .build();
        Self {
            agent,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            dlsite_cookie: Some(config.dlsite_cookie.clone()).filter(|value| !value.is_empty()),
        }
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch_raw(&self, site: SiteId, query: &str) -> Result<Vec<PreviewItem>> {
        if self.api_url.is_empty() {
            bail!("search api url is not configured");
        }
        let mut request = self
            .agent
            .get(&format!("{}/search", self.api_url))
            .query("text", query)
            .query("website", site.as_str())
            .set("User-Agent", USER_AGENT);
        if let (SiteId::DLsite, Some(cookie)) = (site, self.dlsite_cookie.as_deref()) {
            request = request.set("dlsite-cookie", cookie);
        }
        let response = request.call().context("fetch search results")?;
        let body: SearchResponse = response.into_json().context("decode search results")?;
        if !body.success {
            log::info!("{site}: search service said {:?}", body.message);
        }
        Ok(body.data.unwrap_or_default())
    }
}

pub fn relay_image_url(api_url: &str, image_url: &str) -> String {
    let endpoint = format!("{}/image", api_url.trim_end_matches('/'));
    match Url::parse_with_params(&endpoint, &[("url", image_url)]) {
        Ok(url) => url.to_string(),
        Err(_) => image_url.to_string(),
    }
}

pub fn is_relayed(api_url: &str, image_url: &str) -> bool {
    let api_url = api_url.trim_end_matches('/');
    !api_url.is_empty() && image_url.starts_with(&format!("{api_url}/image?"))
}

struct Flight<V> {
    value: Mutex<Option<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn finish(&self, value: V) {
        *self.value.lock() = Some(value);
        self.done.notify_all();
    }

    fn wait(&self) -> V {
        let mut value = self.value.lock();
        loop {
            if let Some(value) = value.as_ref() {
                return value.clone();
            }
            self.done.wait(&mut value);
        }
    }
}

enum Slot<V> {
    Pending(Arc<Flight<V>>),
    Ready(V),
}

enum Lookup<V> {
    Hit(V),
    Wait(Arc<Flight<V>>),
    Lead(Arc<Flight<V>>),
}

/// Collapses concurrent requests for the same key into one call.
///
/// Callers arriving while a call is in flight block until it finishes and
/// receive the same value. Values the leader marks cacheable are kept until
/// evicted.
pub struct SingleFlight<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone + Default> SingleFlight<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `fetch` returns the value and whether it may be cached. If `fetch`
    /// panics, waiters receive `V::default()` and the key is left uncached.
    pub fn run(&self, key: K, fetch: impl FnOnce() -> (V, bool)) -> V {
        let lookup = {
            let mut slots = self.slots.lock();
            match slots.get(&key) {
                Some(Slot::Ready(value)) => Lookup::Hit(value.clone()),
                Some(Slot::Pending(flight)) => Lookup::Wait(flight.clone()),
                None => {
                    let flight = Arc::new(Flight::new());
                    slots.insert(key.clone(), Slot::Pending(flight.clone()));
                    Lookup::Lead(flight)
                }
            }
        };

        match lookup {
            Lookup::Hit(value) => value,
            Lookup::Wait(flight) => flight.wait(),
            Lookup::Lead(flight) => {
                let leader = Leader {
                    slots: &self.slots,
                    key: Some(key),
                    flight,
                };
                let (value, cacheable) = fetch();
                leader.complete(value, cacheable)
            }
        }
    }

    #[cfg(test)]
    fn is_cached(&self, key: &K) -> bool {
        matches!(self.slots.lock().get(key), Some(Slot::Ready(_)))
    }

    pub fn evict(&self, key: &K) -> bool {
        let mut slots = self.slots.lock();
        if matches!(slots.get(key), Some(Slot::Ready(_))) {
            slots.remove(key);
            return true;
        }
        false
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .retain(|_, slot| matches!(slot, Slot::Pending(_)));
    }
}

struct Leader<'a, K: Eq + Hash, V: Clone + Default> {
    slots: &'a Mutex<HashMap<K, Slot<V>>>,
    key: Option<K>,
    flight: Arc<Flight<V>>,
}

impl<K: Eq + Hash, V: Clone + Default> Leader<'_, K, V> {
    fn complete(mut self, value: V, cacheable: bool) -> V {
        if let Some(key) = self.key.take() {
            let mut slots = self.slots.lock();
            if cacheable {
                slots.insert(key, Slot::Ready(value.clone()));
            } else {
                slots.remove(&key);
            }
        }
        self.flight.finish(value.clone());
        value
    }
}

impl<K: Eq + Hash, V: Clone + Default> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        // Only reached with a key when the fetch unwound.
        if let Some(key) = self.key.take() {
            self.slots.lock().remove(&key);
            self.flight.finish(V::default());
        }
    }
}

#[derive(Debug)]
pub enum SearchMessage {
    Finished {
        site: SiteId,
        query: String,
        items: Vec<PreviewItem>,
    },
}

type SearchKey = (String, SiteId);

#[derive(Clone)]
pub struct SearchService {
    fetcher: Arc<dyn SourceFetcher>,
    flights: Arc<SingleFlight<SearchKey, Vec<PreviewItem>>>,
    api_url: String,
}

impl SearchService {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, api_url: &str) -> Self {
        Self {
            fetcher,
            flights: Arc::new(SingleFlight::new()),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn search(&self, site: SiteId, query: &str) -> Vec<PreviewItem> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let key = (query.to_string(), site);
        self.flights.run(key, || match self.fetcher.fetch_raw(site, query) {
            Ok(items) => {
                log::info!("{site}: {} result(s) for {query:?}", items.len());
                (self.relay_images(site, items), true)
            }
            Err(err) => {
                log::warn!("{site}: search for {query:?} failed: {err:#}");
                (Vec::new(), false)
            }
        })
    }

    pub fn spawn(&self, site: SiteId, query: &str) -> Receiver<SearchMessage> {
        let (tx, rx) = mpsc::channel();
        let service = self.clone();
        let query = query.to_string();
        thread::spawn(move || {
            let items = service.search(site, &query);
            let _ = tx.send(SearchMessage::Finished { site, query, items });
        });
        rx
    }

    #[allow(dead_code)]
    pub fn evict(&self, site: SiteId, query: &str) -> bool {
        self.flights.evict(&(query.trim().to_string(), site))
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        self.flights.clear();
    }

    fn relay_images(&self, site: SiteId, mut items: Vec<PreviewItem>) -> Vec<PreviewItem> {
        if !site.relays_images() || self.api_url.is_empty() {
            return items;
        }
        for item in items.iter_mut() {
            for image in item.images.iter_mut() {
                if !is_relayed(&self.api_url, image) {
                    *image = relay_image_url(&self.api_url, image);
                }
            }
        }
        items
    }
}
