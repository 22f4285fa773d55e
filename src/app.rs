use crate::{
    config::AppConfig,
    curation::CurationStore,
    delivery::Publisher,
    history::DeliveryHistory,
    record::{Candidate, GameRecord},
    search::{HttpFetcher, SearchMessage, SearchService, SourceFetcher},
    site::SiteId,
    storage::{FileStore, KvStore},
    tags::TagCatalog,
    telegram::TelegramClient,
};
use anyhow::{Context, Result};
use std::{fs, path::Path, sync::Arc};

pub struct App {
    pub config: AppConfig,
    pub history: DeliveryHistory,
    pub curation: CurationStore,
    store: Arc<dyn KvStore>,
    search: SearchService,
}

impl App {
    pub fn initialize() -> Result<Self> {
        let store: Arc<dyn KvStore> = Arc::new(FileStore::open_default()?);
        let config = AppConfig::load_or_create(store.as_ref())?;
        crate::init_logging(&config.log_level);
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(HttpFetcher::new(&config));
        Self::with_parts(store, config, fetcher)
    }

    pub fn with_parts(
        store: Arc<dyn KvStore>,
        config: AppConfig,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Result<Self> {
        let catalog = TagCatalog::load_or_default(store.as_ref())?;
        let history = DeliveryHistory::load(store.clone())?;
        let mut curation = CurationStore::new(catalog, store.clone());
        curation.subscribe(|change| log::trace!("draft changed: {change:?}"));
        let search = SearchService::new(fetcher, &config.api_url);
        log::debug!("loaded {} delivery record(s)", history.len());
        Ok(Self {
            config,
            history,
            curation,
            store,
            search,
        })
    }

    /// Searches `site` on a worker and feeds the results into the curation
    /// store. Returns the number of candidates.
    pub fn search_blocking(&mut self, site: SiteId, query: &str) -> usize {
        self.curation.begin_search(site, query);
        let rx = self.search.spawn(site, query);
        match rx.recv() {
            Ok(SearchMessage::Finished { site, query, items }) => {
                self.curation.accept_results(site, &query, items)
            }
            Err(_) => self.curation.accept_results(site, query, Vec::new()),
        }
    }

    pub fn publisher(&self) -> Result<Publisher> {
        let client = TelegramClient::new(&self.config)?;
        Ok(Publisher::new(Box::new(client), self.config.compose))
    }

    /// Loads a draft file into the curation store. Available tags are
    /// re-derived from the catalog.
    pub fn load_draft(&mut self, path: &Path) -> Result<&GameRecord> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read draft {}", path.display()))?;
        let draft: Candidate = serde_json::from_str(&raw).context("parse draft")?;
        self.curation.restore(draft.record);
        Ok(self.curation.record())
    }

    pub fn current_draft(&self) -> Candidate {
        Candidate {
            record: self.curation.record().clone(),
            available: self.curation.available().clone(),
        }
    }

    pub fn save_draft(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.current_draft()).context("serialize draft")?;
        fs::write(path, raw).with_context(|| format!("write draft {}", path.display()))?;
        Ok(())
    }

    pub fn restore_delivered(&mut self, ids: &[i64]) -> bool {
        let Some(entry) = self.history.find(ids) else {
            return false;
        };
        let record = entry.record.clone();
        self.curation.restore(record);
        true
    }

    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set(key, value)?;
        self.config.save(self.store.as_ref())
    }
}
