use crate::{
    record::{Candidate, FieldKey, GameImage, GameRecord, PreviewItem, TextField, MAX_IMAGES},
    search::SearchStatus,
    site::{available_tags, SiteId},
    storage::KvStore,
    tags::{TagCatalog, TagCategory, TagSets},
};
use std::{collections::HashMap, sync::Arc};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Reset,
    Replaced,
    Field(FieldKey),
    Tags(TagCategory),
    Catalog(TagCategory),
    Images,
    Search(SiteId),
}

#[derive(Debug, Default)]
struct SiteCache {
    status: SearchStatus,
    raw: Vec<PreviewItem>,
    candidates: Vec<Candidate>,
}

type Observer = Box<dyn FnMut(&Change)>;

/// The record being curated, its available tags, and the cached candidates
/// per source site.
///
/// Every mutator is total: invalid input leaves the state untouched and
/// reports `false`. Available tags are recomputed from the catalog on each
/// tag or catalog change, so a catalog tag is always either applied or
/// available. Tags that came from a scrape and are unknown to the catalog
/// can only ever be applied.
pub struct CurationStore {
    catalog: TagCatalog,
    store: Arc<dyn KvStore>,
    record: GameRecord,
    available: TagSets,
    sites: HashMap<SiteId, SiteCache>,
    observers: Vec<Observer>,
}

impl CurationStore {
    pub fn new(catalog: TagCatalog, store: Arc<dyn KvStore>) -> Self {
        let available = catalog.sets().clone();
        Self {
            catalog,
            store,
            record: GameRecord::default(),
            available,
            sites: HashMap::new(),
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&Change) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    pub fn record(&self) -> &GameRecord {
        &self.record
    }

    pub fn available(&self) -> &TagSets {
        &self.available
    }

    pub fn status(&self, site: SiteId) -> SearchStatus {
        self.sites
            .get(&site)
            .map(|cache| cache.status)
            .unwrap_or_default()
    }

    pub fn candidates(&self, site: SiteId) -> &[Candidate] {
        self.sites
            .get(&site)
            .map(|cache| cache.candidates.as_slice())
            .unwrap_or(&[])
    }

    pub fn reset(&mut self) {
        self.record = GameRecord::default();
        self.available = self.catalog.sets().clone();
        self.sites.clear();
        self.notify(Change::Reset);
    }

    pub fn begin_search(&mut self, site: SiteId, query: &str) {
        let cache = self.sites.entry(site).or_default();
        cache.status = SearchStatus::Searching;
        cache.raw.clear();
        cache.candidates.clear();
        log::debug!("{site}: searching {query:?}");
        self.notify(Change::Search(site));
    }

    pub fn accept_results(&mut self, site: SiteId, query: &str, items: Vec<PreviewItem>) -> usize {
        let candidates = site.normalizer().normalize_all(&self.catalog, &items);
        let count = candidates.len();
        let cache = self.sites.entry(site).or_default();
        cache.status = SearchStatus::Completed;
        cache.raw = items;
        cache.candidates = candidates;
        log::debug!("{site}: {count} candidate(s) for {query:?}");
        self.notify(Change::Search(site));
        count
    }

    pub fn replace_all(&mut self, candidate: Candidate) {
        let mut record = candidate.record;
        record.images.truncate(MAX_IMAGES);
        self.record = record;
        self.available = candidate.available;
        self.notify(Change::Replaced);
    }

    pub fn replace_from(&mut self, site: SiteId, index: usize) -> bool {
        let Some(candidate) = self.candidates(site).get(index).cloned() else {
            return false;
        };
        self.replace_all(candidate);
        true
    }

    /// Copies one field (and its paired available set for tag fields) from a
    /// cached candidate, leaving the rest of the record alone.
    pub fn replace_field(&mut self, site: SiteId, field: FieldKey, index: usize) -> bool {
        let Some(candidate) = self.candidates(site).get(index).cloned() else {
            return false;
        };
        match field {
            FieldKey::Text(text) => {
                *self.record.text_mut(text) = candidate.record.text(text).to_string();
            }
            FieldKey::Images => {
                let mut images = candidate.record.images;
                images.truncate(MAX_IMAGES);
                self.record.images = images;
            }
            FieldKey::Tags(category) => {
                *self.record.tags.get_mut(category) = candidate.record.tags.get(category).clone();
                *self.available.get_mut(category) = candidate.available.get(category).clone();
            }
        }
        self.notify(Change::Field(field));
        true
    }

    pub fn restore(&mut self, record: GameRecord) {
        self.available = available_tags(&self.catalog, &record.tags);
        self.record = record;
        self.notify(Change::Replaced);
    }

    pub fn set_text(&mut self, field: TextField, value: &str) -> bool {
        let slot = self.record.text_mut(field);
        if slot.as_str() == value {
            return false;
        }
        *slot = value.to_string();
        self.notify(Change::Field(FieldKey::Text(field)));
        true
    }

    pub fn apply_tag(&mut self, category: TagCategory, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || !self.record.tags.get_mut(category).insert(tag) {
            return false;
        }
        self.refresh_available(category);
        self.notify(Change::Tags(category));
        true
    }

    pub fn unapply_tag(&mut self, category: TagCategory, tag: &str) -> bool {
        if !self.record.tags.get_mut(category).remove(tag.trim()) {
            return false;
        }
        self.refresh_available(category);
        self.notify(Change::Tags(category));
        true
    }

    pub fn add_catalog_tag(&mut self, category: TagCategory, tag: &str) -> bool {
        if !self.catalog.add(category, tag) {
            return false;
        }
        log::info!("catalog {category}: added {:?}", tag.trim());
        self.catalog_changed(category);
        true
    }

    pub fn remove_catalog_tag(&mut self, category: TagCategory, tag: &str) -> bool {
        if !self.catalog.remove(category, tag) {
            return false;
        }
        log::info!("catalog {category}: removed {:?}", tag.trim());
        self.catalog_changed(category);
        true
    }

    pub fn add_image(&mut self, url: &str, bytes: Option<Vec<u8>>) -> bool {
        let url = url.trim();
        if url.is_empty() || self.record.images.len() >= MAX_IMAGES {
            return false;
        }
        if self.record.images.iter().any(|image| image.url == url) {
            return false;
        }
        if bytes.is_none() && !is_web_url(url) {
            return false;
        }
        self.record.images.push(GameImage {
            url: url.to_string(),
            has_spoiler: false,
            bytes,
        });
        self.notify(Change::Images);
        true
    }

    /// Removes an image; the last remaining image is kept.
    pub fn remove_image(&mut self, url: &str) -> bool {
        if self.record.images.len() <= 1 {
            return false;
        }
        let before = self.record.images.len();
        self.record.images.retain(|image| image.url != url);
        if self.record.images.len() == before {
            return false;
        }
        self.notify(Change::Images);
        true
    }

    pub fn toggle_spoiler(&mut self, url: &str) -> bool {
        let Some(image) = self.record.images.iter_mut().find(|image| image.url == url) else {
            return false;
        };
        image.has_spoiler = !image.has_spoiler;
        self.notify(Change::Images);
        true
    }

    fn catalog_changed(&mut self, category: TagCategory) {
        if let Err(err) = self.catalog.save(self.store.as_ref()) {
            log::warn!("catalog save failed: {err:#}");
        }
        for (site, cache) in self.sites.iter_mut() {
            cache.candidates = site.normalizer().normalize_all(&self.catalog, &cache.raw);
        }
        self.refresh_available(category);
        self.notify(Change::Catalog(category));
    }

    fn refresh_available(&mut self, category: TagCategory) {
        *self.available.get_mut(category) =
            self.catalog.get(category).difference(self.record.tags.get(category));
    }

    fn notify(&mut self, change: Change) {
        for observer in self.observers.iter_mut() {
            observer(&change);
        }
    }
}

pub fn is_web_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, CATALOG_KEY};
    use std::{cell::RefCell, rc::Rc};

    fn store() -> CurationStore {
        CurationStore::new(TagCatalog::default(), Arc::new(MemoryStore::new()))
    }

    fn preview(name: &str, tags: &[&str]) -> PreviewItem {
        PreviewItem {
            name: name.to_string(),
            category_tags: tags.iter().map(|tag| tag.to_string()).collect(),
            images: vec![format!("https://img.example.com/{name}.jpg")],
            introduction: format!("{name} intro"),
            ..PreviewItem::default()
        }
    }

    fn assert_partition(store: &CurationStore) {
        for category in TagCategory::ALL {
            let applied = store.record().tags.get(category);
            let available = store.available().get(category);
            assert!(
                applied.is_disjoint(available),
                "{category}: applied and available overlap"
            );
            for tag in store.catalog().get(category).iter() {
                assert!(
                    applied.contains(tag) || available.contains(tag),
                    "{category}: catalog tag {tag} missing from both sides"
                );
            }
            for tag in available.iter() {
                assert!(store.catalog().contains(category, tag));
            }
        }
    }

    #[test]
    fn reset_makes_whole_catalog_available() {
        let mut store = store();
        store.apply_tag(TagCategory::GameType, "RPG");
        store.reset();
        assert_eq!(store.available(), store.catalog().sets());
        assert_eq!(store.record(), &GameRecord::default());
        assert_partition(&store);
    }

    #[test]
    fn apply_then_unapply_is_identity() {
        let mut store = store();
        let before_record = store.record().clone();
        let before_available = store.available().clone();

        assert!(store.apply_tag(TagCategory::Story, "纯爱"));
        assert!(!store.apply_tag(TagCategory::Story, "纯爱"));
        assert!(store.unapply_tag(TagCategory::Story, "纯爱"));
        assert!(!store.unapply_tag(TagCategory::Story, "纯爱"));

        assert_eq!(store.record(), &before_record);
        assert_eq!(store.available(), &before_available);
    }

    #[test]
    fn scrape_only_tags_never_become_available() {
        let mut store = store();
        assert!(store.apply_tag(TagCategory::Category, "校园"));
        assert!(store.unapply_tag(TagCategory::Category, "校园"));
        assert!(!store.available().category.contains("校园"));
        assert_partition(&store);
    }

    #[test]
    fn catalog_add_then_remove_restores_available() {
        let mut store = store();
        let before = store.available().language.clone();
        assert!(store.add_catalog_tag(TagCategory::Language, "韩文"));
        assert!(store.available().language.contains("韩文"));
        assert!(!store.add_catalog_tag(TagCategory::Language, "韩文"));
        assert!(store.remove_catalog_tag(TagCategory::Language, "韩文"));
        assert_eq!(store.available().language, before);
    }

    #[test]
    fn catalog_change_is_persisted() {
        let backing = Arc::new(MemoryStore::new());
        let mut store = CurationStore::new(TagCatalog::default(), backing.clone());
        store.add_catalog_tag(TagCategory::Category, "NTR");
        let raw = backing.load(CATALOG_KEY).expect("load").expect("saved");
        assert!(raw.contains("NTR"));
    }

    #[test]
    fn catalog_change_renormalizes_cached_candidates_but_not_applied_tags() {
        let mut store = store();
        store.accept_results(SiteId::TwoDFan, "q", vec![preview("a", &["校园", "RPG"])]);
        assert!(store.candidates(SiteId::TwoDFan)[0].record.tags.category.contains("校园"));
        assert!(store.replace_from(SiteId::TwoDFan, 0));

        assert!(store.add_catalog_tag(TagCategory::Story, "校园"));
        let candidate = &store.candidates(SiteId::TwoDFan)[0];
        assert!(!candidate.record.tags.category.contains("校园"));
        assert!(candidate.record.tags.story.contains("校园"));

        assert!(store.record().tags.category.contains("校园"));
        assert!(!store.record().tags.story.contains("校园"));
        assert!(store.available().story.contains("校园"));
        assert_partition(&store);
    }

    #[test]
    fn removing_catalog_tag_keeps_it_applied() {
        let mut store = store();
        store.apply_tag(TagCategory::GameType, "RPG");
        assert!(store.remove_catalog_tag(TagCategory::GameType, "RPG"));
        assert!(store.record().tags.game_type.contains("RPG"));
        assert!(!store.available().game_type.contains("RPG"));
        assert_partition(&store);
    }

    #[test]
    fn replace_field_touches_only_that_field() {
        let mut store = store();
        store.accept_results(
            SiteId::DLsite,
            "q",
            vec![preview("first", &[]), preview("second", &[])],
        );
        store.set_text(TextField::Brand, "Curated Brand");
        store.apply_tag(TagCategory::GameType, "ACT");

        assert!(store.replace_field(SiteId::DLsite, FieldKey::Text(TextField::Name), 1));
        assert_eq!(store.record().name, "second");
        assert_eq!(store.record().brand, "Curated Brand");
        assert!(store.record().tags.game_type.contains("ACT"));

        assert!(store.replace_field(SiteId::DLsite, FieldKey::Tags(TagCategory::GameType), 0));
        assert!(store.record().tags.game_type.is_empty());
        assert!(store.available().game_type.contains("ACT"));

        assert!(!store.replace_field(SiteId::DLsite, FieldKey::Images, 7));
        assert!(!store.replace_field(SiteId::TwoDFan, FieldKey::Images, 0));
        assert_partition(&store);
    }

    #[test]
    fn replace_all_truncates_images() {
        let mut store = store();
        let mut candidate = Candidate::default();
        candidate.record.images = (0..15)
            .map(|index| GameImage::from_url(format!("https://img.example.com/{index}.jpg")))
            .collect();
        store.replace_all(candidate);
        assert_eq!(store.record().images.len(), MAX_IMAGES);
    }

    #[test]
    fn image_rules() {
        let mut store = store();
        assert!(!store.add_image("not a url", None));
        assert!(store.add_image("https://img.example.com/1.jpg", None));
        assert!(!store.add_image("https://img.example.com/1.jpg", None));
        assert!(store.add_image("upload:cover.png", Some(vec![1, 2, 3])));
        for index in 2..20 {
            store.add_image(&format!("https://img.example.com/{index}.jpg"), None);
        }
        assert_eq!(store.record().images.len(), MAX_IMAGES);

        assert!(store.toggle_spoiler("https://img.example.com/1.jpg"));
        assert!(store.record().images[0].has_spoiler);
        assert!(!store.toggle_spoiler("https://img.example.com/missing.jpg"));

        let urls: Vec<String> = store.record().images.iter().map(|image| image.url.clone()).collect();
        for url in &urls {
            store.remove_image(url);
        }
        assert_eq!(store.record().images.len(), 1);
    }

    #[test]
    fn search_status_follows_lifecycle() {
        let mut store = store();
        assert_eq!(store.status(SiteId::TwoDFan), SearchStatus::NotStarted);
        store.begin_search(SiteId::TwoDFan, "q");
        assert_eq!(store.status(SiteId::TwoDFan), SearchStatus::Searching);
        assert_eq!(store.accept_results(SiteId::TwoDFan, "q", Vec::new()), 0);
        assert_eq!(store.status(SiteId::TwoDFan), SearchStatus::Completed);
        store.reset();
        assert_eq!(store.status(SiteId::TwoDFan), SearchStatus::NotStarted);
    }

    #[test]
    fn observers_see_each_change() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        store.apply_tag(TagCategory::Platform, "Windows");
        store.apply_tag(TagCategory::Platform, "Windows");
        store.reset();

        assert_eq!(
            *seen.borrow(),
            vec![Change::Tags(TagCategory::Platform), Change::Reset]
        );
    }

    #[test]
    fn partition_holds_across_mixed_operations() {
        let mut store = store();
        store.accept_results(
            SiteId::TwoDFan,
            "q",
            vec![preview("a", &["日文", "汉化", "ACT", "R18", "校园"])],
        );
        let steps: Vec<Box<dyn Fn(&mut CurationStore)>> = vec![
            Box::new(|s: &mut CurationStore| {
                s.replace_from(SiteId::TwoDFan, 0);
            }),
            Box::new(|s: &mut CurationStore| {
                s.apply_tag(TagCategory::GameType, "RPG");
            }),
            Box::new(|s: &mut CurationStore| {
                s.add_catalog_tag(TagCategory::Category, "校园");
            }),
            Box::new(|s: &mut CurationStore| {
                s.unapply_tag(TagCategory::Category, "校园");
            }),
            Box::new(|s: &mut CurationStore| {
                s.remove_catalog_tag(TagCategory::Language, "日文");
            }),
            Box::new(|s: &mut CurationStore| {
                s.replace_field(SiteId::TwoDFan, FieldKey::Tags(TagCategory::Language), 0);
            }),
            Box::new(|s: &mut CurationStore| {
                s.add_catalog_tag(TagCategory::Language, "日文");
            }),
            Box::new(|s: &mut CurationStore| {
                s.unapply_tag(TagCategory::Story, "R18");
            }),
            Box::new(|s: &mut CurationStore| s.reset()),
        ];
        for step in steps {
            step(&mut store);
            assert_partition(&store);
        }
    }
}
