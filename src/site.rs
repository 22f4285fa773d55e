use crate::{
    dlsite,
    record::{Candidate, GameImage, GameRecord, PreviewItem, MAX_IMAGES},
    tags::{has_translation_marker, TagCatalog, TagCategory, TagSet, TagSets, HIGH_QUALITY_TRANSLATION_TAG},
    twodfan,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_CANDIDATES: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteId {
    #[default]
    #[serde(rename = "2dfan")]
    TwoDFan,
    #[serde(rename = "dlsite")]
    DLsite,
}

impl SiteId {
    pub fn display_name(self) -> &'static str {
        match self {
            SiteId::TwoDFan => twodfan::SITE_NAME,
            SiteId::DLsite => dlsite::SITE_NAME,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SiteId::TwoDFan => "2dfan",
            SiteId::DLsite => "dlsite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        supported_sites()
            .into_iter()
            .find(|site| value.eq_ignore_ascii_case(site.as_str()))
    }

    pub fn normalizer(self) -> &'static dyn Normalizer {
        match self {
            SiteId::TwoDFan => &twodfan::NORMALIZER,
            SiteId::DLsite => &dlsite::NORMALIZER,
        }
    }

    /// Sites that block hot-linking; their images go through the relay.
    pub fn relays_images(self) -> bool {
        match self {
            SiteId::TwoDFan => true,
            SiteId::DLsite => false,
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub fn supported_sites() -> Vec<SiteId> {
    vec![SiteId::TwoDFan, SiteId::DLsite]
}

pub trait Normalizer: Sync {
    fn site(&self) -> SiteId;

    fn classify(&self, catalog: &TagCatalog, item: &PreviewItem) -> TagSets;

    fn normalize(&self, catalog: &TagCatalog, item: &PreviewItem) -> Option<Candidate> {
        if item.is_empty() {
            log::debug!("{}: skipping item without a name", self.site());
            return None;
        }
        let tags = self.classify(catalog, item);
        let available = available_tags(catalog, &tags);
        Some(Candidate {
            record: record_from_item(item, tags),
            available,
        })
    }

    fn normalize_all(&self, catalog: &TagCatalog, items: &[PreviewItem]) -> Vec<Candidate> {
        items
            .iter()
            .filter_map(|item| self.normalize(catalog, item))
            .take(MAX_CANDIDATES)
            .collect()
    }
}

pub fn available_tags(catalog: &TagCatalog, applied: &TagSets) -> TagSets {
    let mut available = TagSets::default();
    for category in TagCategory::ALL {
        *available.get_mut(category) = catalog.get(category).difference(applied.get(category));
    }
    available
}

pub fn recognized(catalog: &TagCatalog, category: TagCategory, raw: &TagSet) -> TagSet {
    catalog.get(category).intersection(raw)
}

/// `raw − (catalog tags of every other category ∪ age restriction)`.
pub fn content_tags(catalog: &TagCatalog, raw: &TagSet, age_restriction: Option<&str>) -> TagSet {
    let mut excluded = catalog.others(TagCategory::Category);
    if let Some(age) = age_restriction {
        excluded.insert(age);
    }
    raw.difference(&excluded)
}

/// Story tags recognized from `signals` plus the age restriction, then any
/// story tags the site declared explicitly.
pub fn story_tags(
    catalog: &TagCatalog,
    signals: &TagSet,
    age_restriction: Option<&str>,
    declared: &TagSet,
) -> TagSet {
    let mut signals = signals.clone();
    if let Some(age) = age_restriction {
        signals.insert(age);
    }
    let mut story = recognized(catalog, TagCategory::Story, &signals);
    story.union_with(declared);
    story
}

/// Moves translation-quality tags out of the content tags; they only signal
/// that a translated language tag belongs on the record.
pub fn apply_translation_markers(content: &mut TagSet, language: &mut TagSet) {
    let marked: Vec<String> = content
        .iter()
        .filter(|tag| has_translation_marker(tag))
        .map(str::to_string)
        .collect();
    for tag in marked {
        if language.is_empty() {
            language.insert(HIGH_QUALITY_TRANSLATION_TAG);
        }
        content.remove(&tag);
    }
}

pub fn age_restriction(item: &PreviewItem) -> Option<&str> {
    item.age_restriction
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn tag_set(raw: &[String]) -> TagSet {
    raw.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn record_from_item(item: &PreviewItem, tags: TagSets) -> GameRecord {
    let mut images: Vec<GameImage> = Vec::new();
    for url in &item.images {
        if images.len() >= MAX_IMAGES {
            break;
        }
        if !images.iter().any(|image| &image.url == url) {
            images.push(GameImage::from_url(url.clone()));
        }
    }
    GameRecord {
        name: item.name.trim().to_string(),
        translate_name: item.translate_name.trim().to_string(),
        brand: item.brand.trim().to_string(),
        release_date: item.release_date.trim().to_string(),
        series_name: item.series_name.trim().to_string(),
        introduction: item.introduction.trim().to_string(),
        source_url: item.source_url.clone(),
        images,
        tags,
        ..GameRecord::default()
    }
}
