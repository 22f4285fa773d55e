use crate::storage::{KvStore, CATALOG_KEY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HIGH_QUALITY_TRANSLATION_TAG: &str = "精翻";
pub const TRANSLATION_MARKERS: [&str; 3] = ["翻译", "汉化", "机翻"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Platform,
    Language,
    GameType,
    Category,
    Story,
}

impl TagCategory {
    pub const ALL: [TagCategory; 5] = [
        TagCategory::Platform,
        TagCategory::Language,
        TagCategory::Story,
        TagCategory::GameType,
        TagCategory::Category,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TagCategory::Platform => "platform",
            TagCategory::Language => "language",
            TagCategory::GameType => "game_type",
            TagCategory::Category => "category",
            TagCategory::Story => "story",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "platform" => Some(TagCategory::Platform),
            "language" | "lang" => Some(TagCategory::Language),
            "game_type" | "gametype" | "type" => Some(TagCategory::GameType),
            "category" | "content" => Some(TagCategory::Category),
            "story" => Some(TagCategory::Story),
            _ => None,
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|item| item == tag)
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|item| item != tag);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn difference(&self, other: &TagSet) -> TagSet {
        self.iter().filter(|tag| !other.contains(tag)).collect()
    }

    pub fn intersection(&self, other: &TagSet) -> TagSet {
        self.iter().filter(|tag| other.contains(tag)).collect()
    }

    #[cfg(test)]
    pub fn is_disjoint(&self, other: &TagSet) -> bool {
        !self.iter().any(|tag| other.contains(tag))
    }

    pub fn union_with(&mut self, other: &TagSet) {
        for tag in other.iter() {
            self.insert(tag);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSets {
    #[serde(default)]
    pub platform: TagSet,
    #[serde(default)]
    pub language: TagSet,
    #[serde(default)]
    pub game_type: TagSet,
    #[serde(default)]
    pub category: TagSet,
    #[serde(default)]
    pub story: TagSet,
}

impl TagSets {
    pub fn get(&self, category: TagCategory) -> &TagSet {
        match category {
            TagCategory::Platform => &self.platform,
            TagCategory::Language => &self.language,
            TagCategory::GameType => &self.game_type,
            TagCategory::Category => &self.category,
            TagCategory::Story => &self.story,
        }
    }

    pub fn get_mut(&mut self, category: TagCategory) -> &mut TagSet {
        match category {
            TagCategory::Platform => &mut self.platform,
            TagCategory::Language => &mut self.language,
            TagCategory::GameType => &mut self.game_type,
            TagCategory::Category => &mut self.category,
            TagCategory::Story => &mut self.story,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCatalog {
    tags: TagSets,
}

impl Default for TagCatalog {
    fn default() -> Self {
        let tags = TagSets {
            platform: ["Windows", "安卓"].into_iter().collect(),
            language: ["日文", "生肉", "英文", "汉化", "简中", "繁中", "AI翻译", "精翻"]
                .into_iter()
                .collect(),
            game_type: [
                "ACT", "RPG", "SLG", "AVG", "GALGAME", "ADV", "3D", "ACN", "SLN", "STG", "PZL",
                "QIZ", "DNV",
            ]
            .into_iter()
            .collect(),
            category: TagSet::new(),
            story: [
                "全年龄", "R18", "拔作", "正常向", "乙女向", "猎奇", "恐怖", "血腥", "纯爱",
            ]
            .into_iter()
            .collect(),
        };
        Self { tags }
    }
}

impl TagCatalog {
    #[cfg(test)]
    pub fn from_sets(tags: TagSets) -> Self {
        Self { tags }
    }

    pub fn load_or_default(store: &dyn KvStore) -> Result<Self> {
        match store.load(CATALOG_KEY)? {
            Some(raw) => serde_json::from_str(&raw).context("parse tag catalog"),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("serialize tag catalog")?;
        store.save(CATALOG_KEY, &raw)
    }

    pub fn get(&self, category: TagCategory) -> &TagSet {
        self.tags.get(category)
    }

    pub fn sets(&self) -> &TagSets {
        &self.tags
    }

    #[cfg(test)]
    pub fn contains(&self, category: TagCategory, tag: &str) -> bool {
        self.tags.get(category).contains(tag)
    }

    pub fn add(&mut self, category: TagCategory, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.tags.get_mut(category).insert(tag)
    }

    pub fn remove(&mut self, category: TagCategory, tag: &str) -> bool {
        self.tags.get_mut(category).remove(tag.trim())
    }

    pub fn others(&self, category: TagCategory) -> TagSet {
        let mut out = TagSet::new();
        for other in TagCategory::ALL {
            if other != category {
                out.union_with(self.get(other));
            }
        }
        out
    }
}

pub fn has_translation_marker(tag: &str) -> bool {
    TRANSLATION_MARKERS.iter().any(|marker| tag.contains(marker))
}
