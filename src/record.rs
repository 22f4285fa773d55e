use crate::tags::{TagCategory, TagSets};
use serde::{Deserialize, Serialize};

/// Upper bound on images attached to one announcement (media group limit).
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameImage {
    pub url: String,
    #[serde(default)]
    pub has_spoiler: bool,
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

impl GameImage {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            has_spoiler: false,
            bytes: None,
        }
    }

    pub fn is_upload(&self) -> bool {
        self.bytes.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRecord {
    pub name: String,
    pub translate_name: String,
    pub brand: String,
    pub release_date: String,
    pub series_name: String,
    pub introduction: String,
    pub other_text: String,
    pub download_url: String,
    pub source_url: String,
    pub images: Vec<GameImage>,
    pub tags: TagSets,
}

impl GameRecord {
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Name => &self.name,
            TextField::TranslateName => &self.translate_name,
            TextField::Brand => &self.brand,
            TextField::ReleaseDate => &self.release_date,
            TextField::SeriesName => &self.series_name,
            TextField::Introduction => &self.introduction,
            TextField::OtherText => &self.other_text,
            TextField::DownloadUrl => &self.download_url,
        }
    }

    pub fn text_mut(&mut self, field: TextField) -> &mut String {
        match field {
            TextField::Name => &mut self.name,
            TextField::TranslateName => &mut self.translate_name,
            TextField::Brand => &mut self.brand,
            TextField::ReleaseDate => &mut self.release_date,
            TextField::SeriesName => &mut self.series_name,
            TextField::Introduction => &mut self.introduction,
            TextField::OtherText => &mut self.other_text,
            TextField::DownloadUrl => &mut self.download_url,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.translate_name.is_empty() {
            &self.name
        } else {
            &self.translate_name
        }
    }

    pub fn without_uploads(mut self) -> Self {
        self.images.retain(|image| !image.is_upload());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Name,
    TranslateName,
    Brand,
    ReleaseDate,
    SeriesName,
    Introduction,
    OtherText,
    DownloadUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Text(TextField),
    Images,
    Tags(TagCategory),
}

impl TextField {
    pub fn parse(value: &str) -> Option<Self> {
        let field = match value {
            "name" => TextField::Name,
            "translate_name" | "translateName" => TextField::TranslateName,
            "brand" => TextField::Brand,
            "release_date" | "releaseDate" => TextField::ReleaseDate,
            "series_name" | "seriesName" => TextField::SeriesName,
            "introduction" => TextField::Introduction,
            "other_text" | "otherText" => TextField::OtherText,
            "download_url" | "downloadUrl" => TextField::DownloadUrl,
            _ => return None,
        };
        Some(field)
    }
}

impl FieldKey {
    /// Fields a candidate can supply; free text and download links are
    /// never scraped.
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(category) = TagCategory::parse(value) {
            return Some(FieldKey::Tags(category));
        }
        if value == "images" {
            return Some(FieldKey::Images);
        }
        match TextField::parse(value)? {
            TextField::OtherText | TextField::DownloadUrl => None,
            field => Some(FieldKey::Text(field)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewItem {
    pub name: String,
    pub translate_name: String,
    pub images: Vec<String>,
    pub brand: String,
    pub release_date: String,
    pub series_name: String,
    pub platform: Vec<String>,
    #[serde(alias = "gameTags")]
    pub game_type_tags: Vec<String>,
    pub category_tags: Vec<String>,
    pub lang_tags: Vec<String>,
    pub story_tags: Vec<String>,
    pub age_restriction: Option<String>,
    pub source_url: String,
    pub introduction: String,
}

impl PreviewItem {
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty() && self.translate_name.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub record: GameRecord,
    #[serde(default)]
    pub available: TagSets,
}
