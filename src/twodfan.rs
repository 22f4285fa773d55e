use crate::{
    record::PreviewItem,
    site::{self, Normalizer, SiteId},
    tags::{TagCatalog, TagCategory, TagSets},
};

pub const SITE_NAME: &str = "2DFan";

/// 2DFan publishes every tag in one untyped list, so game types and
/// languages are recovered from that list by catalog lookup.
pub struct TwoDFan;

pub static NORMALIZER: TwoDFan = TwoDFan;

impl Normalizer for TwoDFan {
    fn site(&self) -> SiteId {
        SiteId::TwoDFan
    }

    fn classify(&self, catalog: &TagCatalog, item: &PreviewItem) -> TagSets {
        let age = site::age_restriction(item);
        let bag = site::tag_set(&item.category_tags);
        let declared_types = site::tag_set(&item.game_type_tags);

        let mut type_signals = bag.clone();
        type_signals.union_with(&declared_types);

        let mut language = site::recognized(catalog, TagCategory::Language, &bag);
        let mut category = site::content_tags(catalog, &bag, age);
        site::apply_translation_markers(&mut category, &mut language);

        TagSets {
            platform: site::recognized(catalog, TagCategory::Platform, &site::tag_set(&item.platform)),
            game_type: site::recognized(catalog, TagCategory::GameType, &type_signals),
            story: site::story_tags(catalog, &type_signals, age, &site::tag_set(&item.story_tags)),
            language,
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{TagSet, TagSets, HIGH_QUALITY_TRANSLATION_TAG};

    fn scenario_catalog() -> TagCatalog {
        TagCatalog::from_sets(TagSets {
            game_type: ["ACT", "RPG"].into_iter().collect(),
            story: ["R18", "纯爱"].into_iter().collect(),
            ..TagSets::default()
        })
    }

    fn item(tags: &[&str]) -> PreviewItem {
        PreviewItem {
            name: "テストゲーム".to_string(),
            category_tags: tags.iter().map(|tag| tag.to_string()).collect(),
            images: vec!["https://img.example.com/cover.jpg".to_string()],
            ..PreviewItem::default()
        }
    }

    fn names(set: &TagSet) -> Vec<&str> {
        set.iter().collect()
    }

    #[test]
    fn classifies_mixed_tag_bag() {
        let catalog = scenario_catalog();
        let candidate = NORMALIZER
            .normalize(&catalog, &item(&["日文", "汉化", "ACT", "R18"]))
            .expect("candidate");
        let tags = &candidate.record.tags;

        assert_eq!(names(&tags.game_type), vec!["ACT"]);
        assert_eq!(names(&tags.story), vec!["R18"]);
        assert_eq!(names(&tags.language), vec![HIGH_QUALITY_TRANSLATION_TAG]);
        assert!(!tags.category.contains("汉化"));
        assert!(!tags.category.contains("ACT"));
        assert!(!tags.category.contains("R18"));

        assert_eq!(names(&candidate.available.game_type), vec!["RPG"]);
        assert_eq!(names(&candidate.available.story), vec!["纯爱"]);
    }

    #[test]
    fn catalog_language_tags_suppress_synthesized_default() {
        let catalog = TagCatalog::default();
        let candidate = NORMALIZER
            .normalize(&catalog, &item(&["日文", "汉化", "校园"]))
            .expect("candidate");
        let tags = &candidate.record.tags;

        assert_eq!(names(&tags.language), vec!["日文", "汉化"]);
        assert_eq!(names(&tags.category), vec!["校园"]);
        assert!(tags.language.is_disjoint(&candidate.available.language));
    }

    #[test]
    fn age_restriction_excludes_category_and_feeds_story() {
        let catalog = scenario_catalog();
        let mut raw = item(&["R18", "校园"]);
        raw.age_restriction = Some("R18".to_string());
        let tags = NORMALIZER.classify(&catalog, &raw);
        assert_eq!(names(&tags.story), vec!["R18"]);
        assert_eq!(names(&tags.category), vec!["校园"]);
    }

    #[test]
    fn unknown_platforms_are_dropped() {
        let catalog = TagCatalog::default();
        let mut raw = item(&[]);
        raw.platform = vec!["Windows".to_string(), "PS5".to_string()];
        let tags = NORMALIZER.classify(&catalog, &raw);
        assert_eq!(names(&tags.platform), vec!["Windows"]);
    }
}
