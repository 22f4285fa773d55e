use crate::{
    record::PreviewItem,
    site::{self, Normalizer, SiteId},
    tags::{TagCatalog, TagCategory, TagSets},
};

pub const SITE_NAME: &str = "DLsite";

/// DLsite exposes typed fields; language tags arrive already mapped to
/// catalog spelling by the site adapter and are kept as declared.
pub struct DLsite;

pub static NORMALIZER: DLsite = DLsite;

impl Normalizer for DLsite {
    fn site(&self) -> SiteId {
        SiteId::DLsite
    }

    fn classify(&self, catalog: &TagCatalog, item: &PreviewItem) -> TagSets {
        let age = site::age_restriction(item);
        let genres = site::tag_set(&item.category_tags);

        let mut language = site::tag_set(&item.lang_tags);
        let mut category = site::content_tags(catalog, &genres, age);
        site::apply_translation_markers(&mut category, &mut language);

        TagSets {
            platform: site::recognized(catalog, TagCategory::Platform, &site::tag_set(&item.platform)),
            game_type: site::recognized(
                catalog,
                TagCategory::GameType,
                &site::tag_set(&item.game_type_tags),
            ),
            story: site::story_tags(catalog, &genres, age, &site::tag_set(&item.story_tags)),
            language,
            category,
        }
    }
}
