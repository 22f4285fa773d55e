use crate::{
    curation::is_web_url,
    record::GameRecord,
    tags::{TagCategory, TagSet},
};
use serde::{Deserialize, Serialize};

/// Characters the caption dialect (Telegram MarkdownV2) treats as markup.
pub const RESERVED: [char; 19] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];
const LINK_CHARS: [char; 4] = ['[', ']', '(', ')'];

pub const ELLIPSIS: &str = "...";
const INTRO_DIVIDER: &str = "\n\n📜 —————游戏介绍——————\n";
const DOWNLOAD_LABEL: &str = "下载地址";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeLimits {
    pub budget: usize,
    pub head_chars: usize,
    pub head_lines: usize,
}

impl Default for ComposeLimits {
    fn default() -> Self {
        Self {
            budget: 970,
            head_chars: 200,
            head_lines: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageComposer {
    limits: ComposeLimits,
}

impl MessageComposer {
    pub fn new(limits: ComposeLimits) -> Self {
        Self { limits }
    }

    /// Builds the caption: header, introduction (inline head, then folded
    /// rest), then download links. Never longer than the budget unless the
    /// header and links alone already exceed it.
    pub fn compose(&self, record: &GameRecord) -> String {
        let header = escape(&header_block(record));
        let download = escape_except(&download_block(&record.download_url), &LINK_CHARS);
        let fixed = char_len(&header) + char_len(&download);
        let budget = self.limits.budget;

        let mut allowance = budget.saturating_sub(fixed);
        let intro = loop {
            let intro = split_introduction(&record.introduction, allowance, &self.limits);
            let total = fixed + intro.len();
            if total <= budget || allowance == 0 {
                break intro;
            }
            allowance = allowance.saturating_sub(total - budget);
        };

        let mut text = header;
        text.push_str(&intro.head);
        text.push_str(&intro.folded);
        text.push_str(&download);
        text
    }
}

pub fn escape(text: &str) -> String {
    escape_except(text, &[])
}

pub fn escape_except(text: &str, keep: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if RESERVED.contains(&ch) && !keep.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[allow(dead_code)]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.peek().copied() {
                if RESERVED.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

fn header_block(record: &GameRecord) -> String {
    let name = record.name.trim();
    let translate_name = record.translate_name.trim();
    let mut titles = Vec::new();
    if translate_name.is_empty() {
        if !name.is_empty() {
            titles.push(format!("🎮{name}"));
        }
    } else {
        titles.push(format!("🎮{translate_name}"));
        if !name.is_empty() {
            titles.push(name.to_string());
        }
    }

    let mut rows = Vec::new();
    if !record.brand.trim().is_empty() {
        rows.push(format!("🏭开发商 #{}", record.brand.trim()));
    }
    for category in TagCategory::ALL {
        if let Some(line) = tag_line(category, record.tags.get(category)) {
            rows.push(line);
        }
    }
    if !record.release_date.trim().is_empty() {
        rows.push(format!("🗓发售日期 #{}", record.release_date.trim()));
    }
    if !record.series_name.trim().is_empty() {
        rows.push(format!("系列名 #{}", record.series_name.trim()));
    }

    let mut text = titles.join("\n");
    for block in [rows.join("\n"), record.other_text.trim().to_string()] {
        if block.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&block);
    }
    text
}

fn tag_label(category: TagCategory) -> &'static str {
    match category {
        TagCategory::Platform => "🖥运行平台",
        TagCategory::Language => "🌐语言",
        TagCategory::Story => "📓剧情分类",
        TagCategory::GameType => "🌟游戏类型",
        TagCategory::Category => "🏷︎内容分类",
    }
}

fn tag_line(category: TagCategory, tags: &TagSet) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    let tags: Vec<String> = tags.iter().map(|tag| format!("#{tag}")).collect();
    Some(format!("{} {}", tag_label(category), tags.join(" ")))
}

/// A bare URL becomes one link; otherwise each `title url` line becomes a
/// link and lines without a usable URL are dropped.
fn download_block(field: &str) -> String {
    let field = field.trim();
    if field.is_empty() {
        return String::new();
    }
    if is_web_url(field) && !field.contains(char::is_whitespace) {
        return format!("\n\n[{DOWNLOAD_LABEL}]({field})");
    }

    let links: Vec<String> = field
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let first = parts.next()?;
            match parts.next() {
                Some(url) if is_web_url(url) => Some(format!("[{first}]({url})")),
                None if is_web_url(first) => Some(format!("[{DOWNLOAD_LABEL}]({first})")),
                _ => None,
            }
        })
        .collect();
    if links.is_empty() {
        return String::new();
    }
    format!("\n\n{}", links.join("\n"))
}

#[derive(Debug, Default)]
struct IntroParts {
    head: String,
    folded: String,
}

impl IntroParts {
    fn len(&self) -> usize {
        char_len(&self.head) + char_len(&self.folded)
    }
}

/// Splits the introduction into an inline head and a folded remainder,
/// both escaped. `allowance` caps the raw characters kept.
fn split_introduction(introduction: &str, allowance: usize, limits: &ComposeLimits) -> IntroParts {
    let introduction = introduction.trim();
    if introduction.is_empty() || allowance == 0 {
        return IntroParts::default();
    }

    let text = if char_len(introduction) > allowance {
        let mut cut: String = introduction.chars().take(allowance).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        introduction.to_string()
    };

    let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
    let total: usize = lines.iter().map(|line| char_len(line)).sum();
    let head_count = if total < limits.head_chars {
        lines.len()
    } else {
        let mut size = 0;
        let mut index = 0;
        while index < limits.head_lines && index < lines.len() && size < limits.head_chars {
            size += char_len(lines[index]);
            index += 1;
        }
        // Everything fitting the head means one oversized block: fold it all.
        if index < lines.len() {
            index
        } else {
            0
        }
    };
    let (head, rest) = lines.split_at(head_count);

    let mut parts = IntroParts {
        head: escape(INTRO_DIVIDER),
        folded: String::new(),
    };
    if !head.is_empty() {
        parts.head.push('\n');
        parts.head.push_str(&escape(&head.join("\n")));
    }
    if !rest.is_empty() {
        parts.folded.push('\n');
        parts.folded.push_str(&fold(&escape(&rest.join("\n"))));
    }
    parts
}

fn fold(escaped: &str) -> String {
    let body: Vec<String> = escaped
        .split('\n')
        .map(|line| format!(">{}", line.trim()))
        .collect();
    format!("**{}||", body.join("\n"))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GameImage;

    fn record(introduction: String) -> GameRecord {
        let mut record = GameRecord {
            name: "星の少女".to_string(),
            translate_name: "星之少女".to_string(),
            brand: "Studio-Star".to_string(),
            release_date: "2024-05-01".to_string(),
            introduction,
            download_url: "https://example.com/dl".to_string(),
            images: vec![GameImage::from_url("https://img.example.com/1.jpg")],
            ..GameRecord::default()
        };
        record.tags.platform.insert("Windows");
        record.tags.game_type.insert("RPG");
        record.tags.story.insert("纯爱");
        record
    }

    fn lines_of(total: usize, width: usize) -> String {
        let mut out = String::new();
        let mut written = 0;
        while written < total {
            let take = width.min(total - written);
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&"字".repeat(take));
            written += take;
        }
        out
    }

    #[test]
    fn escape_round_trips_reserved_alphabet() {
        let alphabet: String = RESERVED.iter().collect();
        let mut samples = vec![String::new(), alphabet.clone(), alphabet.chars().rev().collect()];
        for a in RESERVED {
            for b in RESERVED {
                samples.push(format!("{a}{b}{a}"));
            }
        }
        for sample in samples {
            let escaped = escape(&sample);
            assert_eq!(escaped.chars().count(), sample.chars().count() * 2);
            assert_eq!(unescape(&escaped), sample);
        }
    }

    #[test]
    fn brackets_and_backslashes_are_escaped() {
        assert_eq!(escape("[汉化]a\\b"), "\\[汉化\\]a\\\\b");
        assert_eq!(unescape("\\[汉化\\]a\\\\b"), "[汉化]a\\b");

        let composer = MessageComposer::default();
        let mut game = record("简介\\".to_string());
        game.translate_name = "[汉化]星之少女".to_string();
        let text = composer.compose(&game);
        assert!(text.contains("\\[汉化\\]星之少女"));
        assert!(text.contains("简介\\\\"));
        assert!(text.ends_with("[下载地址](https://example\\.com/dl)"));
    }

    #[test]
    fn escape_except_keeps_link_characters() {
        assert_eq!(escape_except("[a](b.c)", &LINK_CHARS), "[a](b\\.c)");
        assert_eq!(escape("(x)"), "\\(x\\)");
    }

    #[test]
    fn header_lists_only_non_empty_categories() {
        let text = header_block(&record(String::new()));
        assert_eq!(
            text,
            "🎮星之少女\n星の少女\n\n🏭开发商 #Studio-Star\n🖥运行平台 #Windows\n📓剧情分类 #纯爱\n🌟游戏类型 #RPG\n🗓发售日期 #2024-05-01"
        );
    }

    #[test]
    fn title_uses_name_without_translation() {
        let mut record = record(String::new());
        record.translate_name.clear();
        record.other_text = "附带 DLC".to_string();
        let text = header_block(&record);
        assert!(text.starts_with("🎮星の少女\n\n🏭"));
        assert!(text.ends_with("\n\n附带 DLC"));
    }

    #[test]
    fn bare_url_becomes_single_link() {
        assert_eq!(
            download_block(" https://example.com/a "),
            "\n\n[下载地址](https://example.com/a)"
        );
    }

    #[test]
    fn titled_lines_drop_invalid_entries() {
        let block = download_block("FanZa https://example.com/a\nbadline");
        assert_eq!(block, "\n\n[FanZa](https://example.com/a)");

        let composed = escape_except(&block, &LINK_CHARS);
        assert_eq!(composed, "\n\n[FanZa](https://example\\.com/a)");
        assert!(!composed.contains("badline"));
    }

    #[test]
    fn titled_lines_without_any_url_produce_nothing() {
        assert_eq!(download_block("just words\nmore words"), "");
    }

    #[test]
    fn markers_are_not_escaped() {
        let composer = MessageComposer::default();
        let text = composer.compose(&record(lines_of(600, 60)));
        assert!(text.contains("\n**>"));
        assert!(text.ends_with("[下载地址](https://example\\.com/dl)"));
        assert!(text.contains("||\n\n[下载地址]"));
        assert!(!text.contains("\\*\\*>"));
    }

    #[test]
    fn short_introduction_stays_inline() {
        let composer = MessageComposer::default();
        let text = composer.compose(&record(lines_of(199, 50)));
        assert!(text.contains("📜 —————游戏介绍——————"));
        assert!(!text.contains("**>"));
        assert!(!text.contains("\\.\\.\\."));
    }

    #[test]
    fn long_introduction_splits_head_and_fold() {
        let composer = MessageComposer::default();
        let intro = lines_of(400, 40);
        let text = composer.compose(&record(intro));
        let head_start = text.find("📜").expect("divider");
        let fold_start = text.find("**>").expect("fold");
        let head = &text[head_start..fold_start];
        assert_eq!(head.matches(&"字".repeat(40)).count(), 4);
    }

    #[test]
    fn single_oversized_line_is_folded_whole() {
        let composer = MessageComposer::default();
        let text = composer.compose(&record("字".repeat(300)));
        let fold_start = text.find("**>").expect("fold");
        assert!(!text[..fold_start].contains('字'));
    }

    #[test]
    fn output_stays_within_budget() {
        let composer = MessageComposer::default();
        let budget = composer.limits.budget;
        for length in [0, 199, 200, 969, 5000] {
            for intro in [lines_of(length, 35), "字.".repeat(length / 2)] {
                let text = composer.compose(&record(intro));
                assert!(
                    text.chars().count() <= budget,
                    "length {length}: {} chars",
                    text.chars().count()
                );
            }
        }
    }

    #[test]
    fn oversized_introduction_is_truncated_and_folded() {
        let composer = MessageComposer::default();
        let text = composer.compose(&record(lines_of(5000, 35)));
        assert!(text.contains("\\.\\.\\."));
        assert!(text.contains("**>"));
        assert!(text.contains("||"));
    }

    #[test]
    fn compose_is_deterministic() {
        let composer = MessageComposer::new(ComposeLimits {
            budget: 600,
            head_chars: 100,
            head_lines: 2,
        });
        let record = record(lines_of(2000, 30));
        assert_eq!(composer.compose(&record), composer.compose(&record));
        assert!(composer.compose(&record).chars().count() <= 600);
    }

    #[test]
    fn empty_introduction_has_no_divider() {
        let composer = MessageComposer::default();
        let text = composer.compose(&record(String::new()));
        assert!(!text.contains("📜"));
    }
}
