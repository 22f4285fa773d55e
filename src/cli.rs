use crate::{
    app::App,
    compose::MessageComposer,
    delivery::DeliveryOutcome,
    history::DeliveryRecord,
    record::{Candidate, FieldKey, TextField},
    site::{supported_sites, SiteId},
    tags::{TagCategory, TagSet},
};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Search(SearchOptions),
    Compose(PathBuf),
    Edit { draft: PathBuf, action: EditAction },
    Send { draft: PathBuf, ids: Vec<i64> },
    Delete(Vec<i64>),
    History,
    Restore { ids: Vec<i64>, out: Option<PathBuf> },
    CatalogList,
    CatalogAdd(TagCategory, String),
    CatalogRemove(TagCategory, String),
    ConfigShow,
    ConfigSet(String, String),
    Help,
    Version,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SearchOptions {
    query: String,
    site: Option<SiteId>,
    pick: Option<usize>,
    field: Option<FieldKey>,
    out: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum EditAction {
    Set(TextField, String),
    Tag(TagCategory, String),
    Untag(TagCategory, String),
    AddImage(String),
    RemoveImage(String),
    Spoiler(String),
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    run_with(&args, App::initialize)
}

fn run_with(args: &[String], open: impl FnOnce() -> Result<App>) -> Result<()> {
    let (format, command) = parse_args(args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("galpost v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let mut app = open()?;
            run_command(&mut app, command, format)
        }
    }
}

fn parse_args(args: &[String]) -> Result<(OutputFormat, CliCommand)> {
    let (format, tokens) = parse_global_options(args);
    let Some(head) = tokens.first() else {
        return Ok((format, CliCommand::Help));
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "--help" | "-h" | "help" => CliCommand::Help,
        "--version" | "-V" | "version" => CliCommand::Version,
        "search" => CliCommand::Search(parse_search(rest)?),
        "compose" => CliCommand::Compose(required_path(rest, "compose")?),
        "edit" => parse_edit(rest)?,
        "send" => parse_send(rest)?,
        "delete" => {
            let ids = rest
                .first()
                .ok_or_else(|| anyhow!("delete requires message ids"))?;
            CliCommand::Delete(parse_ids(ids)?)
        }
        "history" => match rest.first().map(String::as_str) {
            None | Some("list") => CliCommand::History,
            Some("restore") => parse_restore(rest.get(1..).unwrap_or(&[]))?,
            Some(other) => bail!("Unknown history command: {other} (use 'list' or 'restore')"),
        },
        "catalog" => parse_catalog(rest)?,
        "config" => match rest.first().map(String::as_str) {
            None | Some("show") => CliCommand::ConfigShow,
            Some("set") => {
                let key = rest.get(1).ok_or_else(|| anyhow!("config set requires a key"))?;
                let value = rest.get(2).ok_or_else(|| anyhow!("config set requires a value"))?;
                CliCommand::ConfigSet(key.to_string(), value.to_string())
            }
            Some(other) => bail!("Unknown config command: {other} (use 'show' or 'set')"),
        },
        other => bail!("Unknown command: {other} (see 'galpost help')"),
    };
    Ok((format, command))
}

fn parse_global_options(args: &[String]) -> (OutputFormat, Vec<String>) {
    let mut format = OutputFormat::Text;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            if let Some(parsed) = OutputFormat::parse(value) {
                format = parsed;
            }
            continue;
        }
        if arg == "--format" {
            if let Some(parsed) = iter.next().and_then(|value| OutputFormat::parse(value)) {
                format = parsed;
            }
            continue;
        }
        tokens.push(arg.to_string());
    }
    (format, tokens)
}

fn parse_search(args: &[String]) -> Result<SearchOptions> {
    let mut options = SearchOptions::default();
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--site" => {
                let value = iter.next().ok_or_else(|| anyhow!("--site requires a value"))?;
                options.site = Some(parse_site(value)?);
            }
            value if value.starts_with("--site=") => {
                options.site = Some(parse_site(value.trim_start_matches("--site="))?);
            }
            "--pick" => {
                let value = iter.next().ok_or_else(|| anyhow!("--pick requires an index"))?;
                options.pick = Some(parse_index(value)?);
            }
            "--out" => {
                let value = iter.next().ok_or_else(|| anyhow!("--out requires a path"))?;
                options.out = Some(PathBuf::from(value));
            }
            value if value.starts_with("--out=") => {
                options.out = Some(PathBuf::from(value.trim_start_matches("--out=")));
            }
            "--field" => {
                let value = iter.next().ok_or_else(|| anyhow!("--field requires a name"))?;
                options.field = Some(
                    FieldKey::parse(value).ok_or_else(|| anyhow!("Unknown field: {value}"))?,
                );
            }
            _ => words.push(arg.as_str()),
        }
    }
    options.query = words.join(" ").trim().to_string();
    if options.query.is_empty() {
        bail!("search requires a query");
    }
    if options.pick.is_some() && options.site.is_none() {
        bail!("--pick needs --site to know which result list to use");
    }
    if options.field.is_some() && (options.pick.is_none() || options.out.is_none()) {
        bail!("--field needs --pick and an existing draft given by --out");
    }
    Ok(options)
}

fn parse_send(args: &[String]) -> Result<CliCommand> {
    let mut draft = None;
    let mut ids = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ids" => {
                let value = iter.next().ok_or_else(|| anyhow!("--ids requires a list"))?;
                ids = parse_ids(value)?;
            }
            value if value.starts_with("--ids=") => {
                ids = parse_ids(value.trim_start_matches("--ids="))?;
            }
            value => draft = Some(PathBuf::from(value)),
        }
    }
    let draft = draft.ok_or_else(|| anyhow!("send requires a draft file"))?;
    Ok(CliCommand::Send { draft, ids })
}

fn parse_restore(args: &[String]) -> Result<CliCommand> {
    let mut ids = None;
    let mut out = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => {
                let value = iter.next().ok_or_else(|| anyhow!("--out requires a path"))?;
                out = Some(PathBuf::from(value));
            }
            value => ids = Some(parse_ids(value)?),
        }
    }
    let ids = ids.ok_or_else(|| anyhow!("history restore requires message ids"))?;
    Ok(CliCommand::Restore { ids, out })
}

fn parse_edit(args: &[String]) -> Result<CliCommand> {
    let draft = required_path(args, "edit")?;
    let action = args
        .get(1)
        .ok_or_else(|| anyhow!("edit requires an action (see 'galpost help')"))?;
    let first = args.get(2).map(String::as_str);
    let rest = args.get(3..).unwrap_or(&[]).join(" ");
    let action = match (action.as_str(), first) {
        ("set", Some(field)) => {
            let field =
                TextField::parse(field).ok_or_else(|| anyhow!("Unknown field: {field}"))?;
            EditAction::Set(field, rest)
        }
        ("tag" | "untag", Some(category)) => {
            let category = TagCategory::parse(category)
                .ok_or_else(|| anyhow!("Unknown tag category: {category}"))?;
            if rest.trim().is_empty() {
                bail!("edit {action} requires a tag");
            }
            if action == "tag" {
                EditAction::Tag(category, rest)
            } else {
                EditAction::Untag(category, rest)
            }
        }
        ("image-add", Some(url)) => EditAction::AddImage(url.to_string()),
        ("image-remove", Some(url)) => EditAction::RemoveImage(url.to_string()),
        ("spoiler", Some(url)) => EditAction::Spoiler(url.to_string()),
        (other, _) => bail!("Unknown or incomplete edit action: {other}"),
    };
    Ok(CliCommand::Edit { draft, action })
}

fn parse_catalog(args: &[String]) -> Result<CliCommand> {
    let sub = args.first().map(String::as_str).unwrap_or("list");
    if sub == "list" {
        return Ok(CliCommand::CatalogList);
    }
    let category = args
        .get(1)
        .ok_or_else(|| anyhow!("catalog {sub} requires a category"))?;
    let category = TagCategory::parse(category)
        .ok_or_else(|| anyhow!("Unknown tag category: {category}"))?;
    let tag = args
        .get(2)
        .ok_or_else(|| anyhow!("catalog {sub} requires a tag"))?
        .to_string();
    match sub {
        "add" => Ok(CliCommand::CatalogAdd(category, tag)),
        "remove" => Ok(CliCommand::CatalogRemove(category, tag)),
        _ => bail!("Unknown catalog command: {sub} (use 'list', 'add', or 'remove')"),
    }
}

fn parse_site(value: &str) -> Result<SiteId> {
    SiteId::parse(value).ok_or_else(|| anyhow!("Unknown site: {value} (use '2dfan' or 'dlsite')"))
}

fn parse_index(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("Invalid index: {value}"))
}

fn parse_ids(value: &str) -> Result<Vec<i64>> {
    let ids = value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<i64>().with_context(|| format!("Invalid message id: {id}")))
        .collect::<Result<Vec<_>>>()?;
    if ids.is_empty() {
        bail!("No message ids given");
    }
    Ok(ids)
}

fn required_path(args: &[String], command: &str) -> Result<PathBuf> {
    args.first()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("{command} requires a draft file"))
}

fn run_command(app: &mut App, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::Search(options) => search(app, options, format),
        CliCommand::Compose(path) => compose(app, &path, format),
        CliCommand::Edit { draft, action } => edit(app, &draft, action),
        CliCommand::Send { draft, ids } => send(app, &draft, &ids, format),
        CliCommand::Delete(ids) => delete(app, &ids, format),
        CliCommand::History => list_history(app, format),
        CliCommand::Restore { ids, out } => restore(app, &ids, out, format),
        CliCommand::CatalogList => list_catalog(app, format),
        CliCommand::CatalogAdd(category, tag) => {
            if !app.curation.add_catalog_tag(category, &tag) {
                println!("{tag} is already in {category}");
            } else {
                println!("Added {tag} to {category}");
            }
            Ok(())
        }
        CliCommand::CatalogRemove(category, tag) => {
            if !app.curation.remove_catalog_tag(category, &tag) {
                bail!("{tag} is not in {category}");
            }
            println!("Removed {tag} from {category}");
            Ok(())
        }
        CliCommand::ConfigShow => show_config(app, format),
        CliCommand::ConfigSet(key, value) => {
            app.set_config(&key, &value)?;
            println!("Set {key}");
            Ok(())
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

#[derive(Serialize)]
struct CandidateItem<'a> {
    site: SiteId,
    index: usize,
    name: &'a str,
    translate_name: &'a str,
    brand: &'a str,
    release_date: &'a str,
    images: usize,
    tags: Vec<String>,
}

fn search(app: &mut App, options: SearchOptions, format: OutputFormat) -> Result<()> {
    let sites = match options.site {
        Some(site) => vec![site],
        None => supported_sites(),
    };
    if options.field.is_none() {
        app.curation.reset();
    }
    for site in &sites {
        app.search_blocking(*site, &options.query);
    }

    if let (Some(site), Some(index)) = (options.site, options.pick) {
        let replaced = match (options.field, &options.out) {
            (Some(field), Some(path)) => {
                app.load_draft(path)?;
                app.curation.replace_field(site, field, index)
            }
            _ => app.curation.replace_from(site, index),
        };
        if !replaced {
            bail!("No candidate {index} from {site}");
        }
        match &options.out {
            Some(path) => {
                app.save_draft(path)?;
                println!("Wrote draft to {}", path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(&app.current_draft())?),
        }
        return Ok(());
    }

    let mut items = Vec::new();
    for site in &sites {
        for (index, candidate) in app.curation.candidates(*site).iter().enumerate() {
            items.push(candidate_item(*site, index, candidate));
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for site in &sites {
                let count = app.curation.candidates(*site).len();
                println!("{site}: {:?}, {count} candidate(s)", app.curation.status(*site));
            }
            if items.is_empty() {
                println!("No results for {:?}", options.query);
            }
            for item in items {
                let title = if item.translate_name.is_empty() {
                    item.name.to_string()
                } else {
                    format!("{} / {}", item.translate_name, item.name)
                };
                println!(
                    "{site:<7} {index:>2}  {title}  [{brand}] {date}",
                    site = item.site.as_str(),
                    index = item.index,
                    brand = item.brand,
                    date = item.release_date
                );
                if !item.tags.is_empty() {
                    println!("            {}", item.tags.join(" "));
                }
            }
        }
    }
    Ok(())
}

fn candidate_item(site: SiteId, index: usize, candidate: &Candidate) -> CandidateItem<'_> {
    let record = &candidate.record;
    let tags = TagCategory::ALL
        .into_iter()
        .flat_map(|category| record.tags.get(category).iter().map(|tag| format!("#{tag}")))
        .collect();
    CandidateItem {
        site,
        index,
        name: &record.name,
        translate_name: &record.translate_name,
        brand: &record.brand,
        release_date: &record.release_date,
        images: record.images.len(),
        tags,
    }
}

fn edit(app: &mut App, draft: &Path, action: EditAction) -> Result<()> {
    app.load_draft(draft)?;
    let curation = &mut app.curation;
    let changed = match &action {
        EditAction::Set(field, value) => curation.set_text(*field, value),
        EditAction::Tag(category, tag) => curation.apply_tag(*category, tag),
        EditAction::Untag(category, tag) => curation.unapply_tag(*category, tag),
        EditAction::AddImage(url) => curation.add_image(url, None),
        EditAction::RemoveImage(url) => curation.remove_image(url),
        EditAction::Spoiler(url) => curation.toggle_spoiler(url),
    };
    if !changed {
        bail!("Draft unchanged: {action:?} did not apply");
    }
    app.save_draft(draft)?;
    println!("Updated {}", draft.display());
    Ok(())
}

#[derive(Serialize)]
struct ComposeOutput {
    caption: String,
    length: usize,
    budget: usize,
}

fn compose(app: &mut App, path: &Path, format: OutputFormat) -> Result<()> {
    let limits = app.config.compose;
    let caption = MessageComposer::new(limits).compose(app.load_draft(path)?);
    match format {
        OutputFormat::Json => {
            let output = ComposeOutput {
                length: caption.chars().count(),
                budget: limits.budget,
                caption,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => println!("{caption}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct SendOutput {
    action: &'static str,
    message_ids: Vec<i64>,
    previous_ids: Vec<i64>,
    message_link: Option<String>,
}

fn send(app: &mut App, draft: &Path, ids: &[i64], format: OutputFormat) -> Result<()> {
    app.load_draft(draft)?;
    let publisher = app.publisher()?;
    let record = app.curation.record().clone();
    let available = app.curation.available().clone();
    let existing = if ids.is_empty() { None } else { Some(ids) };
    let outcome = publisher
        .deliver(&mut app.history, &record, &available, existing)
        .context("delivery failed")?;

    let output = match outcome {
        DeliveryOutcome::Sent {
            message_ids,
            message_link,
        } => SendOutput {
            action: "sent",
            message_ids,
            previous_ids: Vec::new(),
            message_link,
        },
        DeliveryOutcome::Edited { message_ids } => SendOutput {
            action: "edited",
            message_link: app
                .history
                .find(&message_ids)
                .and_then(|entry| entry.message_link.clone()),
            previous_ids: Vec::new(),
            message_ids,
        },
        DeliveryOutcome::Replaced {
            previous_ids,
            message_ids,
            message_link,
        } => SendOutput {
            action: "replaced",
            message_ids,
            previous_ids,
            message_link,
        },
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("{} {}", output.action, join_ids(&output.message_ids));
            if let Some(link) = output.message_link {
                println!("{link}");
            }
        }
    }
    Ok(())
}

fn delete(app: &mut App, ids: &[i64], format: OutputFormat) -> Result<()> {
    let publisher = app.publisher()?;
    let removed = publisher
        .delete(&mut app.history, ids)
        .context("delete failed")?;
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "message_ids": ids, "recorded": removed.is_some() })
            );
        }
        OutputFormat::Text => match removed {
            Some(entry) => println!("Deleted {} ({})", entry.title(), join_ids(ids)),
            None => println!("Deleted {} (no history entry)", join_ids(ids)),
        },
    }
    Ok(())
}

#[derive(Serialize)]
struct HistoryItem<'a> {
    title: &'a str,
    message_ids: &'a [i64],
    sent_at: &'a str,
    message_link: Option<&'a str>,
    image_count: usize,
}

impl<'a> From<&'a DeliveryRecord> for HistoryItem<'a> {
    fn from(entry: &'a DeliveryRecord) -> Self {
        HistoryItem {
            title: entry.title(),
            message_ids: &entry.message_ids,
            sent_at: &entry.sent_at,
            message_link: entry.message_link.as_deref(),
            image_count: entry.image_count,
        }
    }
}

fn list_history(app: &App, format: OutputFormat) -> Result<()> {
    let items: Vec<HistoryItem> = app.history.entries().iter().map(HistoryItem::from).collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if app.history.is_empty() {
                println!("No deliveries yet");
            }
            for item in items {
                println!(
                    "{sent_at:<16}  {ids:<12} {count:>2} img  {title}",
                    sent_at = item.sent_at,
                    ids = join_ids(item.message_ids),
                    count = item.image_count,
                    title = item.title
                );
            }
        }
    }
    Ok(())
}

fn restore(app: &mut App, ids: &[i64], out: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    if !app.restore_delivered(ids) {
        bail!("No history entry for {}", join_ids(ids));
    }
    match out {
        Some(path) => {
            app.save_draft(&path)?;
            println!("Wrote draft to {}", path.display());
        }
        None => {
            let draft = app.current_draft();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&draft)?),
                OutputFormat::Text => println!("{}", serde_json::to_string_pretty(&draft)?),
            }
        }
    }
    Ok(())
}

fn list_catalog(app: &App, format: OutputFormat) -> Result<()> {
    let catalog = app.curation.catalog();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(catalog)?),
        OutputFormat::Text => {
            for category in TagCategory::ALL {
                println!("{:<10} {}", category.as_str(), format_tags(catalog.get(category)));
            }
        }
    }
    Ok(())
}

fn show_config(app: &App, format: OutputFormat) -> Result<()> {
    let config = app.config.redacted();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            println!("bot-token:     {}", config.bot_token);
            println!("chat-id:       {}", config.chat_id);
            println!("api-url:       {}", config.api_url);
            println!(
                "dlsite-cookie: {}",
                if config.dlsite_cookie.is_empty() { "" } else { "(set)" }
            );
            println!("log-level:     {}", config.log_level);
            println!("budget:        {}", config.compose.budget);
            println!("head-chars:    {}", config.compose.head_chars);
            println!("head-lines:    {}", config.compose.head_lines);
        }
    }
    Ok(())
}

fn format_tags(tags: &TagSet) -> String {
    if tags.is_empty() {
        return "-".to_string();
    }
    tags.iter().collect::<Vec<_>>().join(" ")
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn print_help() {
    println!("galpost v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  galpost search <query> [--site <2dfan|dlsite>]   Search source sites");
    println!("         [--pick <n> --out <file>]                Save candidate n as a draft");
    println!("         [--field <name>]                         Merge one field into that draft");
    println!("  galpost compose <draft.json>                     Print the composed caption");
    println!("  galpost edit <draft.json> set <field> <text>     Replace a text field");
    println!("  galpost edit <draft.json> tag|untag <cat> <tag>  Apply or remove a tag");
    println!("  galpost edit <draft.json> image-add <url>        Attach an image (max 10)");
    println!("  galpost edit <draft.json> image-remove <url>     Drop an image (keeps the last)");
    println!("  galpost edit <draft.json> spoiler <url>          Toggle an image spoiler");
    println!("  galpost send <draft.json> [--ids 1,2,3]          Send, or edit an earlier post");
    println!("  galpost delete <ids>                             Delete a post and its record");
    println!("  galpost history [list]                           List sent posts");
    println!("  galpost history restore <ids> [--out <file>]     Turn a sent post into a draft");
    println!("  galpost catalog list                             Show the tag catalog");
    println!("  galpost catalog add <category> <tag>             Add a catalog tag");
    println!("  galpost catalog remove <category> <tag>          Remove a catalog tag");
    println!("  galpost config show                              Show settings");
    println!("  galpost config set <key> <value>                 Change a setting");
    println!();
    println!("Categories: platform, language, story, game_type, category");
    println!("Config keys: bot-token, chat-id, api-url, dlsite-cookie, log-level,");
    println!("             budget, head-chars, head-lines");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                             Output format");
    println!("  -h, --help                                       Show help");
    println!("  -V, --version                                    Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn no_arguments_prints_help() {
        let (format, command) = parse_args(&[]).expect("parse");
        assert_eq!(format, OutputFormat::Text);
        assert_eq!(command, CliCommand::Help);
    }

    #[test]
    fn help_and_version_never_open_the_data_dir() {
        for command in ["help", "version", "--version"] {
            run_with(&args(&[command]), || bail!("data dir opened")).expect(command);
        }
        let err = run_with(&args(&["history"]), || bail!("data dir opened")).unwrap_err();
        assert_eq!(err.to_string(), "data dir opened");
    }

    #[test]
    fn parses_search_with_pick() {
        let (format, command) = parse_args(&args(&[
            "--format=json",
            "search",
            "星之",
            "少女",
            "--site",
            "dlsite",
            "--pick",
            "2",
            "--out",
            "draft.json",
        ]))
        .expect("parse");
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(
            command,
            CliCommand::Search(SearchOptions {
                query: "星之 少女".to_string(),
                site: Some(SiteId::DLsite),
                pick: Some(2),
                field: None,
                out: Some(PathBuf::from("draft.json")),
            })
        );
    }

    #[test]
    fn pick_requires_site() {
        assert!(parse_args(&args(&["search", "game", "--pick", "0"])).is_err());
        assert!(parse_args(&args(&["search", "--site", "steam", "game"])).is_err());
        assert!(parse_args(&args(&["search"])).is_err());
    }

    #[test]
    fn parses_send_with_ids() {
        let (_, command) =
            parse_args(&args(&["send", "draft.json", "--ids", "12, 13,14"])).expect("parse");
        assert_eq!(
            command,
            CliCommand::Send {
                draft: PathBuf::from("draft.json"),
                ids: vec![12, 13, 14],
            }
        );
        assert!(parse_args(&args(&["send", "--ids", "1"])).is_err());
        assert!(parse_args(&args(&["delete", "1,x"])).is_err());
    }

    #[test]
    fn parses_catalog_and_config() {
        let (_, command) = parse_args(&args(&["catalog", "add", "gametype", "SRPG"])).expect("parse");
        assert_eq!(command, CliCommand::CatalogAdd(TagCategory::GameType, "SRPG".to_string()));
        let (_, command) = parse_args(&args(&["catalog"])).expect("parse");
        assert_eq!(command, CliCommand::CatalogList);
        assert!(parse_args(&args(&["catalog", "add", "mood", "x"])).is_err());

        let (_, command) = parse_args(&args(&["config", "set", "budget", "900"])).expect("parse");
        assert_eq!(command, CliCommand::ConfigSet("budget".to_string(), "900".to_string()));
    }

    #[test]
    fn parses_history_restore() {
        let (_, command) =
            parse_args(&args(&["history", "restore", "5,6", "--out", "d.json"])).expect("parse");
        assert_eq!(
            command,
            CliCommand::Restore {
                ids: vec![5, 6],
                out: Some(PathBuf::from("d.json")),
            }
        );
    }

    #[test]
    fn parses_field_merge() {
        let (_, command) = parse_args(&args(&[
            "search", "game", "--site", "2dfan", "--pick", "1", "--field", "brand", "--out", "d.json",
        ]))
        .expect("parse");
        match command {
            CliCommand::Search(options) => {
                assert_eq!(options.field, Some(FieldKey::Text(TextField::Brand)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_args(&args(&["search", "game", "--site", "2dfan", "--field", "brand"])).is_err());
        assert!(parse_args(&args(&[
            "search", "game", "--site", "2dfan", "--pick", "0", "--field", "download_url", "--out", "d.json",
        ]))
        .is_err());
    }

    #[test]
    fn parses_edit_actions() {
        let (_, command) = parse_args(&args(&["edit", "d.json", "set", "brand", "Studio", "Star"]))
            .expect("parse");
        assert_eq!(
            command,
            CliCommand::Edit {
                draft: PathBuf::from("d.json"),
                action: EditAction::Set(TextField::Brand, "Studio Star".to_string()),
            }
        );
        let (_, command) =
            parse_args(&args(&["edit", "d.json", "untag", "story", "R18"])).expect("parse");
        assert_eq!(
            command,
            CliCommand::Edit {
                draft: PathBuf::from("d.json"),
                action: EditAction::Untag(TagCategory::Story, "R18".to_string()),
            }
        );
        assert!(parse_args(&args(&["edit", "d.json", "tag", "story"])).is_err());
        assert!(parse_args(&args(&["edit", "d.json", "rename"])).is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse_args(&args(&["deploy"])).is_err());
    }
}
